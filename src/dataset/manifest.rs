//! Root manifest: attribute schema, scale/offset, bounds and codec
//!
//! Two manifest dialects exist in the wild. Older datasets list the record
//! layout under `"schema"`, newer ones under `"attributes"`. Both are accepted
//! and resolved once here, together with the key dialect and codec, so nothing
//! downstream re-probes the JSON.

use serde::Deserialize;

use crate::core::{Error, Result};
use crate::dataset::key::{KeyDialect, NodeKey};
use crate::streaming::source::ByteSource;

/// Directory holding hierarchy fragments, relative to the manifest
pub const HIERARCHY_DIR: &str = "ept-hierarchy";
/// Directory holding per-node point payloads, relative to the manifest
pub const DATA_DIR: &str = "ept-data";

/// Numeric interpretation of a schema attribute
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NumericKind {
    Signed,
    Unsigned,
    Float,
    /// Signed integer that needs scale and offset applied
    Scaled,
}

/// One field of the fixed-stride point record
#[derive(Clone, Debug, PartialEq)]
pub struct AttributeDescriptor {
    pub name: String,
    pub kind: NumericKind,
    pub size: usize,
    pub scale: Option<f64>,
    pub offset: Option<f64>,
}

/// How node payloads are stored
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressionMode {
    /// Fixed-stride records as-is
    Raw,
    /// Fixed-stride records behind a generic entropy coder
    EntropyCompressed,
    /// LAS/LAZ files handled by an external codec
    Laz,
}

impl CompressionMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "binary" | "raw" => Some(CompressionMode::Raw),
            "zstandard" | "zstd" | "lz4" | "compressed" => Some(CompressionMode::EntropyCompressed),
            "laszip" | "laz" | "las" => Some(CompressionMode::Laz),
            _ => None,
        }
    }

    /// File extension of node payloads
    pub fn extension(self) -> &'static str {
        match self {
            CompressionMode::Raw => "bin",
            CompressionMode::EntropyCompressed => "zst",
            CompressionMode::Laz => "laz",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

/// Which field the record layout was read from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchemaField {
    Attributes,
    Schema,
}

/// Parsed, immutable root manifest of one dataset
#[derive(Clone, Debug)]
pub struct Manifest {
    /// Directory of the manifest; derived paths are resolved against it
    pub base: String,
    pub schema: Vec<AttributeDescriptor>,
    pub schema_field: SchemaField,
    /// Per-axis scale, overriding attribute scales for x/y/z
    pub scale: Option<[f64; 3]>,
    /// Per-axis offset, overriding attribute offsets for x/y/z
    pub offset: Option<[f64; 3]>,
    /// `[minx, miny, minz, maxx, maxy, maxz]`
    pub bounds: [f64; 6],
    pub compression: CompressionMode,
    pub dialect: KeyDialect,
    pub endianness: Endianness,
    /// Total point count, when the manifest declares one
    pub points: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum AxisValues {
    Uniform(f64),
    PerAxis([f64; 3]),
}

impl AxisValues {
    fn expand(self) -> [f64; 3] {
        match self {
            AxisValues::Uniform(v) => [v; 3],
            AxisValues::PerAxis(v) => v,
        }
    }
}

#[derive(Deserialize)]
struct RawAttribute {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    size: Option<usize>,
    scale: Option<f64>,
    offset: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawManifest {
    attributes: Option<Vec<RawAttribute>>,
    schema: Option<Vec<RawAttribute>>,
    #[serde(default)]
    bounds: [f64; 6],
    scale: Option<AxisValues>,
    offset: Option<AxisValues>,
    #[serde(alias = "compression")]
    data_type: Option<String>,
    key_dialect: Option<String>,
    endianness: Option<String>,
    points: Option<u64>,
}

impl Manifest {
    /// Fetch and parse the manifest at `location`
    pub async fn load<S: ByteSource>(source: &S, location: &str) -> Result<Self> {
        let bytes = source
            .fetch(location)
            .await
            .map_err(|source| Error::ManifestFetch {
                path: location.to_string(),
                source,
            })?;
        let manifest = Self::from_json(&bytes, location)?;
        log::info!(
            "Manifest {}: {} attributes, stride {} bytes, {:?}, {:?} keys",
            location,
            manifest.schema.len(),
            manifest.stride(),
            manifest.compression,
            manifest.dialect,
        );
        Ok(manifest)
    }

    /// Parse manifest JSON; `location` only determines the base directory
    pub fn from_json(bytes: &[u8], location: &str) -> Result<Self> {
        let raw: RawManifest = serde_json::from_slice(bytes)?;

        let (raw_schema, schema_field) = match (raw.attributes, raw.schema) {
            (Some(attrs), _) => (attrs, SchemaField::Attributes),
            (None, Some(schema)) => (schema, SchemaField::Schema),
            (None, None) => {
                return Err(Error::Schema(
                    "manifest has neither an \"attributes\" nor a \"schema\" field".into(),
                ));
            }
        };
        let schema = raw_schema
            .into_iter()
            .map(parse_attribute)
            .collect::<Result<Vec<_>>>()?;

        let compression = match raw.data_type.as_deref() {
            None => CompressionMode::Raw,
            Some(name) => CompressionMode::from_name(name)
                .ok_or_else(|| Error::UnsupportedCodec(format!("unknown data type {name:?}")))?,
        };
        let dialect = match raw.key_dialect.as_deref() {
            None => KeyDialect::default(),
            Some(name) => KeyDialect::from_name(name)
                .ok_or_else(|| Error::Schema(format!("unknown key dialect {name:?}")))?,
        };
        let endianness = match raw.endianness.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("little") | Some("le") => Endianness::Little,
            Some("big") | Some("be") => Endianness::Big,
            Some(other) => return Err(Error::Schema(format!("unknown endianness {other:?}"))),
        };

        Ok(Self {
            base: base_dir(location).to_string(),
            schema,
            schema_field,
            scale: raw.scale.map(AxisValues::expand),
            offset: raw.offset.map(AxisValues::expand),
            bounds: raw.bounds,
            compression,
            dialect,
            endianness,
            points: raw.points,
        })
    }

    /// Bytes per point record
    pub fn stride(&self) -> usize {
        self.schema.iter().map(|a| a.size).sum()
    }

    /// Dataset Z extent, for consumers that color or clip by height
    pub fn z_range(&self) -> (f64, f64) {
        (self.bounds[2], self.bounds[5])
    }

    /// Path of the hierarchy fragment rooted at `key`
    pub fn hierarchy_path(&self, key: NodeKey) -> String {
        self.join(&format!("{}/{}.json", HIERARCHY_DIR, self.dialect.format(key)))
    }

    /// Path of the point payload of `key`
    pub fn data_path(&self, key: NodeKey) -> String {
        self.join(&format!(
            "{}/{}.{}",
            DATA_DIR,
            self.dialect.format(key),
            self.compression.extension()
        ))
    }

    /// Key string in this dataset's dialect
    pub fn key_name(&self, key: NodeKey) -> String {
        self.dialect.format(key)
    }

    fn join(&self, relative: &str) -> String {
        if self.base.is_empty() {
            relative.to_string()
        } else {
            format!("{}/{}", self.base, relative)
        }
    }
}

fn base_dir(location: &str) -> &str {
    location.rfind('/').map(|i| &location[..i]).unwrap_or("")
}

fn parse_attribute(raw: RawAttribute) -> Result<AttributeDescriptor> {
    let sized = |kind: NumericKind, size: usize| (kind, Some(size));
    let (kind, implied) = match raw.kind.to_ascii_lowercase().as_str() {
        "signed" => (NumericKind::Signed, None),
        "unsigned" => (NumericKind::Unsigned, None),
        "float" => (NumericKind::Float, None),
        "scaled" => (NumericKind::Scaled, None),
        "int8" => sized(NumericKind::Signed, 1),
        "int16" => sized(NumericKind::Signed, 2),
        "int32" => sized(NumericKind::Signed, 4),
        "int64" => sized(NumericKind::Signed, 8),
        "uint8" => sized(NumericKind::Unsigned, 1),
        "uint16" => sized(NumericKind::Unsigned, 2),
        "uint32" => sized(NumericKind::Unsigned, 4),
        "uint64" => sized(NumericKind::Unsigned, 8),
        "float32" => sized(NumericKind::Float, 4),
        "float64" | "double" => sized(NumericKind::Float, 8),
        other => {
            return Err(Error::Schema(format!(
                "attribute {:?} has unknown type {other:?}",
                raw.name
            )));
        }
    };
    let size = implied.or(raw.size).ok_or_else(|| {
        Error::Schema(format!("attribute {:?} needs an explicit size", raw.name))
    })?;
    let kind = if kind == NumericKind::Signed && raw.scale.is_some() {
        NumericKind::Scaled
    } else {
        kind
    };

    Ok(AttributeDescriptor {
        name: raw.name,
        kind,
        size,
        scale: raw.scale,
        offset: raw.offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::source::BlobMap;

    const EPT_STYLE: &str = r#"{
        "bounds": [0, 0, -5, 100, 100, 95],
        "points": 1200,
        "dataType": "binary",
        "schema": [
            { "name": "X", "type": "signed", "size": 4, "scale": 0.01, "offset": 50 },
            { "name": "Y", "type": "signed", "size": 4, "scale": 0.01, "offset": 50 },
            { "name": "Z", "type": "signed", "size": 4, "scale": 0.01, "offset": 45 },
            { "name": "Intensity", "type": "unsigned", "size": 2 },
            { "name": "Red", "type": "unsigned", "size": 2 },
            { "name": "Green", "type": "unsigned", "size": 2 },
            { "name": "Blue", "type": "unsigned", "size": 2 }
        ]
    }"#;

    #[test]
    fn test_schema_dialect() {
        let manifest = Manifest::from_json(EPT_STYLE.as_bytes(), "data/city/ept.json").expect("valid manifest");

        assert_eq!(manifest.schema_field, SchemaField::Schema);
        assert_eq!(manifest.schema.len(), 7);
        assert_eq!(manifest.schema[0].kind, NumericKind::Scaled);
        assert_eq!(manifest.schema[3].kind, NumericKind::Unsigned);
        assert_eq!(manifest.stride(), 20);
        assert_eq!(manifest.compression, CompressionMode::Raw);
        assert_eq!(manifest.dialect, KeyDialect::Span);
        assert_eq!(manifest.z_range(), (-5.0, 95.0));
        assert_eq!(manifest.points, Some(1200));
        assert_eq!(manifest.scale, None);
    }

    #[test]
    fn test_attributes_dialect_with_sized_types() {
        let json = r#"{
            "attributes": [
                { "name": "x", "type": "int32" },
                { "name": "y", "type": "int32" }
            ],
            "scale": [0.01, 0.01, 0.01],
            "offset": 10,
            "keyDialect": "morton",
            "compression": "lz4",
            "endianness": "big"
        }"#;
        let manifest = Manifest::from_json(json.as_bytes(), "ept.json").expect("valid manifest");

        assert_eq!(manifest.schema_field, SchemaField::Attributes);
        assert_eq!(manifest.stride(), 8);
        assert_eq!(manifest.scale, Some([0.01; 3]));
        assert_eq!(manifest.offset, Some([10.0; 3]));
        assert_eq!(manifest.dialect, KeyDialect::Morton);
        assert_eq!(manifest.compression, CompressionMode::EntropyCompressed);
        assert_eq!(manifest.endianness, Endianness::Big);
    }

    #[test]
    fn test_missing_schema_is_schema_error() {
        let err = Manifest::from_json(br#"{ "bounds": [0,0,0,1,1,1] }"#, "ept.json").unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_unknown_type_is_schema_error() {
        let json = r#"{ "schema": [ { "name": "X", "type": "complex", "size": 16 } ] }"#;
        let err = Manifest::from_json(json.as_bytes(), "ept.json").unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_generic_type_needs_size() {
        let json = r#"{ "schema": [ { "name": "X", "type": "signed" } ] }"#;
        assert!(matches!(
            Manifest::from_json(json.as_bytes(), "ept.json"),
            Err(Error::Schema(_))
        ));
    }

    #[test]
    fn test_invalid_json() {
        let err = Manifest::from_json(b"{ not json", "ept.json").unwrap_err();
        assert!(matches!(err, Error::ManifestParse(_)));
    }

    #[test]
    fn test_derived_paths() {
        let manifest = Manifest::from_json(EPT_STYLE.as_bytes(), "data/city/ept.json").expect("valid manifest");
        let key = NodeKey::new(1, 1, 0, 1).expect("valid key");

        assert_eq!(manifest.hierarchy_path(NodeKey::ROOT), "data/city/ept-hierarchy/0-0-0-0.json");
        assert_eq!(manifest.data_path(key), "data/city/ept-data/1-1-0-1.bin");

        let root_level = Manifest::from_json(EPT_STYLE.as_bytes(), "ept.json").expect("valid manifest");
        assert_eq!(root_level.data_path(key), "ept-data/1-1-0-1.bin");
    }

    #[test]
    fn test_key_names_follow_dialect() {
        let json = r#"{ "keyDialect": "morton", "attributes": [ { "name": "x", "type": "int32" } ] }"#;
        let morton = Manifest::from_json(json.as_bytes(), "ept.json").expect("valid manifest");
        let span = Manifest::from_json(EPT_STYLE.as_bytes(), "ept.json").expect("valid manifest");
        let key = NodeKey::new(2, 3, 0, 2).expect("valid key");

        assert_eq!(morton.key_name(key), "0-5-1");
        assert_eq!(morton.data_path(key), "ept-data/0-5-1.bin");
        assert_eq!(span.key_name(key), "2-3-0-2");
    }

    #[test]
    fn test_extensions() {
        assert_eq!(CompressionMode::Raw.extension(), "bin");
        assert_eq!(CompressionMode::EntropyCompressed.extension(), "zst");
        assert_eq!(CompressionMode::Laz.extension(), "laz");
        assert_eq!(CompressionMode::from_name("laszip"), Some(CompressionMode::Laz));
    }

    #[tokio::test]
    async fn test_load_missing_manifest() {
        let source = BlobMap::new();
        let err = Manifest::load(&source, "ept.json").await.unwrap_err();
        assert!(matches!(err, Error::ManifestFetch { .. }));
    }

    #[tokio::test]
    async fn test_load_from_source() {
        let mut source = BlobMap::new();
        source.insert("ept.json", EPT_STYLE.as_bytes().to_vec());
        let manifest = Manifest::load(&source, "ept.json").await.expect("manifest loads");
        assert_eq!(manifest.base, "");
    }
}
