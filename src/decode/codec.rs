//! Codec dispatch: raw records, injected entropy decompression, or a
//! delegated LAS/LAZ codec
//!
//! The manifest's compression mode is resolved into a [`Codec`] once, before
//! anything is fetched, so a dataset that needs a missing decompressor fails
//! up front instead of once per node.

use std::io::{self, Cursor};
use std::sync::Arc;

use crate::core::{Error, LoaderConfig, Result, Vec3};
use crate::dataset::manifest::{CompressionMode, Manifest};
use crate::decode::attribute::decode_records;
use crate::decode::layout::RecordLayout;
use crate::decode::tile::{normalize_channel, DecodedTile};

/// Generic entropy decompressor injected by the caller
pub trait Decompress: Send + Sync {
    fn decompress(&self, bytes: &[u8]) -> io::Result<Vec<u8>>;
}

impl<F> Decompress for F
where
    F: Fn(&[u8]) -> io::Result<Vec<u8>> + Send + Sync,
{
    fn decompress(&self, bytes: &[u8]) -> io::Result<Vec<u8>> {
        self(bytes)
    }
}

/// LZ4 block decompression of size-prepended payloads
#[derive(Clone, Copy, Debug, Default)]
pub struct Lz4Decompressor;

impl Decompress for Lz4Decompressor {
    fn decompress(&self, bytes: &[u8]) -> io::Result<Vec<u8>> {
        lz4_flex::decompress_size_prepended(bytes).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, format!("LZ4 decompression failed: {}", e))
        })
    }
}

/// External point-cloud codec that decodes a whole node payload itself
pub trait LasCodec: Send + Sync {
    /// `Ok(None)` means the payload held no points
    fn decode(&self, bytes: &[u8], config: &LoaderConfig) -> std::result::Result<Option<DecodedTile>, String>;
}

/// LAS/LAZ decoding through the `las` crate
#[derive(Clone, Copy, Debug, Default)]
pub struct LasCrateCodec;

impl LasCodec for LasCrateCodec {
    fn decode(&self, bytes: &[u8], config: &LoaderConfig) -> std::result::Result<Option<DecodedTile>, String> {
        let mut reader = las::Reader::new(Cursor::new(bytes.to_vec())).map_err(|e| e.to_string())?;
        let skip = config.density_skip.max(1) as usize;

        let mut positions = Vec::new();
        let mut colors: Vec<[u16; 3]> = Vec::new();
        let mut intensity = Vec::new();
        let mut classification = Vec::new();
        let mut all_colored = true;

        for point in reader.points().step_by(skip) {
            let point = point.map_err(|e| e.to_string())?;
            positions.push(Vec3::new(point.x as f32, point.y as f32, point.z as f32));
            match point.color {
                Some(c) => colors.push([c.red, c.green, c.blue]),
                None => all_colored = false,
            }
            intensity.push(point.intensity);
            classification.push(u8::from(point.classification));
        }
        if positions.is_empty() {
            return Ok(None);
        }

        let colors = (all_colored && !config.skip_color).then(|| {
            let mut max = [0u16; 3];
            for rgb in &colors {
                for c in 0..3 {
                    max[c] = max[c].max(rgb[c]);
                }
            }
            colors
                .iter()
                .map(|rgb| {
                    Vec3::new(
                        normalize_channel(rgb[0] as f64, 2, max[0] as f64),
                        normalize_channel(rgb[1] as f64, 2, max[1] as f64),
                        normalize_channel(rgb[2] as f64, 2, max[2] as f64),
                    )
                })
                .collect()
        });
        let intensity_max = intensity.iter().copied().max().unwrap_or(0) as f64;
        let intensity = intensity
            .iter()
            .map(|&v| normalize_channel(v as f64, 2, intensity_max))
            .collect();

        let mut tile = DecodedTile {
            positions,
            colors,
            intensity: Some(intensity),
            classification: Some(classification),
        };
        tile.apply_tone(config);
        Ok(Some(tile))
    }
}

/// Decode path for one dataset
#[derive(Clone)]
pub enum Codec {
    Raw(Arc<RecordLayout>),
    Entropy {
        layout: Arc<RecordLayout>,
        decompressor: Arc<dyn Decompress>,
    },
    Delegated(Arc<dyn LasCodec>),
}

impl std::fmt::Debug for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Codec::Raw(layout) => f.debug_tuple("Raw").field(&layout.stride).finish(),
            Codec::Entropy { layout, .. } => f.debug_struct("Entropy").field("stride", &layout.stride).finish(),
            Codec::Delegated(_) => f.write_str("Delegated"),
        }
    }
}

impl Codec {
    /// Pick the decode path for `manifest`.
    ///
    /// Fails with [`Error::UnsupportedCodec`] when the payloads are entropy
    /// compressed and no decompressor was supplied.
    pub fn resolve(
        manifest: &Manifest,
        decompressor: Option<Arc<dyn Decompress>>,
        las: Arc<dyn LasCodec>,
    ) -> Result<Self> {
        match manifest.compression {
            CompressionMode::Raw => Ok(Codec::Raw(Arc::new(RecordLayout::new(manifest)))),
            CompressionMode::EntropyCompressed => {
                let decompressor = decompressor.ok_or_else(|| {
                    Error::UnsupportedCodec(
                        "payloads are entropy compressed but no decompressor was provided".into(),
                    )
                })?;
                Ok(Codec::Entropy {
                    layout: Arc::new(RecordLayout::new(manifest)),
                    decompressor,
                })
            }
            CompressionMode::Laz => Ok(Codec::Delegated(las)),
        }
    }

    /// Decode one node payload. `key` is only used in error messages.
    pub async fn decode(&self, key: &str, bytes: Vec<u8>, config: &LoaderConfig) -> Result<Option<DecodedTile>> {
        let decode_error = |reason: String| Error::Decode { key: key.to_string(), reason };
        match self {
            Codec::Raw(layout) => Ok(decode_records(&bytes, layout, config)),
            Codec::Entropy { layout, decompressor } => {
                let decompressor = Arc::clone(decompressor);
                let raw = tokio::task::spawn_blocking(move || decompressor.decompress(&bytes))
                    .await
                    .map_err(|e| decode_error(format!("decompression task failed: {}", e)))?
                    .map_err(|e| decode_error(e.to_string()))?;
                Ok(decode_records(&raw, layout, config))
            }
            Codec::Delegated(las) => {
                let las = Arc::clone(las);
                let config = config.clone();
                tokio::task::spawn_blocking(move || las.decode(&bytes, &config))
                    .await
                    .map_err(|e| decode_error(format!("decode task failed: {}", e)))?
                    .map_err(decode_error)
            }
        }
    }
}
