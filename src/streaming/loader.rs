//! Load orchestration: manifest → codec → hierarchy → schedule → tiles

use std::sync::Arc;

use crate::core::{Error, LoaderConfig, Result};
use crate::dataset::hierarchy::discover;
use crate::dataset::key::NodeKey;
use crate::dataset::manifest::Manifest;
use crate::decode::codec::{Codec, Decompress, LasCodec, LasCrateCodec};
use crate::decode::integrity::{check_payload, PayloadCheck};
use crate::decode::tile::DecodedTile;
use crate::streaming::scheduler::{run, schedule, BatchReport, TileEvent};
use crate::streaming::source::{BlobMap, ByteSource};

/// Outcome of one completed load
#[derive(Clone, Debug, PartialEq)]
pub struct LoadReport {
    pub batch: BatchReport,
    /// Nodes known from the hierarchy, including empty ones
    pub nodes_discovered: usize,
    pub fragments_fetched: usize,
    /// Dataset Z extent from the manifest
    pub z_range: (f64, f64),
}

impl LoadReport {
    pub fn placeholder_detected(&self) -> bool {
        !self.batch.placeholders.is_empty()
    }
}

/// Streaming point-cloud loader over a byte source
pub struct TileLoader<S: ByteSource> {
    source: Arc<S>,
    config: LoaderConfig,
    decompressor: Option<Arc<dyn Decompress>>,
    las_codec: Arc<dyn LasCodec>,
}

impl<S: ByteSource> TileLoader<S> {
    pub fn new(source: S, config: LoaderConfig) -> Self {
        Self {
            source: Arc::new(source),
            config: config.sanitized(),
            decompressor: None,
            las_codec: Arc::new(LasCrateCodec),
        }
    }

    /// Decompressor for entropy-compressed datasets
    pub fn with_decompressor(mut self, decompressor: impl Decompress + 'static) -> Self {
        self.decompressor = Some(Arc::new(decompressor));
        self
    }

    /// Replace the default LAS/LAZ codec
    pub fn with_las_codec(mut self, codec: impl LasCodec + 'static) -> Self {
        self.las_codec = Arc::new(codec);
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Load the dataset whose manifest is at `manifest_location`, calling
    /// `on_tile` for every decoded node.
    ///
    /// Returns an error only for conditions that end the whole load: an
    /// unreadable manifest or schema, a codec that cannot be served, or a
    /// dataset made entirely of storage placeholders. Individual node
    /// failures are logged and counted in the report.
    pub async fn load<C>(&self, manifest_location: &str, on_tile: C) -> Result<LoadReport>
    where
        C: FnMut(TileEvent) + Send,
    {
        let manifest = Arc::new(Manifest::load(self.source.as_ref(), manifest_location).await?);
        let codec = Arc::new(Codec::resolve(
            &manifest,
            self.decompressor.clone(),
            Arc::clone(&self.las_codec),
        )?);

        let keys = discover(NodeKey::ROOT, &manifest, self.source.as_ref(), self.config.max_depth).await;
        let ordered = schedule(keys.data_keys());
        log::info!(
            "Scheduling {} nodes with {} workers ({:?} delivery)",
            ordered.len(),
            self.config.concurrency,
            self.config.delivery_order
        );

        let source = Arc::clone(&self.source);
        let config = Arc::new(self.config.clone());
        let node_manifest = Arc::clone(&manifest);
        let fetch_decode = move |key: NodeKey| {
            let source = Arc::clone(&source);
            let manifest = Arc::clone(&node_manifest);
            let codec = Arc::clone(&codec);
            let config = Arc::clone(&config);
            async move { fetch_node(source.as_ref(), &manifest, &codec, &config, key).await }
        };

        let batch = run(
            &ordered,
            self.config.concurrency,
            self.config.delivery_order,
            fetch_decode,
            on_tile,
        )
        .await;

        if !batch.placeholders.is_empty() {
            log::warn!(
                "Placeholder data detected: {} of {} nodes are large-file-storage pointers, not point data",
                batch.placeholders.len(),
                batch.scheduled
            );
            if batch.placeholders.len() == batch.scheduled {
                return Err(Error::PlaceholderData(batch.scheduled));
            }
        }
        log::info!(
            "Load finished: {} delivered, {} empty, {} failed of {}",
            batch.delivered,
            batch.empty,
            batch.failed.len(),
            batch.scheduled
        );

        Ok(LoadReport {
            batch,
            nodes_discovered: keys.len(),
            fragments_fetched: keys.fragments_fetched().len(),
            z_range: manifest.z_range(),
        })
    }
}

impl TileLoader<BlobMap> {
    /// Loader over an injected path → blob table, for offline datasets
    pub fn offline(blobs: BlobMap, config: LoaderConfig) -> Self {
        Self::new(blobs, config)
    }
}

/// Fetch, integrity-check and decode a single node
async fn fetch_node<S: ByteSource>(
    source: &S,
    manifest: &Manifest,
    codec: &Codec,
    config: &LoaderConfig,
    key: NodeKey,
) -> Result<Option<DecodedTile>> {
    let name = manifest.key_name(key);
    let bytes = source
        .fetch(&manifest.data_path(key))
        .await
        .map_err(|source| Error::Fetch { key: name.clone(), source })?;

    if check_payload(&bytes) == PayloadCheck::Placeholder {
        return Err(Error::Integrity(name));
    }

    let tile = codec.decode(&name, bytes, config).await?;
    if let Some(tile) = &tile {
        log::debug!("Node {}: {} points", name, tile.len());
    }
    Ok(tile)
}
