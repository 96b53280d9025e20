//! Tilestream - streaming loader for octree-partitioned point clouds
//!
//! A dataset is a JSON manifest, a tree of hierarchy fragments naming the
//! populated octree nodes, and one binary payload per node. [`TileLoader`]
//! walks the hierarchy, fetches node payloads coarse-to-fine with bounded
//! concurrency and hands each decoded [`DecodedTile`] to a callback.

pub mod core;
pub mod math;
pub mod dataset;
pub mod decode;
pub mod streaming;

pub use crate::core::{DeliveryOrder, Error, LoaderConfig, Result};
pub use dataset::{Manifest, NodeKey};
pub use decode::DecodedTile;
pub use streaming::{BlobMap, ByteSource, FsSource, LoadReport, TileEvent, TileLoader};
