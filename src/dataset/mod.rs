//! Dataset index: manifest, node keys and hierarchy discovery

pub mod key;
pub mod manifest;
pub mod hierarchy;

pub use key::{KeyDialect, NodeKey};
pub use manifest::{AttributeDescriptor, CompressionMode, Endianness, Manifest, NumericKind};
pub use hierarchy::{discover, HierarchyEntry, NodeKeySet};
