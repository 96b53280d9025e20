//! Byte sources, tile scheduling and load orchestration

pub mod source;
pub mod scheduler;
pub mod loader;

pub use source::{BlobMap, ByteSource, FsSource};
pub use scheduler::{run, schedule, BatchReport, TileEvent};
pub use loader::{LoadReport, TileLoader};
