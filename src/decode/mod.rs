//! Node payload decoding

pub mod integrity;
pub mod tile;
pub mod layout;
pub mod attribute;
pub mod codec;

pub use integrity::{check_payload, PayloadCheck};
pub use tile::DecodedTile;
pub use layout::RecordLayout;
pub use attribute::decode_records;
pub use codec::{Codec, Decompress, LasCodec, LasCrateCodec, Lz4Decompressor};
