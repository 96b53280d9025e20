//! Detection of placeholder payloads left by large-file storage
//!
//! A repository checked out without its large-file objects contains small
//! text pointer files where the binary tiles should be. Decoding those as
//! point records produces garbage, so they are caught before decode.

/// Payloads at or above this size are never treated as placeholders
pub const PLACEHOLDER_MAX_BYTES: usize = 150;

/// Text that opens every git-lfs pointer file
pub const PLACEHOLDER_SIGNATURE: &str = "version https://git-lfs";

/// Result of inspecting a fetched payload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PayloadCheck {
    /// Payload may be decoded
    Intact,
    /// Payload is a storage pointer, not data
    Placeholder,
}

/// Inspect a payload before decode
pub fn check_payload(bytes: &[u8]) -> PayloadCheck {
    if bytes.len() >= PLACEHOLDER_MAX_BYTES {
        return PayloadCheck::Intact;
    }
    let text = String::from_utf8_lossy(bytes);
    if text.contains(PLACEHOLDER_SIGNATURE) {
        PayloadCheck::Placeholder
    } else {
        PayloadCheck::Intact
    }
}
