//! Photo attachments as data URLs.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// Encode `bytes` as `data:<mime>;base64,<payload>`.
pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Guess an image mime type from a file extension.
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Whether `value` looks like a base64 data URL.
pub fn is_data_url(value: &str) -> bool {
    value.starts_with("data:") && value.contains(";base64,")
}
