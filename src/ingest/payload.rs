use base64::{engine::general_purpose, Engine as _};

use crate::error::{Error, Result};

/// Decodes a base64 image payload as sent by clients.
///
/// Accepts an optional `data:<mime>;base64,` prefix and embedded line
/// breaks. Spaces are read as `+`, since form decoding turns an unescaped
/// `+` into a space.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>> {
    let payload = payload.trim_matches(|c: char| matches!(c, '\n' | '\r' | '\t'));
    let body = match payload.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => payload,
    };
    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, '\n' | '\r' | '\t'))
        .map(|c| if c == ' ' { '+' } else { c })
        .collect();
    if cleaned.is_empty() {
        return Err(Error::decode("empty base64 payload"));
    }

    general_purpose::STANDARD
        .decode(&cleaned)
        .or_else(|_| general_purpose::STANDARD_NO_PAD.decode(cleaned.trim_end_matches('=')))
        .map_err(|e| Error::decode(format!("invalid base64 payload: {e}")))
}
