/// Returns the index of the first occurrence of `needle` in `haystack`.
pub fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Splits `haystack` on every occurrence of `needle`, returning the pieces
/// between occurrences (excluding the needle itself).
pub fn split_on<'a>(haystack: &'a [u8], needle: &[u8]) -> Vec<&'a [u8]> {
    let mut result = Vec::new();
    let mut start = 0;
    while start <= haystack.len() {
        if let Some(pos) = find_subsequence(&haystack[start..], needle) {
            result.push(&haystack[start..start + pos]);
            start += pos + needle.len();
        } else {
            result.push(&haystack[start..]);
            break;
        }
    }
    result
}

/// Extracts the boundary token from a Content-Type header value like
/// `multipart/form-data; boundary=----WebKitFormBoundaryXXX`.
pub fn extract_boundary(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .map(|s| s.trim())
        .find_map(|s| s.strip_prefix("boundary="))
        .map(|s| s.trim_matches('"').to_owned())
        .filter(|s| !s.is_empty())
}

/// One named part of a multipart body.
#[derive(Debug, PartialEq, Eq)]
pub struct Part<'a> {
    /// The part carried a `filename=` (an uploaded file rather than a text field).
    pub is_file: bool,
    pub data: &'a [u8],
}

/// Finds the part whose `Content-Disposition` names `field_name`.
pub fn find_part<'a>(body: &'a [u8], boundary: &str, field_name: &str) -> Option<Part<'a>> {
    let delimiter = format!("--{}", boundary);
    let sep = b"\r\n\r\n";

    split_on(body, delimiter.as_bytes()).into_iter().find_map(|part| {
        let sep_pos = find_subsequence(part, sep)?;
        let headers = String::from_utf8_lossy(&part[..sep_pos]);
        let (name, is_file) = parse_disposition(&headers)?;
        if name != field_name {
            return None;
        }
        let raw = &part[sep_pos + sep.len()..];
        let data = raw.strip_suffix(b"\r\n").unwrap_or(raw);
        Some(Part { is_file, data })
    })
}

/// Reads `name` and the presence of `filename` out of a part's
/// `Content-Disposition` header.
fn parse_disposition(headers: &str) -> Option<(String, bool)> {
    let line = headers
        .lines()
        .find(|l| l.to_ascii_lowercase().starts_with("content-disposition:"))?;
    let mut name = None;
    let mut is_file = false;
    for param in line.split(';').skip(1).map(str::trim) {
        if let Some(v) = param.strip_prefix("name=") {
            name = Some(v.trim_matches('"').to_owned());
        } else if param.starts_with("filename=") {
            is_file = true;
        }
    }
    Some((name?, is_file))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = b"--XyZ\r\n\
Content-Disposition: form-data; filename=\"a.png\"; name=\"upload\"\r\n\
Content-Type: image/png\r\n\r\n\
\x89PNG\r\n\
--XyZ\r\n\
Content-Disposition: form-data; name=\"data\"\r\n\r\n\
aGVsbG8=\r\n\
--XyZ--\r\n";

    #[test]
    fn boundary_is_read_from_content_type() {
        assert_eq!(
            extract_boundary("multipart/form-data; boundary=\"XyZ\"").as_deref(),
            Some("XyZ")
        );
        assert_eq!(extract_boundary("multipart/form-data"), None);
    }

    #[test]
    fn finds_text_and_file_parts_by_name() {
        let data = find_part(BODY, "XyZ", "data").unwrap();
        assert_eq!(data, Part { is_file: false, data: b"aGVsbG8=" });

        let upload = find_part(BODY, "XyZ", "upload").unwrap();
        assert!(upload.is_file);
        assert_eq!(upload.data, b"\x89PNG");

        assert!(find_part(BODY, "XyZ", "missing").is_none());
    }
}
