//! Buffered multipart/form-data decoder
//!
//! Turns a fully received request body plus the boundary token from the
//! `Content-Type` header into a map of form fields. Parts carrying a
//! `filename` are kept as raw bytes; everything else is decoded as text and
//! trimmed.
//!
//! The decoder never fails on malformed input. Parts it cannot make sense of
//! are skipped, so a caller that needs a particular field simply finds it
//! missing and answers with a 400.
//!
//! The whole body must be in memory before decoding starts. Memory use is
//! proportional to the upload size; the only bound is the request body limit
//! enforced by the HTTP layer.
//!
//! # Example
//! ```rust
//! use docdrop::multipart::{decode, FieldValue};
//!
//! let body = b"--XYZ\r\n\
//!     Content-Disposition: form-data; name=\"documentName\"\r\n\
//!     \r\n\
//!     Report\r\n\
//!     --XYZ--";
//!
//! let form = decode(body, "XYZ");
//! assert_eq!(form.text("documentName"), Some("Report"));
//! assert!(matches!(form.get("documentName"), Some(FieldValue::Text(_))));
//! ```

use log::{debug, trace, warn};
use std::collections::HashMap;

const CRLF: &[u8] = b"\r\n";
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";
const DASHES: &[u8] = b"--";

/// An uploaded file extracted from a part with a `filename` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    /// Filename as declared by the client, unmodified
    pub filename: String,
    /// Raw part content, never text-decoded
    pub content: Vec<u8>,
}

/// Value of a single form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    File(FilePart),
}

/// Headers and content of one part after the blank-line split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPart<'a> {
    /// `name` parameter of Content-Disposition, if present
    pub name: Option<String>,
    /// `filename` parameter; its presence marks the part as a file
    pub filename: Option<String>,
    /// Bytes after the header block, borrowed from the body
    pub content: &'a [u8],
}

/// Decoded form: field name to value, last occurrence wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    fields: HashMap<String, FieldValue>,
}

impl FormData {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Text value of `name`, `None` if absent or if the field is a file.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(FieldValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    /// File value of `name`, `None` if absent or if the field is text.
    pub fn file(&self, name: &str) -> Option<&FilePart> {
        match self.fields.get(name) {
            Some(FieldValue::File(file)) => Some(file),
            _ => None,
        }
    }

    /// Take ownership of a file field, leaving text fields untouched.
    pub fn take_file(&mut self, name: &str) -> Option<FilePart> {
        if !matches!(self.fields.get(name), Some(FieldValue::File(_))) {
            return None;
        }
        match self.fields.remove(name) {
            Some(FieldValue::File(file)) => Some(file),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    fn insert(&mut self, name: String, value: FieldValue) {
        if self.fields.insert(name.clone(), value).is_some() {
            debug!("Multipart field '{name}' repeated, keeping the later value");
        }
    }
}

/// Extract the boundary token from a `Content-Type` header.
///
/// Everything after the first `boundary=` is taken verbatim. Quotes and
/// trailing parameters are not stripped.
pub fn extract_boundary(content_type: &str) -> Option<String> {
    let start = content_type.find("boundary=")? + "boundary=".len();
    let boundary = &content_type[start..];
    if boundary.is_empty() {
        return None;
    }
    if boundary.contains('"') || boundary.contains(';') {
        debug!("Boundary '{boundary}' contains quotes or parameters, using it as-is");
    }
    Some(boundary.to_string())
}

/// Split a body into the raw byte ranges between boundary delimiters.
///
/// Returns an empty list when the boundary is empty or never occurs.
pub fn split_parts<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let mut parts = Vec::new();
    if boundary.is_empty() {
        warn!("Refusing to split multipart body with an empty boundary");
        return parts;
    }

    let dash_boundary = [DASHES, boundary.as_bytes()].concat();
    let delimiter = [CRLF, dash_boundary.as_slice()].concat();

    let Some(mut cursor) = find_opening_delimiter(body, &delimiter, &dash_boundary) else {
        debug!("Boundary '{boundary}' not found in {} byte body", body.len());
        return parts;
    };

    loop {
        if body[cursor..].starts_with(DASHES) {
            trace!("Reached closing delimiter at offset {cursor}");
            break;
        }
        let start = cursor + CRLF.len();
        if start > body.len() {
            break;
        }
        let Some(offset) = find_bytes(&body[start..], &delimiter) else {
            debug!("Part starting at offset {start} has no closing delimiter, dropping it");
            break;
        };
        let end = start + offset;
        parts.push(&body[start..end]);
        cursor = end + delimiter.len();
    }

    trace!("Split multipart body into {} parts", parts.len());
    parts
}

/// Position right after the first delimiter, trying the CRLF-prefixed form
/// first and falling back to a bare `--boundary`. The earlier match wins.
fn find_opening_delimiter(body: &[u8], delimiter: &[u8], dash_boundary: &[u8]) -> Option<usize> {
    let with_crlf = find_bytes(body, delimiter).map(|pos| pos + delimiter.len());
    let bare = find_bytes(body, dash_boundary).map(|pos| pos + dash_boundary.len());

    match (with_crlf, bare) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Split one part into its header section and content.
///
/// Returns `None` when the part has no blank line between headers and
/// content.
pub fn parse_part(part: &[u8]) -> Option<ParsedPart<'_>> {
    let Some(headers_end) = find_bytes(part, HEADER_TERMINATOR) else {
        debug!("Skipping {} byte part without header terminator", part.len());
        return None;
    };

    let headers = String::from_utf8_lossy(&part[..headers_end]);
    let content = &part[headers_end + HEADER_TERMINATOR.len()..];

    Some(ParsedPart {
        name: quoted_param(&headers, "name"),
        filename: quoted_param(&headers, "filename"),
        content,
    })
}

/// Find `key="value"` in header text where `key` stands as a whole
/// parameter name. Empty values count as missing.
fn quoted_param(headers: &str, key: &str) -> Option<String> {
    let needle = format!("{key}=\"");
    let mut search_from = 0;

    while let Some(offset) = headers[search_from..].find(&needle) {
        let pos = search_from + offset;
        let standalone = headers[..pos]
            .chars()
            .next_back()
            .is_none_or(|c| c == ';' || c.is_whitespace());

        let value_start = pos + needle.len();
        if standalone {
            let value_len = headers[value_start..].find('"')?;
            let value = &headers[value_start..value_start + value_len];
            return (!value.is_empty()).then(|| value.to_string());
        }
        search_from = value_start;
    }

    None
}

/// Decode a complete multipart body into its fields.
pub fn decode(body: &[u8], boundary: &str) -> FormData {
    let mut form = FormData::default();

    for part in split_parts(body, boundary) {
        let Some(parsed) = parse_part(part) else {
            continue;
        };
        let Some(name) = parsed.name else {
            debug!("Dropping multipart part without a field name");
            continue;
        };

        let value = match parsed.filename {
            Some(filename) => {
                trace!(
                    "Field '{name}' is a file '{filename}' ({} bytes)",
                    parsed.content.len()
                );
                FieldValue::File(FilePart {
                    filename,
                    content: parsed.content.to_vec(),
                })
            }
            None => FieldValue::Text(String::from_utf8_lossy(parsed.content).trim().to_string()),
        };
        form.insert(name, value);
    }

    debug!("Decoded {} multipart fields", form.len());
    form
}

/// Binary-safe search for `needle` inside `haystack`.
fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &[u8] = b"--XYZ\r\n\
        Content-Disposition: form-data; name=\"documentName\"\r\n\
        \r\n\
        Report\r\n\
        --XYZ\r\n\
        Content-Disposition: form-data; name=\"documentFile\"; filename=\"a.pdf\"\r\n\
        Content-Type: application/pdf\r\n\
        \r\n\
        %PDF-1.4...\r\n\
        --XYZ--";

    #[test]
    fn test_decode_document_upload() {
        let form = decode(SCENARIO, "XYZ");

        assert_eq!(form.len(), 2);
        assert_eq!(form.text("documentName"), Some("Report"));
        assert_eq!(
            form.file("documentFile"),
            Some(&FilePart {
                filename: "a.pdf".to_string(),
                content: b"%PDF-1.4...".to_vec(),
            })
        );
    }

    #[test]
    fn test_split_parts_in_body_order() {
        let parts = split_parts(SCENARIO, "XYZ");
        assert_eq!(parts.len(), 2);
        assert!(parts[0].ends_with(b"Report"));
        assert!(parts[1].ends_with(b"%PDF-1.4..."));
    }

    #[test]
    fn test_leading_crlf_before_first_boundary() {
        let mut body = b"\r\n".to_vec();
        body.extend_from_slice(SCENARIO);

        let form = decode(&body, "XYZ");
        assert_eq!(form.text("documentName"), Some("Report"));
        assert!(form.file("documentFile").is_some());
    }

    #[test]
    fn test_preamble_before_first_boundary() {
        let mut body = b"This is a preamble.\r\n".to_vec();
        body.extend_from_slice(SCENARIO);

        let form = decode(&body, "XYZ");
        assert_eq!(form.len(), 2);
    }

    #[test]
    fn test_empty_and_missing_boundary() {
        assert!(decode(b"", "XYZ").is_empty());
        assert!(decode(b"no delimiters anywhere", "XYZ").is_empty());
        assert!(decode(SCENARIO, "OTHER").is_empty());
        assert!(decode(SCENARIO, "").is_empty());
        assert!(decode(b"--XYZ--\r\n", "XYZ").is_empty());
    }

    #[test]
    fn test_empty_file_is_preserved() {
        let body = b"--B\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"x.png\"\r\n\
            Content-Type: image/png\r\n\
            \r\n\
            \r\n\
            --B--\r\n";

        let form = decode(body, "B");
        let file = form.file("file").unwrap();
        assert_eq!(file.filename, "x.png");
        assert!(file.content.is_empty());
    }

    #[test]
    fn test_zero_length_part_is_split_but_not_decoded() {
        let body = b"--B\r\n\r\n--B\r\n\
            Content-Disposition: form-data; name=\"a\"\r\n\
            \r\n\
            1\r\n\
            --B--";

        let parts = split_parts(body, "B");
        assert_eq!(parts.len(), 2);
        assert!(parts[0].is_empty());

        let form = decode(body, "B");
        assert_eq!(form.len(), 1);
        assert_eq!(form.text("a"), Some("1"));
    }

    #[test]
    fn test_duplicate_names_last_write_wins() {
        let body = b"--B\r\n\
            Content-Disposition: form-data; name=\"documentName\"\r\n\
            \r\n\
            A\r\n\
            --B\r\n\
            Content-Disposition: form-data; name=\"documentName\"\r\n\
            \r\n\
            B\r\n\
            --B--";

        let form = decode(body, "B");
        assert_eq!(form.len(), 1);
        assert_eq!(form.text("documentName"), Some("B"));
    }

    #[test]
    fn test_binary_content_untouched() {
        let payload: Vec<u8> = vec![0x00, 0xff, 0x0d, 0x0a, 0x2d, 0x2d, 0x80, 0x0d, 0x0a];
        let mut body = b"--bin\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"blob.dat\"\r\n\
            \r\n"
            .to_vec();
        body.extend_from_slice(&payload);
        body.extend_from_slice(b"\r\n--bin--\r\n");

        let form = decode(&body, "bin");
        assert_eq!(form.file("file").unwrap().content, payload);
    }

    #[test]
    fn test_text_is_trimmed() {
        let body = b"--B\r\n\
            Content-Disposition: form-data; name=\"documentCategory\"\r\n\
            \r\n\
            \t  reports \r\n\r\n\
            --B--";

        let form = decode(body, "B");
        assert_eq!(form.text("documentCategory"), Some("reports"));
    }

    #[test]
    fn test_malformed_parts_are_skipped() {
        let body = b"--B\r\n\
            garbage without a blank line\r\n\
            --B\r\n\
            Content-Disposition: form-data; filename=\"orphan.txt\"\r\n\
            \r\n\
            nameless\r\n\
            --B\r\n\
            Content-Disposition: form-data; name=\"kept\"\r\n\
            \r\n\
            yes\r\n\
            --B--";

        let form = decode(body, "B");
        assert_eq!(form.len(), 1);
        assert_eq!(form.text("kept"), Some("yes"));
    }

    #[test]
    fn test_unterminated_trailing_part_is_dropped() {
        let body = b"--B\r\n\
            Content-Disposition: form-data; name=\"a\"\r\n\
            \r\n\
            1\r\n\
            --B\r\n\
            Content-Disposition: form-data; name=\"b\"\r\n\
            \r\n\
            cut off";

        let form = decode(body, "B");
        assert_eq!(form.text("a"), Some("1"));
        assert!(form.get("b").is_none());
    }

    #[test]
    fn test_quoted_param_matching() {
        let headers = r#"Content-Disposition: form-data; filename="f.txt"; name="upload""#;
        assert_eq!(quoted_param(headers, "name"), Some("upload".to_string()));
        assert_eq!(quoted_param(headers, "filename"), Some("f.txt".to_string()));

        let headers = r#"Content-Disposition: form-data; name="x"; filename="""#;
        assert_eq!(quoted_param(headers, "filename"), None);

        let headers = r#"Content-Disposition: form-data; NAME="upper""#;
        assert_eq!(quoted_param(headers, "name"), None);

        let headers = r#"Content-Disposition: form-data; name="отчёт 2024; v2""#;
        assert_eq!(
            quoted_param(headers, "name"),
            Some("отчёт 2024; v2".to_string())
        );
    }

    #[test]
    fn test_empty_filename_is_text() {
        let body = b"--B\r\n\
            Content-Disposition: form-data; name=\"file\"; filename=\"\"\r\n\
            Content-Type: application/octet-stream\r\n\
            \r\n\
            \r\n\
            --B--";

        let form = decode(body, "B");
        assert_eq!(form.text("file"), Some(""));
        assert!(form.file("file").is_none());
    }

    #[test]
    fn test_extract_boundary() {
        assert_eq!(
            extract_boundary("multipart/form-data; boundary=----WebKitFormBoundary7MA4YWxkTrZu0gW"),
            Some("----WebKitFormBoundary7MA4YWxkTrZu0gW".to_string())
        );
        assert_eq!(
            extract_boundary(r#"multipart/form-data; boundary="quoted""#),
            Some(r#""quoted""#.to_string())
        );
        assert_eq!(extract_boundary("multipart/form-data"), None);
        assert_eq!(extract_boundary("multipart/form-data; boundary="), None);
        assert_eq!(extract_boundary("application/json"), None);
    }

    #[test]
    fn test_take_file() {
        let mut form = decode(SCENARIO, "XYZ");
        assert!(form.take_file("documentName").is_none());
        assert_eq!(form.text("documentName"), Some("Report"));

        let file = form.take_file("documentFile").unwrap();
        assert_eq!(file.filename, "a.pdf");
        assert!(form.get("documentFile").is_none());
    }

    #[test]
    fn test_decode_is_idempotent() {
        assert_eq!(decode(SCENARIO, "XYZ"), decode(SCENARIO, "XYZ"));
    }
}
