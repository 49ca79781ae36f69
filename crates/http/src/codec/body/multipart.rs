//! `multipart/*` bodies (RFC 2046).
//!
//! The whole body is already in memory. Parsing walks it line by line with a
//! [`BufferedReader`] and derives every part's byte range from the consumed
//! counts, so parts are views into the shared parent buffer and the payload is
//! never copied until [`BodyPart::to_vec`] is called.

use std::fmt;
use std::ops::Range;

use bytes::Bytes;
use http::{HeaderMap, header};
use tracing::{debug, info};

use crate::codec::header::{read_headers, split_header_value};
use crate::codec::{BufferedReader, LineEncoding, StreamReader};
use crate::protocol::ParseError;

/// The parts of a multipart body keyed by their derived names, in wire order.
#[derive(Debug, Clone, Default)]
pub struct Multipart {
    parts: Vec<(String, BodyPart)>,
}

impl Multipart {
    /// Looks up a part by name, the last part with that name wins.
    pub fn get(&self, name: &str) -> Option<&BodyPart> {
        self.parts.iter().rev().find(|(key, _)| key == name).map(|(_, part)| part)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BodyPart)> {
        self.parts.iter().map(|(name, part)| (name.as_str(), part))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

/// One part of a multipart body.
#[derive(Clone)]
pub struct BodyPart {
    parent: Bytes,
    // header block start to payload end
    range: Range<usize>,
    content_offset: usize,
    headers: HeaderMap,
}

impl BodyPart {
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The part payload as a view into the parent buffer.
    pub fn body(&self) -> Bytes {
        self.parent.slice(self.content_offset..self.range.end)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.parent[self.content_offset..self.range.end].to_vec()
    }

    pub fn len(&self) -> usize {
        self.range.end - self.content_offset
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn content_type(&self) -> Option<mime::Mime> {
        self.headers.get(header::CONTENT_TYPE)?.to_str().ok()?.parse().ok()
    }

    /// Parses the payload as a nested multipart body.
    ///
    /// Returns `Ok(None)` when the part is not `multipart/*` or has no
    /// boundary.
    pub async fn parse_nested(&self) -> Result<Option<Multipart>, ParseError> {
        let Some(content_type) = self.content_type() else {
            return Ok(None);
        };
        if content_type.type_() != mime::MULTIPART {
            return Ok(None);
        }
        match content_type.get_param(mime::BOUNDARY) {
            Some(boundary) => parse_multipart(self.body(), boundary.as_str()).await.map(Some),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for BodyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BodyPart").field("headers", &self.headers).field("len", &self.len()).finish()
    }
}

/// Renders the part as it appeared on the wire, headers included.
impl fmt::Display for BodyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.parent[self.range.clone()]))
    }
}

struct OpenPart {
    start: usize,
    content_offset: usize,
    headers: HeaderMap,
}

/// Splits `raw` into parts separated by `--boundary` delimiter lines.
pub async fn parse_multipart(raw: Bytes, boundary: &str) -> Result<Multipart, ParseError> {
    let delimiter = format!("--{boundary}");
    let mut reader = BufferedReader::new(&raw[..]).encoding(LineEncoding::Utf8);
    let mut multipart = Multipart::default();
    let mut open: Option<OpenPart> = None;
    let mut seen_delimiter = false;
    let mut position = 0;

    while let Some(line) = reader.read_line().await? {
        let line_start = position;
        position += reader.last_consumed();

        let Some(closing) = delimiter_kind(&line, &delimiter) else {
            continue;
        };
        seen_delimiter = true;

        if let Some(part) = open.take() {
            let end = strip_preceding_line_break(&raw, part.content_offset, line_start);
            close_part(&mut multipart, &raw, part, end)?;
        }

        if closing {
            let epilogue = raw.len() - position;
            if epilogue > 0 {
                info!(len = epilogue, "ignore multipart epilogue");
            }
            return Ok(multipart);
        }

        let mut headers = HeaderMap::new();
        let header_len = read_headers(&mut reader, &mut headers).await?;
        open = Some(OpenPart { start: position, content_offset: position + header_len, headers });
        position += header_len;
    }

    if !seen_delimiter {
        return Err(ParseError::invalid_multipart(format!("no delimiter for boundary {boundary:?}")));
    }

    if let Some(part) = open.take() {
        debug!("multipart body has no closing delimiter, keep the last part");
        close_part(&mut multipart, &raw, part, raw.len())?;
    }

    Ok(multipart)
}

/// `Some(false)` for a part delimiter, `Some(true)` for the closing one.
fn delimiter_kind(line: &str, delimiter: &str) -> Option<bool> {
    let rest = line.strip_prefix(delimiter)?;
    let (closing, rest) = match rest.strip_prefix("--") {
        Some(rest) => (true, rest),
        None => (false, rest),
    };
    // transport padding
    rest.trim_end_matches([' ', '\t']).is_empty().then_some(closing)
}

/// The CRLF (or LF) before a delimiter belongs to the delimiter, not the part.
fn strip_preceding_line_break(raw: &[u8], lower: usize, mut end: usize) -> usize {
    if end > lower && raw[end - 1] == b'\n' {
        end -= 1;
        if end > lower && raw[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
}

fn close_part(multipart: &mut Multipart, raw: &Bytes, part: OpenPart, end: usize) -> Result<(), ParseError> {
    let name = part_name(&part.headers, multipart.len())?;
    let body_part = BodyPart {
        parent: raw.clone(),
        range: part.start..end,
        content_offset: part.content_offset,
        headers: part.headers,
    };
    multipart.parts.push((name, body_part));
    Ok(())
}

fn part_name(headers: &HeaderMap, index: usize) -> Result<String, ParseError> {
    if let Some(value) = headers.get(header::CONTENT_DISPOSITION) {
        let disposition = split_header_value(&String::from_utf8_lossy(value.as_bytes()))?;
        let name = if disposition.base().eq_ignore_ascii_case("form-data") {
            disposition.param("name")
        } else if disposition.base().eq_ignore_ascii_case("file") {
            disposition.param("filename")
        } else {
            None
        };
        if let Some(name) = name {
            return Ok(name.to_string());
        }
    }
    Ok(index.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn form_with_binary_file(file: &[u8]) -> Bytes {
        let mut raw = Vec::new();
        raw.extend_from_slice(b"preamble\r\n--XyZ\r\n");
        raw.extend_from_slice(b"Content-Disposition: form-data; name=\"file\"; filename=\"a.bin\"\r\n");
        raw.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        raw.extend_from_slice(file);
        raw.extend_from_slice(b"\r\n--XyZ\r\n");
        raw.extend_from_slice(b"Content-Disposition: form-data; name=\"field\"\r\n\r\n");
        raw.extend_from_slice("caf\u{e9} \u{2615}".as_bytes());
        raw.extend_from_slice(b"\r\n--XyZ--\r\n");
        Bytes::from(raw)
    }

    #[tokio::test]
    async fn test_file_and_field() {
        let file = [0u8, 255, 13, 10, 45, 45, 88, 121, 90, 13, 0, 10, 200];
        let multipart = parse_multipart(form_with_binary_file(&file), "XyZ").await.unwrap();

        assert_eq!(multipart.len(), 2);
        assert_eq!(multipart.names().collect::<Vec<_>>(), vec!["file", "field"]);

        let file_part = multipart.get("file").unwrap();
        assert_eq!(file_part.to_vec(), file.to_vec());
        assert_eq!(file_part.content_type(), Some(mime::APPLICATION_OCTET_STREAM));

        let field = multipart.get("field").unwrap();
        assert_eq!(String::from_utf8(field.to_vec()).unwrap(), "caf\u{e9} \u{2615}");
    }

    #[tokio::test]
    async fn test_part_display_is_wire_form() {
        let raw = indoc! {"
            --b
            Content-Disposition: form-data; name=\"a\"

            one
            --b--
        "};
        let multipart = parse_multipart(Bytes::from_static(raw.as_bytes()), "b").await.unwrap();
        let part = multipart.get("a").unwrap();

        assert_eq!(part.to_string(), "Content-Disposition: form-data; name=\"a\"\n\none");
        assert_eq!(&part.body()[..], b"one");
    }

    #[tokio::test]
    async fn test_nested_mixed() {
        let raw = indoc! {"
            --outer
            Content-Disposition: form-data; name=\"files\"
            Content-Type: multipart/mixed; boundary=inner

            --inner
            Content-Disposition: file; filename=\"one.txt\"

            first file
            --inner
            Content-Type: text/plain

            second file
            --inner--
            --outer--
        "};
        let multipart = parse_multipart(Bytes::from_static(raw.as_bytes()), "outer").await.unwrap();
        let files = multipart.get("files").unwrap().parse_nested().await.unwrap().unwrap();

        assert_eq!(files.len(), 2);
        assert_eq!(&files.get("one.txt").unwrap().body()[..], b"first file");
        // unnamed parts are keyed by position
        assert_eq!(&files.get("1").unwrap().body()[..], b"second file");
    }

    #[tokio::test]
    async fn test_parse_nested_on_plain_part() {
        let raw = "--b\r\nContent-Type: text/plain\r\n\r\nhi\r\n--b--";
        let multipart = parse_multipart(Bytes::from_static(raw.as_bytes()), "b").await.unwrap();
        assert!(multipart.get("0").unwrap().parse_nested().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_closing_delimiter_keeps_last_part() {
        let raw = "--b\r\nContent-Disposition: form-data; name=x\r\n\r\nvalue";
        let multipart = parse_multipart(Bytes::from_static(raw.as_bytes()), "b").await.unwrap();
        assert_eq!(&multipart.get("x").unwrap().body()[..], b"value");
    }

    #[tokio::test]
    async fn test_epilogue_is_ignored() {
        let raw = "--b\r\n\r\nvalue\r\n--b--\r\nthis is the epilogue\r\n--b\r\n\r\nignored";
        let multipart = parse_multipart(Bytes::from_static(raw.as_bytes()), "b").await.unwrap();
        assert_eq!(multipart.len(), 1);
        assert_eq!(&multipart.get("0").unwrap().body()[..], b"value");
    }

    #[tokio::test]
    async fn test_duplicate_names_last_wins() {
        let raw = "--b\r\nContent-Disposition: form-data; name=x\r\n\r\n1\r\n--b\r\nContent-Disposition: form-data; name=x\r\n\r\n2\r\n--b--";
        let multipart = parse_multipart(Bytes::from_static(raw.as_bytes()), "b").await.unwrap();
        assert_eq!(multipart.len(), 2);
        assert_eq!(&multipart.get("x").unwrap().body()[..], b"2");
    }

    #[tokio::test]
    async fn test_body_without_delimiter() {
        let result = parse_multipart(Bytes::from_static(b"just text"), "b").await;
        assert!(matches!(result, Err(ParseError::InvalidMultipart { .. })));
    }

    #[tokio::test]
    async fn test_unterminated_part_headers() {
        let result = parse_multipart(Bytes::from_static(b"--b\r\nContent-Type: text/plain\r\n"), "b").await;
        assert!(matches!(result, Err(ParseError::Truncated { .. })));
    }
}
