//! Request body decoding.
//!
//! The dispatcher hands the raw bytes of a `POST`, `PUT` or `PATCH` body to
//! the first [`Decoder`] that accepts the request's media type. Three are
//! built in:
//!
//! | Media type                          | Result                              |
//! |-------------------------------------|-------------------------------------|
//! | `application/x-www-form-urlencoded` | string fields                       |
//! | `application/json`                  | the parsed document                 |
//! | `multipart/form-data`               | string fields + in-memory files     |
//!
//! Anything else decodes to an empty [`Body`]. Register your own decoder with
//! [`Router::decoder`](crate::Router::decoder); it is consulted first.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{Map, Value};

/// A decoded request body.
#[derive(Clone, Debug)]
pub struct Body {
    value: Value,
    files: HashMap<String, UploadedFile>,
}

impl Default for Body {
    fn default() -> Self {
        Self { value: Value::Object(Map::new()), files: HashMap::new() }
    }
}

impl Body {
    /// A body whose fields are the members of `value` when it is an object.
    pub fn from_value(value: Value) -> Self {
        Self { value, files: HashMap::new() }
    }

    /// Adds or replaces a field. Turns a non-object body into an object.
    pub fn insert_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        if !self.value.is_object() {
            self.value = Value::Object(Map::new());
        }
        if let Value::Object(map) = &mut self.value {
            map.insert(name.into(), value.into());
        }
    }

    pub fn insert_file(&mut self, field: impl Into<String>, file: UploadedFile) {
        self.files.insert(field.into(), file);
    }

    /// The whole decoded document.
    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.value.as_object()?.get(name)
    }

    /// A field that decoded to a string.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_str()
    }

    pub fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.get(field)
    }

    pub fn files(&self) -> &HashMap<String, UploadedFile> {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
            && match &self.value {
                Value::Object(map) => map.is_empty(),
                Value::Null => true,
                _ => false,
            }
    }
}

/// A file part of a `multipart/form-data` body, held in memory.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Why a body could not be decoded. Finalized as a `500` page.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid json body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("multipart body without a boundary parameter")]
    MissingBoundary,

    #[error("malformed multipart body: {0}")]
    Multipart(&'static str),

    /// Raised by a decoder registered with [`Router::decoder`](crate::Router::decoder).
    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}

/// Turns raw body bytes into a [`Body`] for the media types it accepts.
pub trait Decoder: Send + Sync + 'static {
    /// `media_type` is the lowercased `Content-Type` without parameters.
    fn accepts(&self, media_type: &str) -> bool;

    /// `content_type` is the full header value, parameters included.
    fn decode(&self, content_type: &str, bytes: &[u8]) -> Result<Body, DecodeError>;
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Ordered decoders: user-registered first, then the built-ins.
#[derive(Clone)]
pub(crate) struct Decoders {
    chain: Vec<Arc<dyn Decoder>>,
    custom: usize,
}

impl Default for Decoders {
    fn default() -> Self {
        Self {
            chain: vec![Arc::new(FormDecoder), Arc::new(JsonDecoder), Arc::new(MultipartDecoder)],
            custom: 0,
        }
    }
}

impl Decoders {
    /// Registers `decoder` after earlier custom decoders, before the built-ins.
    pub(crate) fn push(&mut self, decoder: impl Decoder) {
        self.chain.insert(self.custom, Arc::new(decoder));
        self.custom += 1;
    }

    pub(crate) fn decode(&self, content_type: Option<&str>, bytes: &[u8]) -> Result<Body, DecodeError> {
        let Some(content_type) = content_type else {
            return Ok(Body::default());
        };
        let media = media_type(content_type);
        match self.chain.iter().find(|d| d.accepts(&media)) {
            Some(decoder) => decoder.decode(content_type, bytes),
            None => Ok(Body::default()),
        }
    }
}

fn media_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

// ── Built-ins ─────────────────────────────────────────────────────────────────

struct FormDecoder;

impl Decoder for FormDecoder {
    fn accepts(&self, media_type: &str) -> bool {
        media_type == "application/x-www-form-urlencoded"
    }

    fn decode(&self, _content_type: &str, bytes: &[u8]) -> Result<Body, DecodeError> {
        let mut body = Body::default();
        for (k, v) in url::form_urlencoded::parse(bytes) {
            body.insert_field(k.into_owned(), v.into_owned());
        }
        Ok(body)
    }
}

struct JsonDecoder;

impl Decoder for JsonDecoder {
    fn accepts(&self, media_type: &str) -> bool {
        media_type == "application/json"
    }

    fn decode(&self, _content_type: &str, bytes: &[u8]) -> Result<Body, DecodeError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Body::default());
        }
        Ok(Body::from_value(serde_json::from_slice(bytes)?))
    }
}

struct MultipartDecoder;

impl Decoder for MultipartDecoder {
    fn accepts(&self, media_type: &str) -> bool {
        media_type == "multipart/form-data"
    }

    fn decode(&self, content_type: &str, bytes: &[u8]) -> Result<Body, DecodeError> {
        let boundary = boundary(content_type).ok_or(DecodeError::MissingBoundary)?;
        let delimiter = format!("--{boundary}").into_bytes();

        let mut body = Body::default();
        let mut rest = match find(bytes, &delimiter) {
            Some(i) => &bytes[i + delimiter.len()..],
            None => return Err(DecodeError::Multipart("no opening delimiter")),
        };

        loop {
            // `--` right after a delimiter closes the body.
            if rest.starts_with(b"--") {
                break;
            }
            rest = rest.strip_prefix(b"\r\n").unwrap_or(rest);

            let end = find(rest, &delimiter).ok_or(DecodeError::Multipart("unterminated part"))?;
            let part = &rest[..end];
            let part = part.strip_suffix(b"\r\n").unwrap_or(part);
            read_part(part, &mut body)?;

            rest = &rest[end + delimiter.len()..];
        }

        Ok(body)
    }
}

fn read_part(part: &[u8], body: &mut Body) -> Result<(), DecodeError> {
    let split = find(part, b"\r\n\r\n").ok_or(DecodeError::Multipart("part without headers"))?;
    let headers = String::from_utf8_lossy(&part[..split]);
    let content = &part[split + 4..];

    let mut name = None;
    let mut filename = None;
    let mut content_type = None;

    for line in headers.split("\r\n") {
        let Some((key, value)) = line.split_once(':') else { continue };
        let key = key.trim();
        if key.eq_ignore_ascii_case("content-disposition") {
            for attr in value.split(';').map(str::trim) {
                if let Some(v) = attr.strip_prefix("name=") {
                    name = Some(v.trim_matches('"').to_owned());
                } else if let Some(v) = attr.strip_prefix("filename=") {
                    filename = Some(v.trim_matches('"').to_owned());
                }
            }
        } else if key.eq_ignore_ascii_case("content-type") {
            content_type = Some(value.trim().to_owned());
        }
    }

    let Some(name) = name else {
        return Ok(());
    };

    match filename {
        Some(filename) => body.insert_file(
            name,
            UploadedFile { filename, content_type, bytes: content.to_vec() },
        ),
        None => body.insert_field(name, String::from_utf8_lossy(content).into_owned()),
    }
    Ok(())
}

fn boundary(content_type: &str) -> Option<&str> {
    content_type
        .split(';')
        .map(str::trim)
        .find_map(|p| p.strip_prefix("boundary="))
        .map(|b| b.trim_matches('"'))
        .filter(|b| !b.is_empty())
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
