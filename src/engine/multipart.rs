//! Multipart Response Envelope
//!
//! Packages signed payloads into the protocol's `multipart/mixed` wire
//! envelope. The whole body is assembled in memory before any bytes go out,
//! so a failed build never produces a partial response.

use uuid::Uuid;

/// One body part: a named JSON document plus its part headers.
#[derive(Debug, Clone)]
pub struct Part {
    name: String,
    content_type: String,
    extra_headers: Vec<(String, String)>,
    body: String,
}

impl Part {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            extra_headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }
}

/// A `multipart/mixed` body with a generated boundary.
#[derive(Debug, Clone)]
pub struct MultipartBody {
    boundary: String,
    parts: Vec<Part>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: format!("----UpdraftBoundary{}", Uuid::new_v4().simple()),
            parts: Vec::new(),
        }
    }

    pub fn push(&mut self, part: Part) {
        self.parts.push(part);
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the response's `content-type` header.
    pub fn content_type_header(&self) -> String {
        format!("multipart/mixed; boundary={}", self.boundary)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for part in &self.parts {
            out.extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
            out.extend_from_slice(
                format!("content-disposition: form-data; name=\"{}\"\r\n", part.name).as_bytes(),
            );
            out.extend_from_slice(
                format!("content-type: {}\r\n", part.content_type).as_bytes(),
            );
            for (name, value) in &part.extra_headers {
                out.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
            }
            out.extend_from_slice(b"\r\n");
            out.extend_from_slice(part.body.as_bytes());
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        out
    }
}

impl Default for MultipartBody {
    fn default() -> Self {
        Self::new()
    }
}
