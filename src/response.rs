//! Buffered response writer.
//!
//! Handlers never build a response value. They write into the [`ResponseWriter`]
//! owned by their [`Context`](crate::Context); the dispatcher turns the buffer into
//! one `http::Response` once the chain has finished.

use std::io;
use std::mem;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use tracing::warn;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for [`Context::bytes`](crate::Context::bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentType {
    Csv,          // text/csv
    EventStream,  // text/event-stream  (SSE)
    FormData,     // application/x-www-form-urlencoded
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    MsgPack,      // application/msgpack
    OctetStream,  // application/octet-stream  (binary / file download)
    Pdf,          // application/pdf
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv         => "text/csv",
            Self::EventStream => "text/event-stream",
            Self::FormData    => "application/x-www-form-urlencoded",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::MsgPack     => "application/msgpack",
            Self::OctetStream => "application/octet-stream",
            Self::Pdf         => "application/pdf",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }
}

// ── ResponseWriter ────────────────────────────────────────────────────────────

/// The outbound half of a request/response pair.
///
/// The status line is committed by the first [`write_header`](Self::write_header) or
/// body write; later `write_header` calls are ignored and logged, mirroring how a
/// streaming writer behaves once headers are on the wire.
#[derive(Debug)]
pub struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    written: bool,
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            written: false,
        }
    }
}

impl ResponseWriter {
    pub fn status(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// `true` once a status has been committed.
    pub fn written(&self) -> bool { self.written }

    /// Number of body bytes written so far.
    pub fn size(&self) -> usize { self.body.len() }

    pub fn write_header(&mut self, status: StatusCode) {
        if self.written {
            warn!(
                committed = self.status.as_u16(),
                attempted = status.as_u16(),
                "superfluous write_header call ignored"
            );
            return;
        }
        self.status = status;
        self.written = true;
    }

    /// Appends to the body, committing `200 OK` if no status was written yet.
    pub fn write_bytes(&mut self, data: &[u8]) {
        if !self.written {
            self.write_header(StatusCode::OK);
        }
        self.body.extend_from_slice(data);
    }

    pub fn set_content_type(&mut self, content_type: ContentType) {
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type.as_str()));
    }

    /// Drops everything buffered so far. Keeps the body allocation.
    pub(crate) fn reset(&mut self) {
        self.status = StatusCode::OK;
        self.headers.clear();
        self.body.clear();
        self.written = false;
    }

    /// Moves the buffered response out, leaving the writer reset.
    pub(crate) fn take_response(&mut self) -> http::Response<Full<Bytes>> {
        let body = Bytes::from(mem::take(&mut self.body));
        let mut response = http::Response::new(Full::new(body));
        *response.status_mut() = self.status;
        *response.headers_mut() = mem::take(&mut self.headers);
        self.reset();
        response
    }
}

impl io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
