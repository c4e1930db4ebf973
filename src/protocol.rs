//! Wire vocabulary shared by the sender and the receiving handler.
//!
//! A segment submission is a `POST` carrying three `X-Stream-*` headers and
//! the raw segment bytes as its body. Session start is a `GET` on the same
//! endpoint answered with a JSON body naming the new stream id. The types in
//! this module model those requests and responses independently of any
//! hosting framework so the dispatch layer can translate them however it
//! likes.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

/// Header carrying the opaque stream id.
pub const STREAM_ID_HEADER: &str = "X-Stream-Id";
/// Header carrying the decimal segment index.
pub const STREAM_SEGMENT_HEADER: &str = "X-Stream-Segment";
/// Header carrying `"true"` on the terminal segment and `"false"` otherwise.
pub const STREAM_DONE_HEADER: &str = "X-Stream-Done";
/// Content type used for segment bodies.
pub const OCTET_STREAM: &str = "application/octet-stream";
/// Content type used for start and acknowledgement bodies.
pub const APPLICATION_JSON: &str = "application/json";

/// Opaque identifier of one logical stream.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    /// Wrap an id string. Empty ids are rejected.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        (!id.is_empty()).then_some(Self(id))
    }

    /// Generate a fresh random id.
    #[must_use]
    pub fn random() -> Self { Self(uuid::Uuid::new_v4().to_string()) }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Zero-based position of a segment within its stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentIndex(u64);

impl SegmentIndex {
    /// Create an index from a raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self { Self(value) }

    /// The first segment of every stream.
    #[must_use]
    pub const fn zero() -> Self { Self(0) }

    /// Return the raw value.
    #[must_use]
    pub const fn get(self) -> u64 { self.0 }

    /// Return the following index, or `None` on overflow.
    #[must_use]
    pub const fn checked_next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(next) => Some(Self(next)),
            None => None,
        }
    }
}

impl From<u64> for SegmentIndex {
    fn from(value: u64) -> Self { Self(value) }
}

impl fmt::Display for SegmentIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

/// Request verb understood by the stream endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    /// Session start.
    Get,
    /// Segment submission.
    Post,
}

impl Method {
    /// Upper-case verb as written on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// Headers identifying one segment submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Stream the segment belongs to.
    pub id: StreamId,
    /// Position of the segment.
    pub index: SegmentIndex,
    /// Whether this is the terminal segment.
    pub done: bool,
}

impl SegmentHeader {
    /// Construct a header for `index` of stream `id`.
    #[must_use]
    pub fn new(id: StreamId, index: SegmentIndex, done: bool) -> Self { Self { id, index, done } }
}

/// A framework-neutral request addressed to the stream endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamRequest {
    method: Method,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl StreamRequest {
    /// Construct an empty request with the given method.
    #[must_use]
    pub fn new(method: Method) -> Self {
        Self {
            method,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Build a session start request.
    #[must_use]
    pub fn start() -> Self { Self::new(Method::Get) }

    /// Build a segment submission carrying `body`.
    #[must_use]
    pub fn segment(header: &SegmentHeader, body: Bytes) -> Self {
        Self::new(Method::Post)
            .with_header("Content-Type", OCTET_STREAM)
            .with_header(STREAM_ID_HEADER, header.id.as_str())
            .with_header(STREAM_SEGMENT_HEADER, header.index.to_string())
            .with_header(STREAM_DONE_HEADER, if header.done { "true" } else { "false" })
            .with_body(body)
    }

    /// Append a header, keeping any existing value with the same name.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the request body.
    #[must_use]
    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }

    /// Request verb.
    #[must_use]
    pub const fn method(&self) -> Method { self.method }

    /// First value of header `name`, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Whether header `name` is present at all.
    #[must_use]
    pub fn has_header(&self, name: &str) -> bool { self.header(name).is_some() }

    /// All headers in insertion order.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    /// Borrow the request body.
    #[must_use]
    pub fn body(&self) -> &Bytes { &self.body }
}

/// A framework-neutral response from the stream endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamResponse {
    status: u16,
    content_type: Option<&'static str>,
    body: Bytes,
}

impl StreamResponse {
    /// Construct a response with the given status and body.
    #[must_use]
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            content_type: None,
            body: body.into(),
        }
    }

    /// Serialise `value` as a JSON response.
    ///
    /// # Errors
    ///
    /// Returns any [`serde_json::Error`] raised while encoding `value`.
    pub fn json<T: Serialize>(status: u16, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self {
            status,
            content_type: Some(APPLICATION_JSON),
            body: Bytes::from(body),
        })
    }

    /// Numeric status code.
    #[must_use]
    pub const fn status(&self) -> u16 { self.status }

    /// Declared content type, if any.
    #[must_use]
    pub const fn content_type(&self) -> Option<&'static str> { self.content_type }

    /// Whether the status is in the `2xx` range.
    #[must_use]
    pub const fn is_success(&self) -> bool { self.status >= 200 && self.status < 300 }

    /// Whether the status is in the `4xx` range.
    #[must_use]
    pub const fn is_client_error(&self) -> bool { self.status >= 400 && self.status < 500 }

    /// Borrow the response body.
    #[must_use]
    pub fn body(&self) -> &Bytes { &self.body }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns any [`serde_json::Error`] raised while decoding.
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// Body returned by a successful session start.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartBody {
    /// Id assigned to the new stream.
    #[serde(rename = "streamId")]
    pub stream_id: StreamId,
}

/// Body returned for every accepted segment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckBody {
    /// Human-readable summary of what was accepted.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn stream_id_rejects_empty() {
        assert!(StreamId::new("").is_none());
        assert_eq!(StreamId::new("abc").map(|id| id.to_string()), Some("abc".into()));
    }

    #[test]
    fn segment_request_carries_stream_headers() {
        let id = StreamId::new("s1").expect("non-empty id");
        let header = SegmentHeader::new(id, SegmentIndex::new(7), true);
        let request = StreamRequest::segment(&header, Bytes::from_static(b"xy"));

        assert_eq!(request.method(), Method::Post);
        assert_eq!(request.header("x-stream-id"), Some("s1"));
        assert_eq!(request.header(STREAM_SEGMENT_HEADER), Some("7"));
        assert_eq!(request.header(STREAM_DONE_HEADER), Some("true"));
        assert_eq!(request.header("content-type"), Some(OCTET_STREAM));
        assert_eq!(request.body().as_ref(), b"xy");
    }

    #[rstest]
    #[case(199, false, false)]
    #[case(200, true, false)]
    #[case(299, true, false)]
    #[case(404, false, true)]
    #[case(499, false, true)]
    #[case(500, false, false)]
    fn response_classification(#[case] status: u16, #[case] ok: bool, #[case] client: bool) {
        let response = StreamResponse::new(status, Bytes::new());
        assert_eq!(response.is_success(), ok);
        assert_eq!(response.is_client_error(), client);
    }

    #[test]
    fn start_body_uses_camel_case_field() {
        let id = StreamId::new("abc").expect("non-empty id");
        let response =
            StreamResponse::json(200, &StartBody { stream_id: id.clone() }).expect("encode");
        assert_eq!(response.body().as_ref(), br#"{"streamId":"abc"}"#);
        let decoded: StartBody = response.decode_json().expect("decode");
        assert_eq!(decoded.stream_id, id);
    }
}
