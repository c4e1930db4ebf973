//! Receiver entry point for stream requests.
//!
//! [`StreamingHandler`] is what a route in the hosting framework calls. It
//! answers session start requests, recognises segment submissions by their
//! `X-Stream-*` headers, records each segment in the session's store and
//! waits until the stream is contiguous up to that segment before replying.
//! The terminal segment additionally reassembles the whole stream and retires
//! the session.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use tracing::{debug, info, warn};

pub mod config;
pub mod error;

pub use config::HandlerConfig;
pub use error::HandleError;

use crate::{
    metrics,
    protocol::{
        AckBody,
        Method,
        STREAM_DONE_HEADER,
        STREAM_ID_HEADER,
        STREAM_SEGMENT_HEADER,
        SegmentHeader,
        SegmentIndex,
        StartBody,
        StreamId,
        StreamRequest,
        StreamResponse,
    },
    registry::SessionRegistry,
    storage::StoreFactory,
};

/// A non-terminal segment that the stream is now contiguous up to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartialSegment {
    /// Stream the segment belongs to.
    pub id: StreamId,
    /// Position of the segment.
    pub index: SegmentIndex,
    /// Payload as read back from the store.
    pub data: Bytes,
}

/// The terminal segment together with the reassembled stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FinalizedStream {
    /// Stream that completed.
    pub id: StreamId,
    /// Index of the terminal segment.
    pub index: SegmentIndex,
    /// Payload of the terminal segment.
    pub data: Bytes,
    /// Every segment concatenated in index order.
    pub all: Bytes,
}

/// Outcome of an accepted segment submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Received {
    /// More segments are expected.
    Partial(PartialSegment),
    /// The stream is complete.
    Finalized(FinalizedStream),
}

impl Received {
    /// Stream the segment belonged to.
    #[must_use]
    pub fn id(&self) -> &StreamId {
        match self {
            Self::Partial(partial) => &partial.id,
            Self::Finalized(finalized) => &finalized.id,
        }
    }

    /// Index of the accepted segment.
    #[must_use]
    pub fn index(&self) -> SegmentIndex {
        match self {
            Self::Partial(partial) => partial.index,
            Self::Finalized(finalized) => finalized.index,
        }
    }

    /// Render a JSON acknowledgement for the sender.
    ///
    /// # Errors
    ///
    /// Returns [`serde_json::Error`] if the body cannot be encoded.
    pub fn to_response(&self) -> Result<StreamResponse, serde_json::Error> {
        let message = match self {
            Self::Partial(partial) => format!(
                "partial {} {} ({} bytes)",
                partial.id,
                partial.index,
                partial.data.len()
            ),
            Self::Finalized(finalized) => {
                format!("final {} ({} bytes)", finalized.id, finalized.all.len())
            }
        };
        StreamResponse::json(200, &AckBody { message })
    }
}

/// Handles session start and segment submission requests.
#[derive(Clone, Debug)]
pub struct StreamingHandler {
    registry: Arc<SessionRegistry>,
}

impl StreamingHandler {
    /// Create a handler from `config`, spawning the eviction sweeper.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn new(config: HandlerConfig) -> Self {
        info!(
            timeout = ?config.timeout(),
            backend = ?config.backend(),
            "streaming handler initialised"
        );
        Self::with_factory(config.backend().clone(), config.timeout())
    }

    /// Create a handler whose sessions are built by `factory`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn with_factory(factory: impl StoreFactory + 'static, timeout: Duration) -> Self {
        Self::from_registry(SessionRegistry::spawn(factory, timeout))
    }

    /// Wrap an existing registry.
    #[must_use]
    pub fn from_registry(registry: Arc<SessionRegistry>) -> Self { Self { registry } }

    /// Registry backing this handler.
    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> { &self.registry }

    /// Open a session, generating a random id unless one is supplied.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::DuplicateSession`] if `id` is already live, or
    /// [`HandleError::Encode`] if the response body cannot be encoded.
    pub fn start(&self, id: Option<StreamId>) -> Result<StreamResponse, HandleError> {
        let id = id.unwrap_or_else(StreamId::random);
        if !self.registry.add(id.clone()) {
            warn!(stream = %id, "rejecting start for existing stream");
            return Err(HandleError::DuplicateSession { id });
        }
        Ok(StreamResponse::json(200, &StartBody { stream_id: id })?)
    }

    /// Whether `request` carries every header of a segment submission.
    #[must_use]
    pub fn is_streaming_request(request: &StreamRequest) -> bool {
        request.has_header(STREAM_ID_HEADER)
            && request.has_header(STREAM_SEGMENT_HEADER)
            && request.has_header(STREAM_DONE_HEADER)
    }

    /// Parse the segment headers of `request`.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError::MissingHeaders`], [`HandleError::InvalidStreamId`]
    /// or [`HandleError::InvalidSegment`] when the headers are unusable.
    pub fn segment_header(request: &StreamRequest) -> Result<SegmentHeader, HandleError> {
        let (Some(id), Some(segment), Some(done)) = (
            request.header(STREAM_ID_HEADER),
            request.header(STREAM_SEGMENT_HEADER),
            request.header(STREAM_DONE_HEADER),
        ) else {
            return Err(HandleError::MissingHeaders);
        };
        let id = StreamId::new(id).ok_or(HandleError::InvalidStreamId)?;
        let index = segment
            .trim()
            .parse::<u64>()
            .map(SegmentIndex::new)
            .map_err(|_| HandleError::InvalidSegment {
                value: segment.to_owned(),
            })?;
        Ok(SegmentHeader::new(id, index, done == "true"))
    }

    /// Accept one segment submission.
    ///
    /// Resolves once the stream is contiguous up to the submitted segment. For
    /// the terminal segment it resolves with the reassembled stream and the
    /// session is removed.
    ///
    /// # Errors
    ///
    /// Returns [`HandleError`] when headers are invalid, the session is
    /// unknown, or storage fails.
    pub async fn handle(&self, request: &StreamRequest) -> Result<Received, HandleError> {
        let SegmentHeader { id, index, done } = Self::segment_header(request)?;
        debug!(stream = %id, segment = %index, done, "handling segment");

        let Some(store) = self.registry.get(&id) else {
            debug!(stream = %id, "segment for unknown stream");
            return Err(HandleError::SessionNotFound { id });
        };
        self.registry.reset_timeout(&id);

        let content = request.body().clone();
        debug!(stream = %id, segment = %index, len = content.len(), "received content");
        store.set(index, content.clone(), done).await?;
        metrics::inc_segments();

        if done {
            let all = store.get_final().await?;
            if let Err(err) = self.registry.delete(&id).await {
                warn!(stream = %id, error = %err, "failed to clear finalized stream");
            }
            metrics::inc_finalized();
            info!(stream = %id, segments = index.get() + 1, len = all.len(), "stream completed");
            return Ok(Received::Finalized(FinalizedStream {
                id,
                index,
                data: content,
                all,
            }));
        }

        let data = store.get(index).await?;
        debug!(stream = %id, segment = %index, "partial data resolved");
        Ok(Received::Partial(PartialSegment { id, index, data }))
    }

    /// Dispatch any request addressed to the stream endpoint.
    ///
    /// `GET` starts a session; `POST` submits a segment. Failures are
    /// rendered as responses with the matching status code. Accepted
    /// segments are returned alongside the acknowledgement so the caller can
    /// act on finalized streams.
    pub async fn respond(&self, request: &StreamRequest) -> (StreamResponse, Option<Received>) {
        let result = match request.method() {
            Method::Get => self.start(None).map(|response| (response, None)),
            Method::Post => match self.handle(request).await {
                Ok(received) => received
                    .to_response()
                    .map(|response| (response, Some(received)))
                    .map_err(HandleError::from),
                Err(err) => Err(err),
            },
        };
        result.unwrap_or_else(|err| {
            debug!(status = err.status(), error = %err, "request rejected");
            (err.into_response(), None)
        })
    }
}
