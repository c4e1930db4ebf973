//! Sending side of the stream protocol.
//!
//! [`StreamingClient`] negotiates a stream id, then walks a byte source
//! chunk by chunk, submitting each chunk as an indexed segment and waiting
//! for it to be confirmed before reading the next. Every segment is retried
//! independently with exponential back-off; a `4xx` response aborts the
//! whole transfer, and the server-side remains are left for its inactivity
//! eviction to clean up.
//!
//! Once the source is exhausted one more segment is sent, empty and flagged
//! `done`. The flag is never attached to the last data chunk after the fact.

use std::{
    any::Any,
    io,
    panic::{AssertUnwindSafe, catch_unwind},
    pin::pin,
};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::time::sleep;
use tracing::{debug, info, warn};

pub mod backoff;
pub mod error;
pub mod segment;

pub use backoff::{BackoffConfig, BackoffDelays};
pub use error::SendError;
pub use segment::SegmentState;
use segment::{SegmentRetry, Step};

use crate::{
    metrics,
    protocol::{SegmentHeader, SegmentIndex, StreamId, StreamRequest, StreamResponse},
    transport::Transport,
};

/// Result of a completed transfer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendOutcome {
    response: StreamResponse,
    segments: u64,
}

impl SendOutcome {
    /// Construct an outcome.
    #[must_use]
    pub const fn new(response: StreamResponse, segments: u64) -> Self {
        Self { response, segments }
    }

    /// Server's confirmation of the terminal segment.
    #[must_use]
    pub const fn response(&self) -> &StreamResponse { &self.response }

    /// Consume the outcome, returning the terminal confirmation.
    #[must_use]
    pub fn into_response(self) -> StreamResponse { self.response }

    /// Segments sent, including the terminal one.
    #[must_use]
    pub const fn segments(&self) -> u64 { self.segments }
}

/// Client streaming byte sources to a receiver over a [`Transport`].
///
/// # Examples
///
/// ```no_run
/// use std::io;
///
/// use bytes::Bytes;
/// use futures::stream;
/// use wirestream::{
///     client::{SendError, StreamingClient},
///     handler::{HandlerConfig, StreamingHandler},
///     transport::LoopbackTransport,
/// };
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), SendError> {
/// let handler = StreamingHandler::new(HandlerConfig::default());
/// let client = StreamingClient::new(LoopbackTransport::new(handler));
///
/// let id = client.start().await?;
/// let chunks = stream::iter([Ok::<_, io::Error>(Bytes::from_static(b"hello"))]);
/// let outcome = client.send(&id, chunks).await?;
/// assert_eq!(outcome.segments(), 2);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct StreamingClient<T> {
    transport: T,
    backoff: BackoffConfig,
}

impl<T: Transport> StreamingClient<T> {
    /// Send over `transport` with the default back-off.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            backoff: BackoffConfig::default(),
        }
    }

    /// Replace the back-off policy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Active back-off policy.
    #[must_use]
    pub const fn backoff(&self) -> &BackoffConfig { &self.backoff }

    /// Underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T { &self.transport }

    /// Ask the receiver to open a stream and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Connectivity`] if the request cannot be delivered
    /// and [`SendError::Protocol`] if the response is unsuccessful or its
    /// body lacks a string `streamId`.
    pub async fn start(&self) -> Result<StreamId, SendError> {
        debug!("getting started with streaming");
        let response = self.transport.call(StreamRequest::start()).await?;
        if !response.is_success() {
            return Err(SendError::Protocol(format!(
                "failed to start streaming: status {}",
                response.status()
            )));
        }
        let body: serde_json::Value = response
            .decode_json()
            .map_err(|err| SendError::Protocol(format!("malformed start response: {err}")))?;
        let id = body
            .get("streamId")
            .and_then(serde_json::Value::as_str)
            .and_then(|id| StreamId::new(id))
            .ok_or_else(|| SendError::Protocol("invalid stream id".into()))?;
        info!(stream = %id, "stream started");
        Ok(id)
    }

    /// Stream `source` as stream `id`.
    ///
    /// # Errors
    ///
    /// See [`send_with`](Self::send_with).
    pub async fn send<S, B>(&self, id: &StreamId, source: S) -> Result<SendOutcome, SendError>
    where
        S: Stream<Item = io::Result<B>>,
        B: Into<Bytes>,
    {
        self.send_with(id, source, |_, _| {}).await
    }

    /// Stream `source` as stream `id`, reporting each confirmed segment.
    ///
    /// `on_segment` runs after every confirmed non-terminal segment; the
    /// terminal confirmation is returned instead. A panicking observer is
    /// logged and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Source`] if `source` yields an error, and the
    /// first segment failure otherwise: [`SendError::ServerPermanent`] for a
    /// `4xx`, or [`SendError::RetryExhausted`] once a segment's attempt budget
    /// is spent. No later segments are attempted after a failure.
    pub async fn send_with<S, B, F>(
        &self,
        id: &StreamId,
        source: S,
        mut on_segment: F,
    ) -> Result<SendOutcome, SendError>
    where
        S: Stream<Item = io::Result<B>>,
        B: Into<Bytes>,
        F: FnMut(&StreamResponse, SegmentIndex),
    {
        info!(stream = %id, "starting to send stream");
        let mut source = pin!(source);
        let mut index = SegmentIndex::zero();
        loop {
            let (body, done) = match source.next().await {
                Some(Ok(chunk)) => (chunk.into(), false),
                Some(Err(err)) => return Err(SendError::Source(err)),
                None => (Bytes::new(), true),
            };
            debug!(stream = %id, segment = %index, done, len = body.len(), "sending segment");
            let header = SegmentHeader::new(id.clone(), index, done);
            let response = self.send_segment(&header, body).await?;
            if done {
                info!(stream = %id, segments = index.get() + 1, "stream sent");
                return Ok(SendOutcome::new(response, index.get() + 1));
            }
            notify(&mut on_segment, &response, index);
            index = index
                .checked_next()
                .ok_or_else(|| SendError::Protocol("segment index overflow".into()))?;
        }
    }

    /// Deliver one segment, retrying transient failures with back-off.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::ServerPermanent`] on a `4xx` response and
    /// [`SendError::RetryExhausted`] when every attempt failed transiently.
    pub async fn send_segment(
        &self,
        header: &SegmentHeader,
        body: Bytes,
    ) -> Result<StreamResponse, SendError> {
        let request = StreamRequest::segment(header, body);
        let mut retry = SegmentRetry::new(header.index, &self.backoff);
        loop {
            let outcome = self
                .transport
                .call(request.clone())
                .await
                .map_err(SendError::from);
            match retry.complete(outcome) {
                Step::Confirmed(response) => return Ok(response),
                Step::Failed(err) => return Err(err),
                Step::Retry(delay) => {
                    metrics::inc_retries();
                    sleep(delay).await;
                }
            }
        }
    }
}

fn notify<F>(observer: &mut F, response: &StreamResponse, index: SegmentIndex)
where
    F: FnMut(&StreamResponse, SegmentIndex),
{
    debug!(segment = %index, "calling segment observer");
    if let Err(payload) = catch_unwind(AssertUnwindSafe(|| observer(response, index))) {
        warn!(segment = %index, panic = panic_message(payload.as_ref()), "segment observer panicked");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&'static str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}
