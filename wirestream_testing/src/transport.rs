//! Scripted transport replaying canned replies.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::Instant;
use wirestream::{
    SegmentIndex,
    StreamRequest,
    StreamResponse,
    Transport,
    TransportError,
    handler::StreamingHandler,
    protocol::Method,
};

type Reply = Result<StreamResponse, TransportError>;
type Fallback = dyn Fn(&StreamRequest) -> Reply + Send + Sync;

/// A request seen by [`ScriptedTransport`], stamped with the (possibly
/// paused) Tokio clock.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    /// When the request arrived.
    pub at: Instant,
    /// The request itself.
    pub request: StreamRequest,
}

impl RecordedRequest {
    /// Segment index carried by the request, if it is a submission.
    #[must_use]
    pub fn segment(&self) -> Option<SegmentIndex> {
        StreamingHandler::segment_header(&self.request)
            .ok()
            .map(|header| header.index)
    }

    /// Whether the request carries the terminal flag.
    #[must_use]
    pub fn is_done(&self) -> bool {
        StreamingHandler::segment_header(&self.request).is_ok_and(|header| header.done)
    }
}

/// Transport answering from a queue of scripted replies.
///
/// Once the queue is empty every request is answered by the fallback, which
/// by default acknowledges segments with `200` and starts streams with the
/// id `scripted`.
#[derive(Clone)]
pub struct ScriptedTransport {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    fallback: Arc<Fallback>,
}

impl Default for ScriptedTransport {
    fn default() -> Self { Self::new() }
}

impl std::fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("queued", &self.replies.lock().expect("replies poisoned").len())
            .field("requests", &self.requests.lock().expect("requests poisoned").len())
            .finish_non_exhaustive()
    }
}

impl ScriptedTransport {
    /// Transport with an empty script and the default fallback.
    #[must_use]
    pub fn new() -> Self {
        Self {
            replies: Arc::default(),
            requests: Arc::default(),
            fallback: Arc::new(acknowledge),
        }
    }

    /// Replace the reply used once the script runs out.
    #[must_use]
    pub fn with_fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&StreamRequest) -> Reply + Send + Sync + 'static,
    {
        self.fallback = Arc::new(fallback);
        self
    }

    /// Queue a response with `status` and an empty body.
    pub fn push_status(&self, status: u16) { self.push_response(StreamResponse::new(status, Bytes::new())); }

    /// Queue `response`.
    pub fn push_response(&self, response: StreamResponse) { self.push(Ok(response)); }

    /// Queue a timeout.
    pub fn push_timeout(&self) { self.push(Err(TransportError::TimedOut)); }

    /// Queue a connection failure with `message`.
    pub fn push_connection_error(&self, message: &str) {
        self.push(Err(TransportError::connection(message.to_owned())));
    }

    fn push(&self, reply: Reply) {
        self.replies
            .lock()
            .expect("replies poisoned")
            .push_back(reply);
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("requests poisoned").clone()
    }

    /// Requests that submitted segment `index`.
    #[must_use]
    pub fn attempts_for(&self, index: u64) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|recorded| recorded.segment() == Some(SegmentIndex::new(index)))
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(&self, request: StreamRequest) -> Reply {
        self.requests
            .lock()
            .expect("requests poisoned")
            .push(RecordedRequest {
                at: Instant::now(),
                request: request.clone(),
            });
        let scripted = self.replies.lock().expect("replies poisoned").pop_front();
        scripted.unwrap_or_else(|| (self.fallback)(&request))
    }
}

fn acknowledge(request: &StreamRequest) -> Reply {
    let body = match request.method() {
        Method::Get => serde_json::json!({ "streamId": "scripted" }),
        Method::Post => serde_json::json!({ "message": "ok" }),
    };
    Ok(StreamResponse::json(200, &body).expect("json body encodes"))
}
