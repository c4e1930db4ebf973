//! Request/response seam between the sender and the receiving service.
//!
//! The sender only needs something that turns a [`StreamRequest`] into a
//! [`StreamResponse`]. [`LoopbackTransport`] hands requests straight to an
//! in-process [`StreamingHandler`], which is how the binary and the tests
//! wire both halves together. With the `http` feature, [`HttpTransport`]
//! speaks to a remote endpoint via `reqwest`.

use std::{error::Error as StdError, fmt};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::HttpTransport;

use crate::{
    handler::{FinalizedStream, Received, StreamingHandler},
    protocol::{StreamRequest, StreamResponse},
};

/// Failures below the response layer: nothing usable came back.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be delivered or the response not read.
    #[error("connection failed: {0}")]
    Connection(#[source] Box<dyn StdError + Send + Sync>),
    /// The transport gave up waiting for a response.
    #[error("request timed out")]
    TimedOut,
}

impl TransportError {
    /// Wrap any error as a connection failure.
    pub fn connection(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        Self::Connection(err.into())
    }
}

/// Delivers one request and returns its response.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform `request`.
    ///
    /// Any response, including error statuses, is returned as `Ok`; only a
    /// failure to obtain a response at all is an error.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if no response could be obtained.
    async fn call(&self, request: StreamRequest) -> Result<StreamResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn call(&self, request: StreamRequest) -> Result<StreamResponse, TransportError> {
        (**self).call(request).await
    }
}

/// Transport dispatching directly into an in-process handler.
///
/// Accepted segments can be observed through a channel registered with
/// [`with_received`](Self::with_received). A host that only cares about
/// complete streams should use [`with_finalized`](Self::with_finalized)
/// instead, so partial payloads are not queued behind it.
#[derive(Clone)]
pub struct LoopbackTransport {
    handler: StreamingHandler,
    received: Option<mpsc::UnboundedSender<Received>>,
    finalized: Option<mpsc::UnboundedSender<FinalizedStream>>,
}

impl fmt::Debug for LoopbackTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoopbackTransport")
            .field("handler", &self.handler)
            .field("received", &self.received.as_ref().map(|_| "Some(<sender>)"))
            .field("finalized", &self.finalized.as_ref().map(|_| "Some(<sender>)"))
            .finish()
    }
}

impl LoopbackTransport {
    /// Dispatch requests to `handler`.
    #[must_use]
    pub fn new(handler: StreamingHandler) -> Self {
        Self {
            handler,
            received: None,
            finalized: None,
        }
    }

    /// Forward every accepted segment to `sender`.
    #[must_use]
    pub fn with_received(mut self, sender: mpsc::UnboundedSender<Received>) -> Self {
        self.received = Some(sender);
        self
    }

    /// Forward only finalized streams to `sender`.
    #[must_use]
    pub fn with_finalized(mut self, sender: mpsc::UnboundedSender<FinalizedStream>) -> Self {
        self.finalized = Some(sender);
        self
    }

    /// Handler receiving the requests.
    #[must_use]
    pub fn handler(&self) -> &StreamingHandler { &self.handler }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn call(&self, request: StreamRequest) -> Result<StreamResponse, TransportError> {
        let (response, received) = self.handler.respond(&request).await;
        let Some(received) = received else {
            return Ok(response);
        };
        if let (Received::Finalized(stream), Some(sender)) = (&received, &self.finalized) {
            if sender.send(stream.clone()).is_err() {
                debug!("finalized stream observer dropped");
            }
        }
        if let Some(sender) = &self.received {
            if sender.send(received).is_err() {
                debug!("loopback observer dropped");
            }
        }
        Ok(response)
    }
}
