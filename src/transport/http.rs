//! HTTP transport built on `reqwest`.

use async_trait::async_trait;
use reqwest::{Client, Url};

use super::{Transport, TransportError};
use crate::protocol::{Method, StreamRequest, StreamResponse};

/// Sends stream requests to a remote endpoint over HTTP.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
}

impl HttpTransport {
    /// Target `endpoint` with a default client.
    #[must_use]
    pub fn new(endpoint: Url) -> Self { Self::with_client(Client::new(), endpoint) }

    /// Target `endpoint` with a preconfigured client, for example one with a
    /// request timeout.
    #[must_use]
    pub fn with_client(client: Client, endpoint: Url) -> Self { Self { client, endpoint } }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, request: StreamRequest) -> Result<StreamResponse, TransportError> {
        let mut builder = match request.method() {
            Method::Get => self.client.get(self.endpoint.clone()),
            Method::Post => self
                .client
                .post(self.endpoint.clone())
                .body(request.body().clone()),
        };
        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }
        let response = builder.send().await.map_err(|err| {
            if err.is_timeout() {
                TransportError::TimedOut
            } else {
                TransportError::connection(err)
            }
        })?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(TransportError::connection)?;
        Ok(StreamResponse::new(status, body))
    }
}
