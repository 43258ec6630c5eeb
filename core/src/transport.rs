//! Executing `HttpRequest`s against the network.
//!
//! # Design
//! The synchronizer is generic over `Transport`, so tests drive it with a
//! scripted in-process implementation while applications use `UreqTransport`.
//! Non-2xx responses are returned as data; status interpretation stays in
//! `ItemClient`. A `TransportError` means no response was obtained at all.
//!
//! `RetryTransport` adds the fixed retry count the observed clients applied
//! at this layer. Only calls that are safe to repeat are retried: reads,
//! updates, deletes, and creates that carry an idempotency key.

use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::client::IDEMPOTENCY_KEY;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Io(String),

    /// The party expected to answer the request went away.
    #[error("transport closed")]
    Closed,
}

/// Something that can perform one HTTP round-trip.
///
/// Futures are not required to be `Send`: the synchronizer runs on a single
/// logical thread.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocking `ureq` agent run on tokio's blocking pool.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || send_blocking(&agent, request))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?
    }
}

fn with_headers<B>(mut builder: ureq::RequestBuilder<B>, headers: &[(String, String)]) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn send_blocking(agent: &ureq::Agent, request: HttpRequest) -> Result<HttpResponse, TransportError> {
    let HttpRequest {
        method,
        path,
        headers,
        body,
    } = request;

    let result = match method {
        HttpMethod::Get => with_headers(agent.get(&path), &headers).call(),
        HttpMethod::Delete => with_headers(agent.delete(&path), &headers).call(),
        HttpMethod::Post => {
            let builder = with_headers(agent.post(&path), &headers);
            match body {
                Some(body) => builder.send(body.as_bytes()),
                None => builder.send_empty(),
            }
        }
        HttpMethod::Put => {
            let builder = with_headers(agent.put(&path), &headers);
            match body {
                Some(body) => builder.send(body.as_bytes()),
                None => builder.send_empty(),
            }
        }
    };

    let mut response = result.map_err(map_ureq_error)?;
    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
        .collect();
    let body = response.body_mut().read_to_string().map_err(map_ureq_error)?;

    Ok(HttpResponse { status, headers, body })
}

fn map_ureq_error(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Timeout(_) => TransportError::Timeout,
        other => TransportError::Io(other.to_string()),
    }
}

/// Re-issues failed calls a fixed number of times before reporting failure.
///
/// A failure is a `TransportError` or a 5xx response; 4xx answers are final.
#[derive(Debug, Clone)]
pub struct RetryTransport<T> {
    inner: T,
    read_retries: u32,
    write_retries: u32,
}

impl<T> RetryTransport<T> {
    pub fn new(inner: T, read_retries: u32, write_retries: u32) -> Self {
        Self {
            inner,
            read_retries,
            write_retries,
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    fn retries_for(&self, request: &HttpRequest) -> u32 {
        match request.method {
            HttpMethod::Get => self.read_retries,
            HttpMethod::Post if request.header(IDEMPOTENCY_KEY).is_none() => 0,
            HttpMethod::Post | HttpMethod::Put | HttpMethod::Delete => self.write_retries,
        }
    }
}

impl<T: Transport> Transport for RetryTransport<T> {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let retries = self.retries_for(&request);
        let mut attempt = 0;
        loop {
            let result = self.inner.execute(request.clone()).await;
            let retryable = match &result {
                Ok(response) => response.status >= 500,
                Err(_) => true,
            };
            if !retryable || attempt >= retries {
                return result;
            }
            attempt += 1;
            warn!(
                method = request.method.as_str(),
                path = %request.path,
                attempt,
                retries,
                "retrying request"
            );
        }
    }
}
