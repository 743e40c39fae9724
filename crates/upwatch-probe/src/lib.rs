//! upwatch-probe: health check strategies.
//!
//! Each probe turns a service definition into a single [`ProbeOutcome`]:
//! success or failure, latency, and a tagged error on failure. Probes never
//! return `Err`; a network problem is an outcome, not an error.
//!
//! The scheduler holds a `dyn Prober`, so tests can swap in a scripted
//! implementation without touching the network.

pub mod http;
pub mod tcp;
pub mod tls;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use ::http::Method;
use tokio_rustls::TlsConnector;

use upwatch_core::{ErrorDetail, ProbeKind, ProbeOutcome, ServiceDefinition, Target};

pub use crate::http::http_probe;
pub use crate::tcp::{DEFAULT_PING_PORT, ping_probe, tcp_probe};

/// Boxed future returned by [`Prober::probe`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Latency and optional failure of a single probe, before it is bound to a
/// service id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    pub latency: Duration,
    pub error: Option<ErrorDetail>,
}

impl ProbeReport {
    pub fn ok(latency: Duration) -> Self {
        Self {
            latency,
            error: None,
        }
    }

    pub fn failed(latency: Duration, error: ErrorDetail) -> Self {
        Self {
            latency,
            error: Some(error),
        }
    }

    pub fn into_outcome(self, service_id: &str) -> ProbeOutcome {
        match self.error {
            None => ProbeOutcome::success(service_id, self.latency),
            Some(error) => ProbeOutcome::failure(service_id, self.latency, error),
        }
    }
}

/// Executes one health check against a service.
pub trait Prober: Send + Sync {
    fn probe<'a>(&'a self, definition: &'a ServiceDefinition) -> BoxFuture<'a, ProbeOutcome>;
}

/// Prober that talks to the real network.
#[derive(Clone)]
pub struct NetworkProber {
    tls: TlsConnector,
}

impl NetworkProber {
    pub fn new() -> Result<Self, rustls::Error> {
        Ok(Self {
            tls: tls::connector_with_webpki_roots()?,
        })
    }

    async fn run(&self, definition: &ServiceDefinition) -> ProbeReport {
        let spec = &definition.spec;
        let timeout = spec.timeout();
        match (spec.kind, &spec.target) {
            (ProbeKind::HttpHead, Target::Url { url }) => {
                http_probe(url, Method::HEAD, timeout, &self.tls).await
            }
            (ProbeKind::HttpGet, Target::Url { url }) => {
                http_probe(url, Method::GET, timeout, &self.tls).await
            }
            (ProbeKind::Tcp, Target::Host { host, port }) => {
                tcp_probe(host, port.unwrap_or(DEFAULT_PING_PORT), timeout).await
            }
            (ProbeKind::Ping, Target::Host { host, port }) => {
                ping_probe(host, port.unwrap_or(DEFAULT_PING_PORT), timeout).await
            }
            (kind, target) => ProbeReport::failed(
                Duration::ZERO,
                ErrorDetail::Io {
                    message: format!("{kind} probe cannot target {target}"),
                },
            ),
        }
    }
}

impl Prober for NetworkProber {
    fn probe<'a>(&'a self, definition: &'a ServiceDefinition) -> BoxFuture<'a, ProbeOutcome> {
        Box::pin(async move { self.run(definition).await.into_outcome(&definition.id) })
    }
}
