//! HTTP HEAD/GET probes over plain TCP or rustls.
//!
//! Each probe opens a fresh connection, sends one request, and reads only
//! the status line. 2xx and 3xx count as up.

use std::time::Duration;

use bytes::Bytes;
use http::header::{HOST, USER_AGENT};
use http::{Method, Request, StatusCode, Uri};
use http_body_util::Empty;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::ServerName;
use tracing::debug;

use upwatch_core::ErrorDetail;

use crate::ProbeReport;
use crate::tcp::{connect_any, unbracket};

const USER_AGENT_VALUE: &str = concat!("upwatch/", env!("CARGO_PKG_VERSION"));

/// Probe `url` with a single request, bounded by `timeout`.
pub async fn http_probe(
    url: &str,
    method: Method,
    timeout: Duration,
    tls: &TlsConnector,
) -> ProbeReport {
    let start = Instant::now();
    match tokio::time::timeout(timeout, request(url, method, tls)).await {
        Ok(Ok(status)) if status.is_success() || status.is_redirection() => {
            ProbeReport::ok(start.elapsed())
        }
        Ok(Ok(status)) => {
            debug!(%status, %url, "http probe non-success status");
            ProbeReport::failed(
                start.elapsed(),
                ErrorDetail::HttpStatus {
                    code: status.as_u16(),
                },
            )
        }
        Ok(Err(error)) => {
            debug!(%error, %url, "http probe failed");
            ProbeReport::failed(start.elapsed(), error)
        }
        Err(_) => {
            debug!(%url, "http probe timed out");
            ProbeReport::failed(timeout, ErrorDetail::Timeout)
        }
    }
}

async fn request(url: &str, method: Method, tls: &TlsConnector) -> Result<StatusCode, ErrorDetail> {
    let uri: Uri = url.parse().map_err(|e| ErrorDetail::Io {
        message: format!("invalid url: {e}"),
    })?;
    let https = uri.scheme_str() == Some("https");
    let host = uri
        .host()
        .ok_or_else(|| ErrorDetail::Io {
            message: format!("url has no host: {url}"),
        })?
        .to_string();
    let port = uri.port_u16().unwrap_or(if https { 443 } else { 80 });
    let host_header = match uri.port_u16() {
        Some(p) => format!("{host}:{p}"),
        None => host.clone(),
    };
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");

    let stream = connect_any(&host, port).await?;

    if https {
        let server_name = ServerName::try_from(unbracket(&host))
            .map(|name| name.to_owned())
            .map_err(|e| ErrorDetail::Tls {
                message: e.to_string(),
            })?;
        let stream = tls
            .connect(server_name, stream)
            .await
            .map_err(|e| ErrorDetail::Tls {
                message: e.to_string(),
            })?;
        send(stream, method, path, &host_header).await
    } else {
        send(stream, method, path, &host_header).await
    }
}

async fn send<S>(io: S, method: Method, path: &str, host: &str) -> Result<StatusCode, ErrorDetail>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(io))
        .await
        .map_err(|e| ErrorDetail::Io {
            message: format!("http handshake: {e}"),
        })?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        let _ = conn.await;
    });

    let req = Request::builder()
        .method(method)
        .uri(path)
        .header(HOST, host)
        .header(USER_AGENT, USER_AGENT_VALUE)
        .body(Empty::<Bytes>::new())
        .map_err(|e| ErrorDetail::Io {
            message: format!("build request: {e}"),
        })?;

    let resp = sender.send_request(req).await.map_err(|e| ErrorDetail::Io {
        message: format!("http request: {e}"),
    })?;
    Ok(resp.status())
}
