use std::io;

use actix_web::dev::Payload;
use actix_web::HttpRequest;
use bytes::Bytes;
use futures_util::StreamExt;
use log::debug;
use reqwest::header::{HeaderMap, CONTENT_LENGTH};
use reqwest::{Body, Method, StatusCode, Url};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;

use crate::error::ProxyError;
use crate::http_client::UpstreamClients;
use crate::proxy_service::proxy_config::RequestOptions;

const PIPE_CAPACITY: usize = 16;

/// The request sent upstream.
#[derive(Clone, Debug)]
pub struct UpstreamRequest {
  pub url: Url,
  pub method: Method,
  pub headers: HeaderMap,
  /// Only sent in buffered mode; streamed requests carry the raw inbound payload.
  pub body: Option<Bytes>,
  pub follow_redirect: bool,
  /// Cookie jar override. Unset means the mode default applies.
  pub jar: Option<bool>,
}

#[derive(Debug)]
pub struct UpstreamResponse {
  pub status: StatusCode,
  pub headers: HeaderMap,
  pub body: Bytes,
}

impl UpstreamRequest {
  pub fn apply(self, options: Option<&RequestOptions>, source: &HttpRequest) -> Result<Self, ProxyError> {
    match options {
      None => Ok(self),
      Some(RequestOptions::Rewrite(rewrite)) => rewrite(source, self),
      Some(RequestOptions::Patch(patch)) => {
        let patch = patch.clone();
        Ok(UpstreamRequest {
          url: patch.url.unwrap_or(self.url),
          method: patch.method.unwrap_or(self.method),
          headers: patch.headers.unwrap_or(self.headers),
          body: patch.body.or(self.body),
          follow_redirect: patch.follow_redirect.unwrap_or(self.follow_redirect),
          jar: patch.jar.or(self.jar),
        })
      }
    }
  }
}

/// Sends `request` upstream and reads the whole response.
///
/// With `buffered` set the request carries `request.body` and uses the configured jar flag;
/// otherwise `payload` is piped through and the jar is on unless the request overrides it.
pub async fn forward(
  clients: &UpstreamClients,
  request: UpstreamRequest,
  buffered: bool,
  payload: Payload,
  config_jar: bool,
) -> Result<UpstreamResponse, ProxyError> {
  let UpstreamRequest {
    url,
    method,
    mut headers,
    body,
    follow_redirect,
    jar,
  } = request;

  let mut payload_failure = None;
  let (jar, body) = if buffered {
    // the body was re-serialized, reqwest frames it again
    headers.remove(CONTENT_LENGTH);
    (jar.unwrap_or(config_jar), Some(Body::from(body.unwrap_or_default())))
  } else {
    match payload {
      Payload::None => (jar.unwrap_or(true), None),
      payload => {
        let (body, failure) = pipe(payload);
        payload_failure = Some(failure);
        (jar.unwrap_or(true), Some(body))
      }
    }
  };

  debug!(
    "Forwarding {} {} ({}, jar: {}, follow redirects: {})",
    method,
    url,
    if buffered { "buffered" } else { "streamed" },
    jar,
    follow_redirect
  );

  let mut builder = clients
    .select(jar, follow_redirect)
    .request(method, url)
    .headers(headers);

  if let Some(body) = body {
    builder = builder.body(body);
  }

  let response = match builder.send().await {
    Ok(response) => response,
    Err(err) => return Err(inbound_failure(payload_failure).unwrap_or(ProxyError::Upstream(err))),
  };

  let status = response.status();
  let headers = response.headers().clone();
  let body = response.bytes().await?;

  Ok(UpstreamResponse { status, headers, body })
}

/// A send failure caused by the inbound payload is the client's fault, not the upstream's.
fn inbound_failure(failure: Option<oneshot::Receiver<String>>) -> Option<ProxyError> {
  failure?.try_recv().ok().map(ProxyError::Payload)
}

/// Moves the inbound payload onto a `Send` stream for reqwest. A payload error is reported on
/// the returned receiver and then ends the stream with an error, which aborts the upstream request.
fn pipe(mut payload: Payload) -> (Body, oneshot::Receiver<String>) {
  let (tx, rx) = mpsc::channel::<Result<Bytes, io::Error>>(PIPE_CAPACITY);
  let (failure_tx, failure_rx) = oneshot::channel();

  actix_web::rt::spawn(async move {
    while let Some(chunk) = payload.next().await {
      match chunk {
        Ok(chunk) => {
          if tx.send(Ok(chunk)).await.is_err() {
            break;
          }
        }
        Err(err) => {
          let reason = err.to_string();
          let _ = failure_tx.send(reason.clone());
          let _ = tx.send(Err(io::Error::new(io::ErrorKind::Other, reason))).await;
          break;
        }
      }
    }
  });

  (Body::wrap_stream(ReceiverStream::new(rx)), failure_rx)
}
