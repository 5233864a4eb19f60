use actix_web::body::BoxBody;
use actix_web::{HttpRequest, HttpResponse, Responder};
use bytes::Bytes;
use log::warn;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;

use crate::proxy_service::forwarder::UpstreamResponse;
use crate::proxy_service::header_filter;
use crate::proxy_service::proxy_config::ProxyConfig;

#[derive(Clone, Debug, PartialEq)]
pub enum RelayedBody {
  Raw(Bytes),
  /// Transcoded from the configured response encoding.
  Text(String),
}

/// What the client gets back for a proxied request.
///
/// When the chain continues after proxying this is also left in the request extensions, so
/// later services can inspect it or answer with it.
#[derive(Clone, Debug)]
pub struct ProxiedResponse {
  pub status: StatusCode,
  pub headers: HeaderMap,
  pub body: RelayedBody,
}

impl ProxiedResponse {
  pub fn is_transcoded(&self) -> bool {
    matches!(self.body, RelayedBody::Text(_))
  }

  pub fn to_http_response(&self) -> HttpResponse {
    let mut response = HttpResponse::build(self.status);

    for (name, value) in self.headers.iter() {
      response.append_header((name.clone(), value.clone()));
    }

    match &self.body {
      RelayedBody::Raw(bytes) => response.body(bytes.clone()),
      RelayedBody::Text(text) => response.body(text.clone()),
    }
  }
}

impl Responder for ProxiedResponse {
  type Body = BoxBody;

  fn respond_to(self, _: &HttpRequest) -> HttpResponse<Self::Body> {
    self.to_http_response()
  }
}

pub fn relay(upstream: UpstreamResponse, config: &ProxyConfig) -> ProxiedResponse {
  let mut headers = header_filter::response_headers(&upstream.headers, &config.suppress_response_headers);

  let body = match config.encoding {
    Some(encoding) => {
      if let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok()) {
        let relabeled = utf8_content_type(content_type);
        match HeaderValue::from_str(&relabeled) {
          Ok(value) => {
            headers.insert(CONTENT_TYPE, value);
          }
          Err(err) => warn!("Unable to relabel content type '{}': {}", relabeled, err),
        }
      }
      RelayedBody::Text(encoding.decode(&upstream.body))
    }
    None => RelayedBody::Raw(upstream.body),
  };

  ProxiedResponse {
    status: upstream.status,
    headers,
    body,
  }
}

fn utf8_content_type(content_type: &str) -> String {
  content_type
    .split(';')
    .map(|part| {
      if part.trim().to_ascii_lowercase().starts_with("charset=") {
        "charset=utf-8"
      } else {
        part.trim()
      }
    })
    .collect::<Vec<_>>()
    .join("; ")
}
