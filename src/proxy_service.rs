use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::error::ProxyError;
use crate::proxy_service::proxy_config::{ProxyConfig, RequestPatch};
use crate::route_config::{NameValuePair, RequestOptionsConfig, RouteConfig};

pub mod body;
pub mod forwarder;
pub mod header_filter;
pub mod proxy_config;
pub mod proxy_factory;
pub mod proxy_route_service;
pub mod relay;
pub mod url_resolver;

impl TryFrom<RouteConfig> for ProxyConfig {
  type Error = ProxyError;

  fn try_from(route: RouteConfig) -> Result<Self, Self::Error> {
    let mut builder = ProxyConfig::builder()
      .suppress_request_headers(route.suppress_request_headers.unwrap_or_default())
      .suppress_response_headers(route.suppress_response_headers.unwrap_or_default())
      .follow_redirect(route.follow_redirect.unwrap_or(true))
      .jar(route.jar.unwrap_or(false))
      .yield_next(route.yield_next.unwrap_or(false));

    if let Some(host) = route.host {
      builder = builder.host(host);
    }
    if let Some(url) = route.url {
      builder = builder.url(url);
    }
    if let Some(map) = route.map {
      builder = builder.map(map);
    }
    if let Some(pattern) = route.match_path {
      builder = builder.match_path(pattern);
    }
    if let Some(encoding) = route.encoding {
      builder = builder.encoding(encoding);
    }
    if let Some(options) = &route.request_options {
      builder = builder.request_patch(extract_patch(options)?);
    }

    builder.build()
  }
}

#[inline]
fn extract_patch(options: &RequestOptionsConfig) -> Result<RequestPatch, ProxyError> {
  let url = match &options.url {
    Some(url) => Some(
      Url::parse(url).map_err(|err| ProxyError::Configuration(format!("invalid request url '{}': {}", url, err)))?,
    ),
    None => None,
  };

  let headers = match &options.headers {
    Some(values) => Some(extract_headers(values)?),
    None => None,
  };

  Ok(RequestPatch {
    url,
    method: options.method.map(Into::into),
    headers,
    body: options.body.as_ref().map(|body| Bytes::from(body.clone())),
    follow_redirect: options.follow_redirect,
    jar: options.jar,
  })
}

#[inline]
fn extract_headers(values: &[NameValuePair]) -> Result<HeaderMap, ProxyError> {
  let mut header_map = HeaderMap::new();

  for pair in values {
    let name = HeaderName::try_from(&pair.name)
      .map_err(|e| ProxyError::Configuration(format!("invalid header name '{}': {}", pair.name, e)))?;

    let value = HeaderValue::try_from(&pair.value)
      .map_err(|e| ProxyError::Configuration(format!("invalid header value for '{}': {}", pair.name, e)))?;

    header_map.append(name, value);
  }

  Ok(header_map)
}
