use std::collections::HashMap;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

use actix_web::HttpRequest;
use bytes::Bytes;
use encoding_rs::GBK;
use futures_core::future::LocalBoxFuture;
use regex::Regex;
use reqwest::header::HeaderMap;
use reqwest::Method;
use url::Url;

use crate::error::ProxyError;
use crate::proxy_service::forwarder::UpstreamRequest;

pub type HostFuture = LocalBoxFuture<'static, Result<Option<String>, ProxyError>>;
pub type HostResolverFn = Arc<dyn Fn(&HttpRequest, &ProxyConfig) -> HostFuture + Send + Sync>;
/// `Ok(None)` means the path is not proxied; errors abort the request.
pub type PathMapFn = Arc<dyn Fn(&str) -> Result<Option<String>, ProxyError> + Send + Sync>;
pub type RewriteFn = Arc<dyn Fn(&HttpRequest, UpstreamRequest) -> Result<UpstreamRequest, ProxyError> + Send + Sync>;

/// Where the upstream host of a request comes from.
#[derive(Clone)]
pub enum HostSource {
  Static(Box<str>),
  /// Invoked once per request; `None` means "no host", which makes the request fall through.
  Resolver(HostResolverFn),
}

#[derive(Clone)]
pub enum PathMap {
  Direct(HashMap<String, String>),
  Function(PathMapFn),
}

/// Field overwrites applied to the outbound request after header handling.
#[derive(Clone, Default, Debug)]
pub struct RequestPatch {
  pub url: Option<Url>,
  pub method: Option<Method>,
  pub headers: Option<HeaderMap>,
  pub body: Option<Bytes>,
  pub follow_redirect: Option<bool>,
  pub jar: Option<bool>,
}

#[derive(Clone)]
pub enum RequestOptions {
  Patch(RequestPatch),
  Rewrite(RewriteFn),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseEncoding {
  Gbk,
}

impl ResponseEncoding {
  pub fn decode(&self, raw: &[u8]) -> String {
    match self {
      ResponseEncoding::Gbk => {
        let (text, _) = GBK.decode_without_bom_handling(raw);
        text.into_owned()
      }
    }
  }
}

impl FromStr for ResponseEncoding {
  type Err = ProxyError;

  fn from_str(value: &str) -> Result<Self, Self::Err> {
    match value.to_lowercase().as_str() {
      "gbk" => Ok(ResponseEncoding::Gbk),
      other => Err(ProxyError::Configuration(format!("unsupported response encoding '{}'", other))),
    }
  }
}

/// Header names, lower-cased once when the list is built.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct SuppressList(Box<[Box<str>]>);

impl SuppressList {
  pub fn new<I, S>(names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let names: Vec<Box<str>> = names
      .into_iter()
      .map(|name| Box::from(name.as_ref().trim().to_lowercase().as_str()))
      .collect();

    SuppressList(Box::from(names))
  }

  pub fn contains(&self, name: &str) -> bool {
    let name = name.to_lowercase();
    self.0.iter().any(|entry| **entry == *name)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}

/// Immutable proxy settings, shared by every worker and request.
#[derive(Clone)]
pub struct ProxyConfig {
  pub host: Option<HostSource>,
  pub url: Option<Box<str>>,
  pub map: Option<PathMap>,
  pub match_pattern: Option<Regex>,
  pub suppress_request_headers: SuppressList,
  pub suppress_response_headers: SuppressList,
  pub follow_redirect: bool,
  pub jar: bool,
  pub request_options: Option<RequestOptions>,
  pub encoding: Option<ResponseEncoding>,
  pub yield_next: bool,
}

impl ProxyConfig {
  pub fn builder() -> ProxyConfigBuilder {
    ProxyConfigBuilder::default()
  }
}

#[derive(Default)]
pub struct ProxyConfigBuilder {
  host: Option<HostSource>,
  url: Option<String>,
  map: Option<PathMap>,
  match_pattern: Option<String>,
  suppress_request_headers: Vec<String>,
  suppress_response_headers: Vec<String>,
  follow_redirect: Option<bool>,
  jar: bool,
  request_options: Option<RequestOptions>,
  encoding: Option<String>,
  yield_next: bool,
}

impl ProxyConfigBuilder {
  pub fn host(mut self, host: impl Into<String>) -> Self {
    self.host = Some(HostSource::Static(Box::from(host.into().as_str())));
    self
  }

  pub fn host_resolver<F, Fut>(mut self, resolver: F) -> Self
  where
    F: Fn(&HttpRequest, &ProxyConfig) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<String>, ProxyError>> + 'static,
  {
    let resolver: HostResolverFn =
      Arc::new(move |req: &HttpRequest, config: &ProxyConfig| -> HostFuture { Box::pin(resolver(req, config)) });
    self.host = Some(HostSource::Resolver(resolver));
    self
  }

  pub fn url(mut self, url: impl Into<String>) -> Self {
    self.url = Some(url.into());
    self
  }

  pub fn map<I, K, V>(mut self, entries: I) -> Self
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
  {
    let mapping = entries
      .into_iter()
      .map(|(from, to)| (from.into(), to.into()))
      .collect();

    self.map = Some(PathMap::Direct(mapping));
    self
  }

  pub fn map_fn<F>(mut self, map: F) -> Self
  where
    F: Fn(&str) -> Result<Option<String>, ProxyError> + Send + Sync + 'static,
  {
    self.map = Some(PathMap::Function(Arc::new(map)));
    self
  }

  pub fn match_path(mut self, pattern: impl Into<String>) -> Self {
    self.match_pattern = Some(pattern.into());
    self
  }

  pub fn suppress_request_headers<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.suppress_request_headers = names.into_iter().map(Into::into).collect();
    self
  }

  pub fn suppress_response_headers<I, S>(mut self, names: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.suppress_response_headers = names.into_iter().map(Into::into).collect();
    self
  }

  pub fn follow_redirect(mut self, follow: bool) -> Self {
    self.follow_redirect = Some(follow);
    self
  }

  pub fn jar(mut self, jar: bool) -> Self {
    self.jar = jar;
    self
  }

  pub fn request_patch(mut self, patch: RequestPatch) -> Self {
    self.request_options = Some(RequestOptions::Patch(patch));
    self
  }

  pub fn request_rewrite<F>(mut self, rewrite: F) -> Self
  where
    F: Fn(&HttpRequest, UpstreamRequest) -> Result<UpstreamRequest, ProxyError> + Send + Sync + 'static,
  {
    self.request_options = Some(RequestOptions::Rewrite(Arc::new(rewrite)));
    self
  }

  pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
    self.encoding = Some(encoding.into());
    self
  }

  pub fn yield_next(mut self, yield_next: bool) -> Self {
    self.yield_next = yield_next;
    self
  }

  pub fn build(self) -> Result<ProxyConfig, ProxyError> {
    if self.host.is_none() && self.url.is_none() && self.map.is_none() {
      return Err(ProxyError::Configuration(
        "one of 'host', 'url' or 'map' must be set".into(),
      ));
    }

    let match_pattern = match self.match_pattern {
      Some(pattern) => Some(Regex::new(&pattern).map_err(|err| {
        ProxyError::Configuration(format!("invalid match pattern '{}': {}", pattern, err))
      })?),
      None => None,
    };

    let encoding = match self.encoding.as_deref() {
      Some(name) => Some(name.parse::<ResponseEncoding>()?),
      None => None,
    };

    Ok(ProxyConfig {
      host: self.host,
      url: self.url.map(|url| Box::from(url.as_str())),
      map: self.map,
      match_pattern,
      suppress_request_headers: SuppressList::new(self.suppress_request_headers),
      suppress_response_headers: SuppressList::new(self.suppress_response_headers),
      follow_redirect: self.follow_redirect.unwrap_or(true),
      jar: self.jar,
      request_options: self.request_options,
      encoding,
      yield_next: self.yield_next,
    })
  }
}
