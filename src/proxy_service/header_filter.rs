use log::warn;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION, CONTENT_LENGTH, HOST};

use crate::proxy_service::proxy_config::SuppressList;

/// Meaningful for a single connection only, never forwarded in either direction.
const HOP_BY_HOP: &[&str] = &[
  "connection",
  "keep-alive",
  "proxy-connection",
  "te",
  "trailer",
  "transfer-encoding",
  "upgrade",
];

/// Copies every header that is not hop-by-hop (including those named by `Connection`), not in
/// `suppressed` and not in `always_drop`.
pub fn filter_headers(headers: &HeaderMap, suppressed: &SuppressList, always_drop: &[HeaderName]) -> HeaderMap {
  let connection_tokens = connection_tokens(headers);
  let mut filtered = HeaderMap::new();

  for (name, value) in headers {
    let name_lower = name.as_str();

    if HOP_BY_HOP.contains(&name_lower)
      || connection_tokens.iter().any(|token| token == name_lower)
      || always_drop.contains(name)
      || suppressed.contains(name_lower)
    {
      continue;
    }
    filtered.append(name.clone(), value.clone());
  }

  filtered
}

/// Header names listed in `Connection: keep-alive, x-hop`, lower-cased.
fn connection_tokens(headers: &HeaderMap) -> Vec<String> {
  headers
    .get_all(CONNECTION)
    .iter()
    .filter_map(|value| value.to_str().ok())
    .flat_map(|value| value.split(','))
    .map(|token| token.trim().to_ascii_lowercase())
    .filter(|token| !token.is_empty())
    .collect()
}

/// Outbound request headers: inbound headers with `Host` pointed at the upstream, then
/// the request suppression list applied.
pub fn request_headers<'a, I>(inbound: I, host: Option<&str>, suppressed: &SuppressList) -> HeaderMap
where
  I: IntoIterator<Item = (&'a HeaderName, &'a HeaderValue)>,
{
  let mut headers: HeaderMap = inbound
    .into_iter()
    .map(|(name, value)| (name.clone(), value.clone()))
    .collect();

  if let Some(host) = host.filter(|host| !host.is_empty()) {
    let value = host_header_value(host);
    match HeaderValue::from_str(&value) {
      Ok(value) => {
        headers.insert(HOST, value);
      }
      Err(err) => warn!("Unable to rewrite host header to '{}': {}", value, err),
    }
  }

  filter_headers(&headers, suppressed, &[])
}

/// Response headers relayed to the client. `Content-Length` never passes since the relayed
/// body gets its own framing.
pub fn response_headers(upstream: &HeaderMap, suppressed: &SuppressList) -> HeaderMap {
  filter_headers(upstream, suppressed, &[CONTENT_LENGTH])
}

/// `http://up.test:8080/` -> `up.test:8080`
pub fn host_header_value(host: &str) -> String {
  let without_scheme = match host.find("://") {
    Some(index) => &host[index + 3..],
    None => host,
  };

  without_scheme
    .strip_suffix('/')
    .unwrap_or(without_scheme)
    .to_string()
}
