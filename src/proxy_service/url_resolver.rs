use actix_web::HttpRequest;
use url::Url;

use crate::error::ProxyError;
use crate::proxy_service::proxy_config::{HostSource, PathMap, ProxyConfig};

/// Placeholder in a configured `url` that is replaced by the inbound path.
pub const PATH_PLACEHOLDER: &str = "{path}";

/// The upstream host for this request only. A resolver is awaited on every call.
pub async fn resolve_host(config: &ProxyConfig, req: &HttpRequest) -> Result<Option<String>, ProxyError> {
  match &config.host {
    None => Ok(None),
    Some(HostSource::Static(host)) => Ok(Some(host.to_string())),
    Some(HostSource::Resolver(resolver)) => resolver(req, config).await,
  }
}

/// Resolves the upstream URL for `path`.
///
/// `Ok(None)` is the "no match" outcome: the request is not for this proxy and the caller
/// should hand it to the next service. Query strings on configured targets are always dropped;
/// the live request's query is attached later.
///
/// Paths taken from the request (directly, through `{path}` or through a map function) never
/// leave the resolved host: leading slashes are collapsed so `//other.host/x` stays a path.
pub fn resolve_url(path: &str, host: Option<&str>, config: &ProxyConfig) -> Result<Option<Url>, ProxyError> {
  let host = host.filter(|host| !host.is_empty());

  if let Some(url) = config.url.as_deref() {
    let url = url.replace(PATH_PLACEHOLDER, &origin_relative(path));
    let url = strip_query(&url);

    if url.is_empty() {
      return Ok(None);
    }

    if has_scheme(url) {
      return Url::parse(url)
        .map(Some)
        .map_err(|err| ProxyError::InvalidTarget(format!("{}: {}", url, err)));
    }

    return match host {
      Some(host) => join(host, url).map(Some),
      None => Ok(None),
    };
  }

  let rewritten = match &config.map {
    Some(PathMap::Direct(mapping)) => mapping.get(path).map(|target| strip_query(target).to_string()),
    Some(PathMap::Function(map)) => map(path)?.map(|target| origin_relative(&target)),
    None => Some(origin_relative(path)),
  };

  match (host, rewritten) {
    (Some(host), Some(path)) if !path.is_empty() => join(host, &path).map(Some),
    _ => Ok(None),
  }
}

/// True when `path` passes the configured match pattern, or when there is none.
pub fn path_matches(path: &str, config: &ProxyConfig) -> bool {
  config
    .match_pattern
    .as_ref()
    .map_or(true, |pattern| pattern.is_match(path))
}

fn join(host: &str, path: &str) -> Result<Url, ProxyError> {
  let base = if has_scheme(host) {
    Url::parse(host)
  } else {
    Url::parse(&format!("http://{}", host))
  };

  base
    .and_then(|base| base.join(path))
    .map_err(|err| ProxyError::InvalidTarget(format!("{} + {}: {}", host, path, err)))
}

/// `//evil.test/x` -> `/evil.test/x`. Backslashes count as slashes for http(s) URLs.
fn origin_relative(path: &str) -> String {
  if has_scheme(path) || !path.starts_with(['/', '\\']) {
    return path.to_string();
  }

  format!("/{}", path.trim_start_matches(['/', '\\']))
}

fn has_scheme(url: &str) -> bool {
  let lower = url.to_ascii_lowercase();
  lower.starts_with("http://") || lower.starts_with("https://")
}

fn strip_query(url: &str) -> &str {
  url.split('?').next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
  use actix_web::test::TestRequest;

  use super::*;

  fn resolve(path: &str, host: Option<&str>, config: &ProxyConfig) -> Option<String> {
    resolve_url(path, host, config).unwrap().map(|url| url.to_string())
  }

  #[test]
  fn absolute_url_ignores_host_and_drops_query() {
    let config = ProxyConfig::builder().url("http://x.test/a?z=1").build().unwrap();

    assert_eq!(resolve("/anything", Some("http://up.test"), &config), Some("http://x.test/a".into()));
    assert_eq!(resolve("/anything", None, &config), Some("http://x.test/a".into()));
  }

  #[test]
  fn relative_url_joins_onto_host() {
    let config = ProxyConfig::builder().url("/api/v2?debug=true").build().unwrap();

    assert_eq!(resolve("/x", Some("http://up.test/"), &config), Some("http://up.test/api/v2".into()));
    assert_eq!(resolve("/x", None, &config), None);
  }

  #[test]
  fn url_template_takes_inbound_path() {
    let config = ProxyConfig::builder().url("https://x.test/v1{path}").build().unwrap();

    assert_eq!(resolve("/users/7", None, &config), Some("https://x.test/v1/users/7".into()));
  }

  #[test]
  fn direct_map() {
    let config = ProxyConfig::builder().map([("/foo", "/bar?ignored=1")]).build().unwrap();

    assert_eq!(resolve("/foo", Some("http://up.test"), &config), Some("http://up.test/bar".into()));
    assert_eq!(resolve("/other", Some("http://up.test"), &config), None);
  }

  #[test]
  fn function_map() {
    let config = ProxyConfig::builder()
      .map_fn(|path| Ok(path.strip_prefix("/api").map(str::to_string)))
      .build()
      .unwrap();

    assert_eq!(resolve("/api/users", Some("http://up.test"), &config), Some("http://up.test/users".into()));
    assert_eq!(resolve("/static/app.js", Some("http://up.test"), &config), None);
  }

  #[test]
  fn empty_host_or_path_is_no_match() {
    let config = ProxyConfig::builder().host("http://up.test").build().unwrap();

    assert_eq!(resolve("/foo", Some(""), &config), None);
    assert_eq!(resolve("/foo", None, &config), None);
    assert_eq!(resolve("", Some("http://up.test"), &config), None);

    let config = ProxyConfig::builder().map_fn(|_| Ok(Some(String::new()))).build().unwrap();
    assert_eq!(resolve("/foo", Some("http://up.test"), &config), None);
  }

  #[test]
  fn map_function_errors_propagate() {
    let config = ProxyConfig::builder()
      .map_fn(|path| Err(ProxyError::InvalidTarget(format!("no route table for {}", path))))
      .build()
      .unwrap();

    assert!(matches!(
      resolve_url("/api/users", Some("http://up.test"), &config),
      Err(ProxyError::InvalidTarget(_))
    ));
  }

  #[test]
  fn request_paths_stay_on_the_resolved_host() {
    let config = ProxyConfig::builder().host("http://up.test").build().unwrap();

    assert_eq!(resolve("//evil.test/steal", Some("http://up.test"), &config), Some("http://up.test/evil.test/steal".into()));
    assert_eq!(resolve("/\\evil.test/steal", Some("http://up.test"), &config), Some("http://up.test/evil.test/steal".into()));
    assert_eq!(resolve("///x", Some("http://up.test/"), &config), Some("http://up.test/x".into()));

    let config = ProxyConfig::builder().url("{path}").build().unwrap();
    assert_eq!(resolve("//evil.test/steal", Some("http://up.test"), &config), Some("http://up.test/evil.test/steal".into()));

    let config = ProxyConfig::builder()
      .map_fn(|path| Ok(path.strip_prefix("/api").map(str::to_string)))
      .build()
      .unwrap();
    assert_eq!(resolve("/api//evil.test/steal", Some("http://up.test"), &config), Some("http://up.test/evil.test/steal".into()));
  }

  #[test]
  fn configured_map_targets_keep_join_semantics() {
    let config = ProxyConfig::builder().map([("/legacy", "https://other.test/new")]).build().unwrap();

    assert_eq!(resolve("/legacy", Some("http://up.test"), &config), Some("https://other.test/new".into()));
  }

  #[test]
  fn host_without_scheme_defaults_to_http() {
    let config = ProxyConfig::builder().host("up.test:8080").build().unwrap();

    assert_eq!(resolve("/foo", Some("up.test:8080"), &config), Some("http://up.test:8080/foo".into()));
  }

  #[actix_web::test]
  async fn resolver_sees_request_and_config() {
    let config = ProxyConfig::builder()
      .host_resolver(|req, config| {
        let tenant = req.headers().get("x-tenant").and_then(|value| value.to_str().ok()).map(str::to_string);
        let follow = config.follow_redirect;
        async move { Ok::<_, ProxyError>(tenant.filter(|_| follow).map(|tenant| format!("http://{}.up.test", tenant))) }
      })
      .build()
      .unwrap();

    let req = TestRequest::default().insert_header(("x-tenant", "blue")).to_http_request();
    assert_eq!(resolve_host(&config, &req).await.unwrap(), Some("http://blue.up.test".into()));

    let req = TestRequest::default().to_http_request();
    assert_eq!(resolve_host(&config, &req).await.unwrap(), None);
  }

  #[actix_web::test]
  async fn resolver_errors_propagate() {
    let config = ProxyConfig::builder()
      .host_resolver(|_, _| async { Err::<Option<String>, _>(ProxyError::Resolver("registry down".into())) })
      .build()
      .unwrap();

    let req = TestRequest::default().to_http_request();
    assert!(matches!(resolve_host(&config, &req).await, Err(ProxyError::Resolver(_))));
  }

  #[test]
  fn match_pattern_is_tested_against_path() {
    let config = ProxyConfig::builder().host("http://up.test").match_path("^/api/").build().unwrap();

    assert!(path_matches("/api/users", &config));
    assert!(!path_matches("/web/api/users", &config));

    let open = ProxyConfig::builder().host("http://up.test").build().unwrap();
    assert!(path_matches("/anything", &open));
  }
}
