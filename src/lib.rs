//! Single-hop reverse proxy middleware for actix-web.
//!
//! [`Proxy`] resolves an upstream URL for each request (static URL, host plus path map, or a
//! per-request host resolver), forwards the request through reqwest and relays the answer.
//! Requests it cannot resolve go on to the wrapped service untouched.
//!
//! ```no_run
//! use actix_web::{App, HttpResponse, HttpServer, web};
//! use upstream_proxy::{Proxy, ProxyConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProxyConfig::builder()
//!   .host("http://127.0.0.1:9000")
//!   .match_path("^/api/")
//!   .suppress_response_headers(["Server"])
//!   .build()?;
//! let proxy = Proxy::new(config)?;
//!
//! HttpServer::new(move || {
//!   App::new()
//!     .wrap(proxy.clone())
//!     .default_service(web::to(|| async { HttpResponse::NotFound().finish() }))
//! })
//! .bind(("0.0.0.0", 8080))?
//! .run()
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod http_client;
pub mod proxy_service;
pub mod route_config;
pub mod std_logger;

pub use error::ProxyError;
pub use http_client::{HttpClientConfig, UpstreamClients};
pub use proxy_service::body::ParsedBody;
pub use proxy_service::forwarder::{UpstreamRequest, UpstreamResponse};
pub use proxy_service::proxy_config::{
  HostSource, PathMap, ProxyConfig, ProxyConfigBuilder, RequestOptions, RequestPatch, ResponseEncoding,
};
pub use proxy_service::proxy_factory::Proxy;
pub use proxy_service::relay::{ProxiedResponse, RelayedBody};
pub use route_config::RouteConfig;
