use std::fs;
use std::io::{ErrorKind, Result};

use actix_web::middleware::Logger;
use actix_web::{web, App, HttpMessage, HttpRequest, HttpResponse, HttpServer};
use clap::Parser;
use log::{info, LevelFilter};

use upstream_proxy::std_logger::StdLogger;
use upstream_proxy::{HttpClientConfig, ProxiedResponse, Proxy, ProxyConfig, RouteConfig};

#[derive(Parser, Debug)]
#[command(version, about = "Single-hop HTTP reverse proxy")]
struct Args {
  #[arg(long, env = "HTTP_BIND", default_value = "0.0.0.0")]
  bind: String,

  #[arg(long, env = "HTTP_PORT", default_value_t = 8080)]
  port: u16,

  #[arg(long, env = "HTTP_WORKER_COUNT", default_value_t = 4)]
  workers: usize,

  /// YAML file describing the upstream.
  #[arg(long, env = "ROUTE_CONF_LOCATION", default_value = "config.yaml")]
  config: String,

  /// Egress proxy for upstream requests.
  #[arg(long, env = "HTTP_PROXY_URL")]
  proxy_url: Option<String>,

  #[arg(long, env = "HTTP_PROXY_USER")]
  proxy_user: Option<String>,

  #[arg(long, env = "HTTP_PROXY_PASS")]
  proxy_pass: Option<String>,

  #[arg(long, env = "LOG_LEVEL", default_value = "info")]
  log_level: String,
}

#[actix_web::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  let log_level = args.log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::Info);
  StdLogger::init(log_level).map_err(|err| std::io::Error::new(ErrorKind::Other, err.to_string()))?;

  let config_fd = fs::File::open(&args.config)?;
  let route_config = RouteConfig::load_from_file(&config_fd)?;
  let proxy_config =
    ProxyConfig::try_from(route_config).map_err(|err| std::io::Error::new(ErrorKind::Other, err))?;

  let http_clients = HttpClientConfig {
    http_proxy: args.proxy_url,
    user: args.proxy_user,
    pass: args.proxy_pass,
  }
  .to_clients()
  .map_err(|err| std::io::Error::new(ErrorKind::Other, err))?;

  let proxy = Proxy::create(http_clients, proxy_config);
  info!("Proxy loaded from '{}', listening on {}:{}", args.config, args.bind, args.port);

  HttpServer::new(move || {
    App::new()
      .wrap(proxy.clone())
      .wrap(Logger::default())
      .default_service(web::to(fallback))
  })
  .workers(args.workers)
  .bind((args.bind, args.port))?
  .run()
  .await
}

/// End of the chain: answers with the relayed upstream response when the proxy continued the
/// chain, 404 when nothing was proxied.
async fn fallback(req: HttpRequest) -> HttpResponse {
  match req.extensions().get::<ProxiedResponse>() {
    Some(proxied) => proxied.to_http_response(),
    None => HttpResponse::NotFound().finish(),
  }
}
