//! Upstream servers for the middleware tests.

use std::net::SocketAddr;

use actix_web::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use serde_json::{json, Map, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// "你好" in GBK.
pub const GBK_HELLO: &[u8] = &[0xc4, 0xe3, 0xba, 0xc3];

/// Starts an upstream on an ephemeral port. Every response carries `x-upstream: <name>`.
pub fn start_upstream(name: &'static str) -> SocketAddr {
  let server = HttpServer::new(move || {
    App::new()
      .app_data(web::Data::new(name))
      .route("/gbk", web::get().to(gbk))
      .route("/chunked", web::get().to(chunked))
      .route("/redirect", web::get().to(redirect))
      .route("/landing", web::get().to(landing))
      .route("/cookie/set", web::get().to(set_cookie))
      .route("/cookie/get", web::get().to(get_cookie))
      .default_service(web::to(echo))
  })
  .workers(1)
  .bind(("127.0.0.1", 0))
  .unwrap();

  let addr = server.addrs()[0];
  actix_web::rt::spawn(server.run());
  addr
}

/// How a sink upstream finished reading a request body: the byte count, or why it stopped early.
pub type SinkOutcome = Result<usize, String>;

/// Starts an upstream that drains every request body and reports how that went.
pub fn start_sink() -> (SocketAddr, UnboundedReceiver<SinkOutcome>) {
  let (report, outcomes) = mpsc::unbounded_channel();

  let server = HttpServer::new(move || {
    App::new()
      .app_data(web::Data::new(report.clone()))
      .default_service(web::to(sink))
  })
  .workers(1)
  .bind(("127.0.0.1", 0))
  .unwrap();

  let addr = server.addrs()[0];
  actix_web::rt::spawn(server.run());
  (addr, outcomes)
}

/// An address nothing listens on.
pub fn closed_port() -> SocketAddr {
  let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
  listener.local_addr().unwrap()
}

async fn echo(req: HttpRequest, body: Bytes, name: web::Data<&'static str>) -> HttpResponse {
  let headers: Map<String, Value> = req
    .headers()
    .iter()
    .map(|(key, value)| (key.to_string(), json!(value.to_str().unwrap_or_default())))
    .collect();

  HttpResponse::Ok()
    .insert_header(("x-upstream", *name.get_ref()))
    .insert_header(("x-internal", "secret"))
    .json(json!({
      "upstream": *name.get_ref(),
      "method": req.method().as_str(),
      "path": req.path(),
      "query": req.query_string(),
      "headers": headers,
      "body": String::from_utf8_lossy(&body),
    }))
}

async fn gbk() -> HttpResponse {
  HttpResponse::Ok()
    .insert_header((CONTENT_TYPE, "text/plain; charset=gbk"))
    .body(GBK_HELLO)
}

async fn chunked() -> HttpResponse {
  let chunks = vec![
    Ok::<_, actix_web::Error>(Bytes::from_static(b"part one, ")),
    Ok(Bytes::from_static(b"part two")),
  ];

  HttpResponse::Ok()
    .insert_header(("X-Internal", "secret"))
    .insert_header(("x-public", "visible"))
    .streaming(stream::iter(chunks))
}

async fn redirect() -> HttpResponse {
  HttpResponse::Found().insert_header((LOCATION, "/landing")).finish()
}

async fn landing() -> HttpResponse {
  HttpResponse::Ok().body("landed")
}

async fn set_cookie() -> HttpResponse {
  HttpResponse::Ok()
    .insert_header((SET_COOKIE, "session=abc; Path=/"))
    .body("set")
}

async fn get_cookie(req: HttpRequest) -> HttpResponse {
  let cookie = req
    .headers()
    .get(COOKIE)
    .and_then(|value| value.to_str().ok())
    .unwrap_or_default()
    .to_string();

  HttpResponse::Ok().body(cookie)
}

struct SinkGuard {
  report: UnboundedSender<SinkOutcome>,
  received: usize,
  outcome: Option<SinkOutcome>,
}

impl Drop for SinkGuard {
  fn drop(&mut self) {
    let outcome = self
      .outcome
      .take()
      .unwrap_or_else(|| Err(format!("handler dropped after {} bytes", self.received)));
    let _ = self.report.send(outcome);
  }
}

async fn sink(mut payload: web::Payload, report: web::Data<UnboundedSender<SinkOutcome>>) -> HttpResponse {
  let mut guard = SinkGuard {
    report: report.get_ref().clone(),
    received: 0,
    outcome: None,
  };

  while let Some(chunk) = payload.next().await {
    match chunk {
      Ok(chunk) => guard.received += chunk.len(),
      Err(err) => {
        guard.outcome = Some(Err(format!("{} after {} bytes", err, guard.received)));
        return HttpResponse::BadRequest().finish();
      }
    }
  }

  guard.outcome = Some(Ok(guard.received));
  HttpResponse::Ok().finish()
}
