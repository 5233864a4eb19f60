use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
  #[error("invalid proxy configuration: {0}")]
  Configuration(String),

  #[error("upstream request failed: {0}")]
  Upstream(#[from] reqwest::Error),

  #[error("invalid upstream target: {0}")]
  InvalidTarget(String),

  #[error("host resolver failed: {0}")]
  Resolver(String),

  #[error("unable to read request payload: {0}")]
  Payload(String),
}

impl ResponseError for ProxyError {
  fn status_code(&self) -> StatusCode {
    match self {
      ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
      ProxyError::Payload(_) => StatusCode::BAD_REQUEST,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    HttpResponse::build(self.status_code()).finish()
  }
}
