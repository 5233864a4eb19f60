use std::rc::Rc;
use std::sync::Arc;

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::Error;
use futures_core::future::LocalBoxFuture;

use crate::error::ProxyError;
use crate::http_client::{HttpClientConfig, UpstreamClients};
use crate::proxy_service::proxy_config::ProxyConfig;
use crate::proxy_service::proxy_route_service::ProxyRouteService;

/// Reverse-proxy middleware. Wrap an `App` or scope with it; requests it does not resolve to an
/// upstream go on to the wrapped service.
#[derive(Clone)]
pub struct Proxy {
  config: Arc<ProxyConfig>,
  http_clients: UpstreamClients,
}

impl Proxy {
  pub fn new(config: ProxyConfig) -> Result<Self, ProxyError> {
    let http_clients = HttpClientConfig::default()
      .to_clients()
      .map_err(|err| ProxyError::Configuration(format!("unable to build http client: {}", err)))?;
    Ok(Self::create(http_clients, config))
  }

  pub fn create(http_clients: UpstreamClients, config: ProxyConfig) -> Self {
    Self {
      config: Arc::new(config),
      http_clients,
    }
  }
}

impl<S, B> Transform<S, ServiceRequest> for Proxy
where
  S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
  B: MessageBody + 'static,
{
  type Response = ServiceResponse<EitherBody<B>>;
  type Error = Error;
  type Transform = ProxyRouteService<S>;
  type InitError = ();
  type Future = LocalBoxFuture<'static, Result<Self::Transform, Self::InitError>>;

  fn new_transform(&self, service: S) -> Self::Future {
    let service = ProxyRouteService {
      next: Rc::new(service),
      config: self.config.clone(),
      http_clients: self.http_clients.clone(),
    };

    Box::pin(async move { Ok(service) })
  }
}
