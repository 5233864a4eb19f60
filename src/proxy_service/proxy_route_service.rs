use std::rc::Rc;
use std::sync::Arc;

use actix_web::body::{EitherBody, MessageBody};
use actix_web::dev::{self, Service, ServiceRequest, ServiceResponse};
use actix_web::{Error, HttpMessage};
use futures_core::future::LocalBoxFuture;
use log::{debug, error};

use crate::http_client::UpstreamClients;
use crate::proxy_service::body;
use crate::proxy_service::forwarder::{self, UpstreamRequest};
use crate::proxy_service::header_filter;
use crate::proxy_service::proxy_config::ProxyConfig;
use crate::proxy_service::relay;
use crate::proxy_service::url_resolver;

pub struct ProxyRouteService<S> {
  pub(super) next: Rc<S>,
  pub(super) config: Arc<ProxyConfig>,
  pub(super) http_clients: UpstreamClients,
}

impl<S, B> Service<ServiceRequest> for ProxyRouteService<S>
where
  S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
  B: MessageBody + 'static,
{
  type Response = ServiceResponse<EitherBody<B>>;
  type Error = Error;
  type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

  dev::forward_ready!(next);

  fn call(&self, req: ServiceRequest) -> Self::Future {
    Box::pin(Self::exec(
      self.next.clone(),
      self.config.clone(),
      self.http_clients.clone(),
      req,
    ))
  }
}

impl<S, B> ProxyRouteService<S>
where
  S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
  B: MessageBody + 'static,
{
  async fn exec(
    next: Rc<S>,
    config: Arc<ProxyConfig>,
    http_clients: UpstreamClients,
    mut req: ServiceRequest,
  ) -> Result<ServiceResponse<EitherBody<B>>, Error> {
    // Host and everything derived from it stay local to this request.
    let host = url_resolver::resolve_host(&config, req.request()).await?;
    let path = req.path().to_string();

    let mut target = match url_resolver::resolve_url(&path, host.as_deref(), &config)? {
      Some(target) => target,
      None => {
        debug!("No upstream for '{}', passing on", path);
        return next.call(req).await.map(ServiceResponse::map_into_left_body);
      }
    };

    if !url_resolver::path_matches(&path, &config) {
      debug!("'{}' does not match the proxy pattern, passing on", path);
      return next.call(req).await.map(ServiceResponse::map_into_left_body);
    }

    if !req.query_string().is_empty() {
      target.set_query(Some(req.query_string()));
    }

    let buffered_body = body::materialize(req.request());
    let headers = header_filter::request_headers(
      req.headers().iter(),
      host.as_deref(),
      &config.suppress_request_headers,
    );

    let buffered = buffered_body.is_some();
    let upstream_request = UpstreamRequest {
      url: target,
      method: req.method().clone(),
      headers,
      body: buffered_body,
      follow_redirect: config.follow_redirect,
      jar: None,
    }
    .apply(config.request_options.as_ref(), req.request())?;

    let upstream_url = upstream_request.url.clone();
    let payload = req.take_payload();
    let upstream_response = forwarder::forward(&http_clients, upstream_request, buffered, payload, config.jar)
      .await
      .map_err(|err| {
        error!("Proxy request to {} failed {}", upstream_url, err);
        err
      })?;

    debug!("Upstream {} answered {}", upstream_url, upstream_response.status);

    let proxied = relay::relay(upstream_response, &config);

    if config.yield_next && !proxied.is_transcoded() {
      req.extensions_mut().insert(proxied);
      return next.call(req).await.map(ServiceResponse::map_into_left_body);
    }

    let response = proxied.to_http_response();
    Ok(req.into_response(response).map_into_right_body())
  }
}
