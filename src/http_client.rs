use std::sync::Arc;

use reqwest::cookie::Jar;
use reqwest::redirect::Policy;
use reqwest::Client;

const MAX_REDIRECTS: usize = 10;

#[derive(Default)]
pub struct HttpClientConfig {
  pub http_proxy: Option<String>,
  pub user: Option<String>,
  pub pass: Option<String>,
}

/// Cookie handling and redirect policy are fixed per reqwest client, so one client is built for
/// each combination. Both cookie-enabled clients share a single jar.
#[derive(Clone)]
pub struct UpstreamClients {
  plain: Client,
  plain_no_redirect: Client,
  jar: Client,
  jar_no_redirect: Client,
}

impl HttpClientConfig {
  pub fn to_clients(self) -> Result<UpstreamClients, reqwest::Error> {
    let cookie_jar = Arc::new(Jar::default());

    Ok(UpstreamClients {
      plain: self.to_client(None, true)?,
      plain_no_redirect: self.to_client(None, false)?,
      jar: self.to_client(Some(cookie_jar.clone()), true)?,
      jar_no_redirect: self.to_client(Some(cookie_jar), false)?,
    })
  }

  fn to_client(&self, cookie_jar: Option<Arc<Jar>>, follow_redirect: bool) -> Result<Client, reqwest::Error> {
    let mut client_builder = reqwest::ClientBuilder::new();

    if let Some(proxy_url) = &self.http_proxy {
      let mut proxy = reqwest::Proxy::all(proxy_url.as_str())?;

      if let (Some(user_name), Some(password)) = (&self.user, &self.pass) {
        proxy = proxy.basic_auth(user_name, password);
      }

      client_builder = client_builder.proxy(proxy);
    }

    if let Some(cookie_jar) = cookie_jar {
      client_builder = client_builder.cookie_provider(cookie_jar);
    }

    let policy = if follow_redirect {
      Policy::limited(MAX_REDIRECTS)
    } else {
      Policy::none()
    };

    client_builder.redirect(policy).build()
  }
}

impl UpstreamClients {
  pub fn select(&self, jar: bool, follow_redirect: bool) -> &Client {
    match (jar, follow_redirect) {
      (false, true) => &self.plain,
      (false, false) => &self.plain_no_redirect,
      (true, true) => &self.jar,
      (true, false) => &self.jar_no_redirect,
    }
  }
}
