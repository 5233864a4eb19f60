use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::ErrorKind;

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Copy, Hash, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
  #[default]
  Get,
  Post,
  Put,
  Delete,
  Head,
  Patch,
  Options,
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone)]
pub struct NameValuePair {
  pub name: String,
  pub value: String,
}

/// Static overwrites for the outbound request.
#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Default)]
pub struct RequestOptionsConfig {
  pub url: Option<String>,
  pub method: Option<HttpMethod>,
  pub headers: Option<Vec<NameValuePair>>,
  pub body: Option<String>,
  pub follow_redirect: Option<bool>,
  pub jar: Option<bool>,
}

#[derive(Serialize, Deserialize, PartialEq, Debug, Clone, Default)]
pub struct RouteConfig {
  pub host: Option<String>,
  pub url: Option<String>,
  pub map: Option<HashMap<String, String>>,
  #[serde(rename = "match")]
  pub match_path: Option<String>,
  pub suppress_request_headers: Option<Vec<String>>,
  pub suppress_response_headers: Option<Vec<String>>,
  pub follow_redirect: Option<bool>,
  pub jar: Option<bool>,
  pub request_options: Option<RequestOptionsConfig>,
  pub encoding: Option<String>,
  pub yield_next: Option<bool>,
}

impl RouteConfig {
  pub fn load_from_file(file: &File) -> Result<RouteConfig, std::io::Error> {
    let route_config: RouteConfig =
      serde_yaml::from_reader(file).map_err(|err| std::io::Error::new(ErrorKind::Other, err))?;

    Ok(route_config)
  }
}

impl From<HttpMethod> for reqwest::Method {
  fn from(value: HttpMethod) -> Self {
    match value {
      HttpMethod::Get => reqwest::Method::GET,
      HttpMethod::Post => reqwest::Method::POST,
      HttpMethod::Put => reqwest::Method::PUT,
      HttpMethod::Delete => reqwest::Method::DELETE,
      HttpMethod::Head => reqwest::Method::HEAD,
      HttpMethod::Patch => reqwest::Method::PATCH,
      HttpMethod::Options => reqwest::Method::OPTIONS,
    }
  }
}
