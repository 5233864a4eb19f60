use actix_web::http::header::CONTENT_TYPE;
use actix_web::{HttpMessage, HttpRequest};
use bytes::Bytes;
use serde_json::Value;
use url::form_urlencoded;

/// A request body that an earlier layer already read and decoded.
///
/// Body-parsing middleware puts one of these in the request extensions; when it is present the
/// proxy forwards it as a buffered body, otherwise the raw payload is streamed upstream.
#[derive(Clone, Debug, PartialEq)]
pub enum ParsedBody {
  Bytes(Bytes),
  Text(String),
  Value(Value),
}

/// Normalizes the parsed body of `req`, if any, into bytes ready for transport.
pub fn materialize(req: &HttpRequest) -> Option<Bytes> {
  let extensions = req.extensions();
  let body = extensions.get::<ParsedBody>()?;
  let content_type = req
    .headers()
    .get(CONTENT_TYPE)
    .and_then(|value| value.to_str().ok());

  Some(serialize(body, content_type))
}

pub fn serialize(body: &ParsedBody, content_type: Option<&str>) -> Bytes {
  match body {
    ParsedBody::Bytes(bytes) => bytes.clone(),
    ParsedBody::Text(text) => Bytes::from(text.clone()),
    ParsedBody::Value(value) => {
      if content_type.map_or(false, |content_type| content_type.contains("json")) {
        Bytes::from(value.to_string())
      } else {
        Bytes::from(to_text(value))
      }
    }
  }
}

fn to_text(value: &Value) -> String {
  match value {
    Value::String(text) => text.clone(),
    Value::Object(fields) if fields.values().all(|field| !field.is_object() && !field.is_array()) => {
      let mut form = form_urlencoded::Serializer::new(String::new());
      for (name, field) in fields {
        form.append_pair(name, &scalar_text(field));
      }
      form.finish()
    }
    other => other.to_string(),
  }
}

fn scalar_text(value: &Value) -> String {
  match value {
    Value::String(text) => text.clone(),
    Value::Null => String::new(),
    other => other.to_string(),
  }
}
