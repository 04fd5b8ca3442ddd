/*!

# HTTP Interfaces

## Introduction

Every inbound request is matched against a static route table, passed through an ordered list of middleware stages and finally dispatched to a resource.

```text
request -> Router -> [Logger, Authenticator?] -> Resource -> Store
```

warp only accepts the connection and reads the (capped) body; routing, authentication and serialization live in this module so the whole pipeline can be exercised without a socket.

## Responses

Successful responses are JSON with `Content-Type: application/json;charset=UTF-8`. Every failure carries a JSON body:

```json
{"code": "404", "error": "no node with id 9999"}
```

Body validation failures answer 422 with a `reason`, and unsupported methods answer 405 with a `message`.

*/

pub mod filters;
pub mod middleware;
pub mod resource;
pub mod routes;
pub mod views;

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;
use warp::http::header::{HeaderName, HeaderValue, CONTENT_TYPE, HOST};
use warp::http::{HeaderMap, Method, StatusCode};

use crate::auth::hawk::split_host;
use crate::db::Store;

pub const CONTENT_TYPE_JSON: &str = "application/json;charset=UTF-8";

/// Shared state handed to every resource.
pub struct Context {
    pub store: Arc<dyn Store>,
    pub page_size: u32,
}

/// An inbound request with its body fully read.
#[derive(Clone, Debug)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    /// Named path parameters filled in by the router.
    pub params: HashMap<String, String>,
}

impl Request {
    pub fn new(method: Method, path: &str) -> Request {
        Request {
            method,
            path: String::from(path),
            query: None,
            headers: HeaderMap::new(),
            body: vec![],
            params: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: &str) -> Request {
        if let Ok(value) = HeaderValue::from_str(value) {
            self.headers.insert(HeaderName::from_static(name), value);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Request {
        self.body = body.into();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Path and query string as sent by the client.
    pub fn resource(&self) -> String {
        match &self.query {
            Some(query) if !query.is_empty() => format!("{}?{}", self.path, query),
            _ => self.path.clone(),
        }
    }

    pub fn host_and_port(&self) -> (String, u16) {
        split_host(self.header(HOST.as_str()).unwrap_or(""))
    }

    pub fn content_type(&self) -> &str {
        self.header(CONTENT_TYPE.as_str()).unwrap_or("")
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// A fully rendered response.
#[derive(Clone, Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: StatusCode) -> Response {
        Response {
            status,
            headers: HeaderMap::new(),
            body: vec![],
        }
    }

    pub fn json<T: Serialize + ?Sized>(status: StatusCode, data: &T) -> Response {
        match serde_json::to_vec(data) {
            Ok(body) => {
                let mut response = Response::new(status);
                response
                    .headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));
                response.body = body;
                response
            }
            Err(err) => {
                let mut response = Response::new(StatusCode::INTERNAL_SERVER_ERROR);
                response.body = err.to_string().into_bytes();
                response
            }
        }
    }

    /// The `{code, error}` body every failure carries.
    pub fn error(status: StatusCode, error: &str) -> Response {
        Response::json(
            status,
            &json!({
                "code": status.as_u16().to_string(),
                "error": error,
            }),
        )
    }

    pub fn with_header(mut self, name: HeaderName, value: &'static str) -> Response {
        self.headers.insert(name, HeaderValue::from_static(value));
        self
    }

    pub fn size(&self) -> usize {
        self.body.len()
    }

    pub fn into_http(self) -> warp::http::Response<Vec<u8>> {
        let mut response = warp::http::Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
