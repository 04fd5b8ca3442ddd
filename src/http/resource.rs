use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use warp::http::{Method, StatusCode};

use super::{Context, Request, Response};
use crate::error::ApiError;

/// What a resource operation produced, before it is rendered.
#[derive(Debug)]
pub enum Outcome {
    Ok { status: StatusCode, body: Value },
    /// A failure. With no status the response is a 500.
    Err {
        status: Option<StatusCode>,
        error: Value,
    },
}

impl Outcome {
    pub fn ok<T: serde::Serialize>(status: StatusCode, body: &T) -> Outcome {
        match serde_json::to_value(body) {
            Ok(body) => Outcome::Ok { status, body },
            Err(err) => Outcome::err(None, err.to_string()),
        }
    }

    pub fn no_content() -> Outcome {
        Outcome::Ok {
            status: StatusCode::NO_CONTENT,
            body: Value::Null,
        }
    }

    pub fn err(status: Option<StatusCode>, error: impl Into<String>) -> Outcome {
        Outcome::Err {
            status,
            error: Value::String(error.into()),
        }
    }

    /// 422 with a `reason` alongside the error.
    pub fn unprocessable(reason: &str, error: impl Into<String>) -> Outcome {
        Outcome::Err {
            status: Some(StatusCode::UNPROCESSABLE_ENTITY),
            error: json!({ "reason": reason, "error": error.into() }),
        }
    }

    pub fn into_response(self) -> Response {
        match self {
            Outcome::Ok { status, body } => Response::json(status, &body),
            Outcome::Err { status, error } => {
                let status = status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
                let code = status.as_u16().to_string();
                match error {
                    Value::Object(mut fields) => {
                        fields.insert(String::from("code"), Value::String(code));
                        Response::json(status, &Value::Object(fields))
                    }
                    Value::String(error) => Response::error(status, &error),
                    other => Response::error(status, &other.to_string()),
                }
            }
        }
    }
}

impl From<ApiError> for Outcome {
    fn from(err: ApiError) -> Self {
        Outcome::err(Some(err.status()), err.to_string())
    }
}

/// The 405 a resource answers for an operation it does not implement.
pub fn not_supported(method: &Method) -> Outcome {
    let status = StatusCode::METHOD_NOT_ALLOWED;
    Outcome::Err {
        status: Some(status),
        error: json!({
            "reason": "Method Not Allowed",
            "message": format!("This resource does not support HTTP {}.", method),
        }),
    }
}

/// A REST resource. Every operation defaults to "not supported", so an
/// implementation only overrides what it serves.
#[async_trait]
pub trait Resource: Send + Sync {
    async fn get(&self, _ctx: &Context, _request: &Request) -> Outcome {
        not_supported(&Method::GET)
    }

    async fn post(&self, _ctx: &Context, _request: &Request) -> Outcome {
        not_supported(&Method::POST)
    }

    async fn put(&self, _ctx: &Context, _request: &Request) -> Outcome {
        not_supported(&Method::PUT)
    }

    async fn delete(&self, _ctx: &Context, _request: &Request) -> Outcome {
        not_supported(&Method::DELETE)
    }
}

/// Call the operation matching the request method and render its outcome.
pub async fn dispatch(resource: &dyn Resource, ctx: &Context, request: &Request) -> Response {
    let outcome = match request.method {
        Method::GET => resource.get(ctx, request).await,
        Method::POST => resource.post(ctx, request).await,
        Method::PUT => resource.put(ctx, request).await,
        Method::DELETE => resource.delete(ctx, request).await,
        _ => return Response::new(StatusCode::NOT_IMPLEMENTED),
    };
    outcome.into_response()
}

/// The numeric `id` path parameter.
pub fn path_id(request: &Request) -> Result<i64, ApiError> {
    let raw = request.param("id").unwrap_or("");
    raw.parse::<i64>()
        .map_err(|_| ApiError::MalformedRequest(format!("could not parse id {:?}", raw)))
}

/// Decode a JSON request body, or the 422 to answer with.
pub fn decode<T: DeserializeOwned>(request: &Request) -> Result<T, Outcome> {
    serde_json::from_slice(&request.body)
        .map_err(|err| Outcome::unprocessable("could not decode request body", err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use std::sync::Arc;
    use warp::http::header::CONTENT_TYPE;

    struct GetOnly;

    #[async_trait]
    impl Resource for GetOnly {
        async fn get(&self, _ctx: &Context, _request: &Request) -> Outcome {
            Outcome::ok(StatusCode::OK, &json!({ "hello": "world" }))
        }
    }

    async fn context() -> Context {
        Context {
            store: Arc::new(SqliteStore::in_memory().await.unwrap()),
            page_size: 10,
        }
    }

    fn body(response: &Response) -> Value {
        serde_json::from_slice(&response.body).unwrap()
    }

    #[tokio::test]
    async fn dispatch_routes_by_method_test() {
        let ctx = context().await;

        let response = dispatch(&GetOnly, &ctx, &Request::new(Method::GET, "/")).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers[CONTENT_TYPE], super::super::CONTENT_TYPE_JSON);
        assert_eq!(body(&response)["hello"], "world");

        let response = dispatch(&GetOnly, &ctx, &Request::new(Method::PUT, "/")).await;
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
        let error = body(&response);
        assert_eq!(error["code"], "405");
        assert_eq!(error["reason"], "Method Not Allowed");
        assert_eq!(error["message"], "This resource does not support HTTP PUT.");

        let response = dispatch(&GetOnly, &ctx, &Request::new(Method::PATCH, "/")).await;
        assert_eq!(response.status, StatusCode::NOT_IMPLEMENTED);
        assert!(response.body.is_empty());
    }

    #[test]
    fn outcome_rendering_test() {
        let response = Outcome::no_content().into_response();
        assert_eq!(response.status, StatusCode::NO_CONTENT);
        assert_eq!(response.body, b"null".to_vec());

        let response = Outcome::err(None, "boom").into_response();
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body(&response), json!({ "code": "500", "error": "boom" }));

        let response = Outcome::unprocessable("invalid node", "name is required").into_response();
        assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body(&response),
            json!({ "code": "422", "reason": "invalid node", "error": "name is required" })
        );
    }

    #[test]
    fn path_id_test() {
        let mut request = Request::new(Method::GET, "/nodes/42");
        request.params.insert(String::from("id"), String::from("42"));
        assert_eq!(path_id(&request).unwrap(), 42);

        request.params.insert(String::from("id"), String::from("abc"));
        let err = path_id(&request).unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
