use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use warp::http::Method;

use super::middleware::{Endpoint, Logger, Pipeline};
use super::resource::{dispatch, Resource};
use super::views::{NodeCollection, NodeDetail, PingCollection, PingDetail};
use super::{Context, Request, Response};
use crate::auth::Authenticator;
use crate::error::ApiError;

/// One entry of the route table.
pub struct Route {
    pub name: &'static str,
    pub methods: Vec<Method>,
    pub pattern: &'static str,
    pub resource: Arc<dyn Resource>,
    pub authorize: bool,
}

impl Route {
    pub fn new(name: &'static str, pattern: &'static str, resource: Arc<dyn Resource>) -> Route {
        Route {
            name,
            methods: vec![Method::GET, Method::POST, Method::PUT, Method::DELETE],
            pattern,
            resource,
            authorize: true,
        }
    }

    pub fn matches(&self, path: &str) -> Option<HashMap<String, String>> {
        match_pattern(self.pattern, path)
    }
}

/// Match `path` against `pattern`, capturing `{name}` segments. A single
/// trailing slash resolves to the same route.
pub fn match_pattern(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let path = match path.strip_suffix('/') {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => path,
    };
    let pattern: Vec<&str> = pattern.split('/').collect();
    let path: Vec<&str> = path.split('/').collect();
    if pattern.len() != path.len() {
        return None;
    }

    let mut params = HashMap::new();
    for (expected, actual) in pattern.iter().zip(path.iter()) {
        if let Some(name) = expected.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            if actual.is_empty() {
                return None;
            }
            params.insert(String::from(name), String::from(*actual));
        } else if expected != actual {
            return None;
        }
    }
    Some(params)
}

/// The routes the API serves.
pub fn routes() -> Vec<Route> {
    vec![
        Route::new("NodeCollection", "/nodes", Arc::new(NodeCollection)),
        Route::new("NodeDetail", "/nodes/{id}", Arc::new(NodeDetail)),
        Route::new("PingCollection", "/pings", Arc::new(PingCollection)),
        Route::new("PingDetail", "/pings/{id}", Arc::new(PingDetail)),
    ]
}

/// Hands a request to a resource once the stages in front of it have run.
struct ResourceEndpoint {
    resource: Arc<dyn Resource>,
    ctx: Arc<Context>,
}

#[async_trait]
impl Endpoint for ResourceEndpoint {
    async fn call(&self, request: Request) -> Response {
        dispatch(self.resource.as_ref(), &self.ctx, &request).await
    }
}

/// Answers requests no route accepted: 405 when some pattern matched the
/// path, 404 otherwise.
struct Fallback {
    patterns: Vec<&'static str>,
}

#[async_trait]
impl Endpoint for Fallback {
    async fn call(&self, request: Request) -> Response {
        let path_known = self
            .patterns
            .iter()
            .any(|pattern| match_pattern(pattern, &request.path).is_some());

        let err = if path_known {
            ApiError::MethodNotAllowed {
                method: request.method.to_string(),
                path: request.path.clone(),
            }
        } else {
            ApiError::NotFound(format!("{} not found", request.path))
        };
        Response::error(err.status(), &err.to_string())
    }
}

struct Entry {
    route: Route,
    pipeline: Pipeline,
}

/// Matches requests against the route table and runs the route's pipeline:
/// `[logger, authenticator?] -> resource`.
pub struct Router {
    entries: Vec<Entry>,
    fallback: Pipeline,
}

impl Router {
    pub fn new(routes: Vec<Route>, ctx: Arc<Context>, authenticator: Arc<Authenticator>) -> Router {
        let patterns = routes.iter().map(|route| route.pattern).collect();
        let entries = routes
            .into_iter()
            .map(|route| {
                let endpoint = Arc::new(ResourceEndpoint {
                    resource: route.resource.clone(),
                    ctx: ctx.clone(),
                });
                let mut pipeline = Pipeline::new(endpoint).stage(Arc::new(Logger::new(route.name)));
                if route.authorize {
                    pipeline = pipeline.stage(authenticator.clone());
                }
                Entry { route, pipeline }
            })
            .collect();

        Router {
            entries,
            fallback: Pipeline::new(Arc::new(Fallback { patterns }))
                .stage(Arc::new(Logger::new("fallback"))),
        }
    }

    pub fn route_names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|entry| entry.route.name).collect()
    }

    /// The middleware stages of the named route, outermost first.
    pub fn stages(&self, name: &str) -> Option<Vec<&'static str>> {
        self.entries
            .iter()
            .find(|entry| entry.route.name == name)
            .map(|entry| entry.pipeline.stage_names())
    }

    pub async fn handle(&self, mut request: Request) -> Response {
        for entry in &self.entries {
            if !entry.route.methods.contains(&request.method) {
                continue;
            }
            if let Some(params) = entry.route.matches(&request.path) {
                request.params = params;
                return entry.pipeline.run(request).await;
            }
        }
        self.fallback.run(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::Credential;
    use crate::auth::hawk::{Artifacts, Header};
    use crate::db::{SqliteStore, Store};
    use crate::models::Node;
    use std::time::Duration;
    use warp::http::StatusCode;

    async fn router() -> Router {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let mut node = Node::new("apollo");
        node.key = Some(String::from("supersecretkey"));
        store.save_node(&mut node).await.unwrap();

        let ctx = Arc::new(Context {
            store: store.clone(),
            page_size: 10,
        });
        let authenticator = Arc::new(Authenticator::new(store, Duration::from_secs(60)));
        Router::new(routes(), ctx, authenticator)
    }

    fn signed(method: Method, path: &str) -> Request {
        let credential = Credential::new("apollo", "supersecretkey");
        let artifacts = Artifacts::new(method.as_str(), path, "localhost", 8080);
        Request::new(method, path)
            .with_header("host", "localhost:8080")
            .with_header("authorization", &Header::sign(&credential, &artifacts).to_string())
    }

    #[test]
    fn match_pattern_test() {
        let params = match_pattern("/nodes/{id}", "/nodes/42").unwrap();
        assert_eq!(params["id"], "42");
        assert!(match_pattern("/nodes", "/nodes/").is_some());
        assert!(match_pattern("/nodes/{id}", "/nodes/42/").is_some());
        assert!(match_pattern("/nodes", "/pings").is_none());
        assert!(match_pattern("/nodes/{id}", "/nodes").is_none());
        assert!(match_pattern("/nodes/{id}", "/nodes/1/2").is_none());
    }

    #[test]
    fn only_one_trailing_slash_is_normalized_test() {
        assert!(match_pattern("/nodes", "//nodes").is_none());
        assert!(match_pattern("/nodes", "/nodes//").is_none());
        assert!(match_pattern("/nodes/{id}", "/nodes//").is_none());
        assert!(match_pattern("/nodes/{id}", "/nodes//42").is_none());
    }

    #[tokio::test]
    async fn repeated_slashes_are_not_found_test() {
        let router = router().await;
        let response = router.handle(signed(Method::GET, "//nodes")).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn logger_wraps_authenticator_test() {
        let router = router().await;
        assert_eq!(
            router.route_names(),
            vec!["NodeCollection", "NodeDetail", "PingCollection", "PingDetail"]
        );
        for name in router.route_names() {
            assert_eq!(router.stages(name).unwrap(), vec!["logger", "hawk"]);
        }
        assert!(router.stages("Missing").is_none());
    }

    #[tokio::test]
    async fn unmatched_path_is_not_found_test() {
        let router = router().await;
        let response = router.handle(signed(Method::GET, "/widgets")).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["code"], "404");
    }

    #[tokio::test]
    async fn disallowed_method_is_method_not_allowed_test() {
        let router = router().await;
        let response = router.handle(signed(Method::PATCH, "/nodes")).await;
        assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["code"], "405");
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn routes_require_authentication_test() {
        let router = router().await;
        let response = router.handle(Request::new(Method::GET, "/nodes")).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);

        let response = router.handle(signed(Method::GET, "/nodes/")).await;
        assert_eq!(response.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn detail_route_captures_id_test() {
        let router = router().await;
        let response = router.handle(signed(Method::GET, "/nodes/1")).await;
        assert_eq!(response.status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["name"], "apollo");
        assert!(body.get("key").is_none());
    }
}
