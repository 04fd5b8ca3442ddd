//! Middleware stages composed around an endpoint.
//!
//! A [`Pipeline`] is an ordered list of stages followed by an endpoint. Each
//! stage receives the request and a [`Next`] handle, and may answer on its
//! own or call `next.run(request)` to continue down the list.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{event, Level};
use uuid::Uuid;

use super::{Request, Response};

#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, request: Request, next: Next<'_>) -> Response;
}

/// The innermost handler of a pipeline.
#[async_trait]
pub trait Endpoint: Send + Sync {
    async fn call(&self, request: Request) -> Response;
}

/// The remainder of a pipeline.
pub struct Next<'a> {
    stages: &'a [Arc<dyn Middleware>],
    endpoint: &'a dyn Endpoint,
}

impl<'a> Next<'a> {
    pub async fn run(self, request: Request) -> Response {
        match self.stages.split_first() {
            Some((stage, rest)) => {
                let next = Next {
                    stages: rest,
                    endpoint: self.endpoint,
                };
                stage.handle(request, next).await
            }
            None => self.endpoint.call(request).await,
        }
    }
}

pub struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
    endpoint: Arc<dyn Endpoint>,
}

impl Pipeline {
    pub fn new(endpoint: Arc<dyn Endpoint>) -> Pipeline {
        Pipeline {
            stages: vec![],
            endpoint,
        }
    }

    /// Appends a stage. Stages run in the order they were added, so the
    /// first stage added is the outermost.
    pub fn stage(mut self, stage: Arc<dyn Middleware>) -> Pipeline {
        self.stages.push(stage);
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub async fn run(&self, request: Request) -> Response {
        let next = Next {
            stages: &self.stages,
            endpoint: self.endpoint.as_ref(),
        };
        next.run(request).await
    }
}

/// Logs every request in the "dev" format:
/// `:method :url :status :response-time - :res[content-length]`.
pub struct Logger {
    route: &'static str,
}

impl Logger {
    pub fn new(route: &'static str) -> Logger {
        Logger { route }
    }
}

#[async_trait]
impl Middleware for Logger {
    fn name(&self) -> &'static str {
        "logger"
    }

    async fn handle(&self, request: Request, next: Next<'_>) -> Response {
        let start = Instant::now();
        let request_id = Uuid::new_v4();
        let method = request.method.clone();
        let resource = request.resource();

        let response = next.run(request).await;

        let elapsed = start.elapsed();
        event!(
            Level::INFO,
            route = self.route,
            request_id = %request_id,
            method = %method,
            path = %resource,
            status = response.status.as_u16(),
            elapsed_us = elapsed.as_micros() as u64,
            size = response.size(),
            "{} {} {} {:?} - {}",
            method,
            resource,
            response.status.as_u16(),
            elapsed,
            response.size()
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use warp::http::{Method, StatusCode};

    struct Static(StatusCode);

    #[async_trait]
    impl Endpoint for Static {
        async fn call(&self, _request: Request) -> Response {
            Response::new(self.0)
        }
    }

    /// Records the order stages run in.
    struct Trace {
        label: &'static str,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Middleware for Trace {
        fn name(&self) -> &'static str {
            self.label
        }

        async fn handle(&self, request: Request, next: Next<'_>) -> Response {
            self.seen.lock().unwrap().push(self.label);
            next.run(request).await
        }
    }

    struct Deny;

    #[async_trait]
    impl Middleware for Deny {
        fn name(&self) -> &'static str {
            "deny"
        }

        async fn handle(&self, _request: Request, _next: Next<'_>) -> Response {
            Response::new(StatusCode::FORBIDDEN)
        }
    }

    #[tokio::test]
    async fn stages_run_in_order_test() {
        let seen = Arc::new(Mutex::new(vec![]));
        let pipeline = Pipeline::new(Arc::new(Static(StatusCode::OK)))
            .stage(Arc::new(Trace {
                label: "outer",
                seen: seen.clone(),
            }))
            .stage(Arc::new(Trace {
                label: "inner",
                seen: seen.clone(),
            }));

        assert_eq!(pipeline.stage_names(), vec!["outer", "inner"]);
        let response = pipeline.run(Request::new(Method::GET, "/")).await;
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(*seen.lock().unwrap(), vec!["outer", "inner"]);
    }

    #[tokio::test]
    async fn stage_can_short_circuit_test() {
        let seen = Arc::new(Mutex::new(vec![]));
        let pipeline = Pipeline::new(Arc::new(Static(StatusCode::OK)))
            .stage(Arc::new(Logger::new("test")))
            .stage(Arc::new(Deny))
            .stage(Arc::new(Trace {
                label: "unreached",
                seen: seen.clone(),
            }));

        let response = pipeline.run(Request::new(Method::GET, "/")).await;
        assert_eq!(response.status, StatusCode::FORBIDDEN);
        assert!(seen.lock().unwrap().is_empty());
    }
}
