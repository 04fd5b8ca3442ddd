//! The node and ping resources.

use async_trait::async_trait;
use tracing::{event, Level};
use warp::http::StatusCode;

use super::resource::{decode, path_id, Outcome, Resource};
use super::{Context, Request};
use crate::error::{ApiError, StoreError};
use crate::models::{Node, NodeUpdate, Ping, PingUpdate};

fn lookup_failed(err: StoreError) -> Outcome {
    if err.is_not_found() {
        Outcome::from(ApiError::NotFound(err.to_string()))
    } else {
        Outcome::err(None, err.to_string())
    }
}

fn save_failed(err: StoreError) -> Outcome {
    event!(Level::WARN, "save failed: {}", err);
    Outcome::from(ApiError::Conflict(err.to_string()))
}

/// `/nodes`
pub struct NodeCollection;

#[async_trait]
impl Resource for NodeCollection {
    async fn get(&self, ctx: &Context, _request: &Request) -> Outcome {
        match ctx.store.fetch_nodes(ctx.page_size).await {
            Ok(nodes) => Outcome::ok(StatusCode::OK, &nodes),
            Err(err) => Outcome::err(None, err.to_string()),
        }
    }

    async fn post(&self, ctx: &Context, request: &Request) -> Outcome {
        let mut node: Node = match decode(request) {
            Ok(node) => node,
            Err(outcome) => return outcome,
        };
        if let Err(reason) = node.validate() {
            return Outcome::unprocessable("invalid node", reason);
        }

        match ctx.store.save_node(&mut node).await {
            Ok(_) => {
                event!(Level::INFO, "created node {} ({})", node.id, node.name);
                Outcome::ok(StatusCode::CREATED, &node)
            }
            Err(err) => save_failed(err),
        }
    }
}

/// `/nodes/{id}`
pub struct NodeDetail;

impl NodeDetail {
    async fn fetch(ctx: &Context, request: &Request) -> Result<Node, Outcome> {
        let id = path_id(request)?;
        ctx.store.get_node(id).await.map_err(lookup_failed)
    }
}

#[async_trait]
impl Resource for NodeDetail {
    async fn get(&self, ctx: &Context, request: &Request) -> Outcome {
        match NodeDetail::fetch(ctx, request).await {
            Ok(node) => Outcome::ok(StatusCode::OK, &node),
            Err(outcome) => outcome,
        }
    }

    async fn put(&self, ctx: &Context, request: &Request) -> Outcome {
        let mut node = match NodeDetail::fetch(ctx, request).await {
            Ok(node) => node,
            Err(outcome) => return outcome,
        };
        let update: NodeUpdate = match decode(request) {
            Ok(update) => update,
            Err(outcome) => return outcome,
        };

        node.apply(update);
        if let Err(reason) = node.validate() {
            return Outcome::unprocessable("invalid node", reason);
        }

        match ctx.store.save_node(&mut node).await {
            Ok(_) => Outcome::ok(StatusCode::OK, &node),
            Err(err) => save_failed(err),
        }
    }

    async fn delete(&self, ctx: &Context, request: &Request) -> Outcome {
        let node = match NodeDetail::fetch(ctx, request).await {
            Ok(node) => node,
            Err(outcome) => return outcome,
        };

        match ctx.store.delete_node(&node).await {
            Ok(true) => {
                event!(Level::INFO, "deleted node {} ({})", node.id, node.name);
                Outcome::no_content()
            }
            Ok(false) => Outcome::from(ApiError::Conflict(String::from("Unable to delete node!"))),
            Err(err) => Outcome::err(None, err.to_string()),
        }
    }
}

/// `/pings`
pub struct PingCollection;

#[async_trait]
impl Resource for PingCollection {
    async fn get(&self, ctx: &Context, _request: &Request) -> Outcome {
        match ctx.store.fetch_pings(ctx.page_size).await {
            Ok(pings) => Outcome::ok(StatusCode::OK, &pings),
            Err(err) => Outcome::err(None, err.to_string()),
        }
    }

    async fn post(&self, ctx: &Context, request: &Request) -> Outcome {
        let mut ping: Ping = match decode(request) {
            Ok(ping) => ping,
            Err(outcome) => return outcome,
        };
        if let Err(reason) = ping.validate() {
            return Outcome::unprocessable("invalid ping", reason);
        }

        match ctx.store.save_ping(&mut ping).await {
            Ok(_) => Outcome::ok(StatusCode::CREATED, &ping),
            Err(err) => save_failed(err),
        }
    }
}

/// `/pings/{id}`
pub struct PingDetail;

impl PingDetail {
    async fn fetch(ctx: &Context, request: &Request) -> Result<Ping, Outcome> {
        let id = path_id(request)?;
        ctx.store.get_ping(id).await.map_err(lookup_failed)
    }
}

#[async_trait]
impl Resource for PingDetail {
    async fn get(&self, ctx: &Context, request: &Request) -> Outcome {
        match PingDetail::fetch(ctx, request).await {
            Ok(ping) => Outcome::ok(StatusCode::OK, &ping),
            Err(outcome) => outcome,
        }
    }

    async fn put(&self, ctx: &Context, request: &Request) -> Outcome {
        let mut ping = match PingDetail::fetch(ctx, request).await {
            Ok(ping) => ping,
            Err(outcome) => return outcome,
        };
        let update: PingUpdate = match decode(request) {
            Ok(update) => update,
            Err(outcome) => return outcome,
        };

        ping.apply(update);
        if let Err(reason) = ping.validate() {
            return Outcome::unprocessable("invalid ping", reason);
        }

        match ctx.store.save_ping(&mut ping).await {
            Ok(_) => Outcome::ok(StatusCode::OK, &ping),
            Err(err) => save_failed(err),
        }
    }

    async fn delete(&self, ctx: &Context, request: &Request) -> Outcome {
        let ping = match PingDetail::fetch(ctx, request).await {
            Ok(ping) => ping,
            Err(outcome) => return outcome,
        };

        match ctx.store.delete_ping(&ping).await {
            Ok(true) => Outcome::no_content(),
            Ok(false) => Outcome::from(ApiError::Conflict(String::from("Unable to delete ping!"))),
            Err(err) => Outcome::err(None, err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{SqliteStore, Store};
    use serde_json::Value;
    use std::sync::Arc;
    use warp::http::Method;

    async fn setup() -> (Context, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let ctx = Context {
            store: store.clone(),
            page_size: 10,
        };
        (ctx, store)
    }

    fn with_id(method: Method, path: &str, id: &str) -> Request {
        let mut request = Request::new(method, path);
        request.params.insert(String::from("id"), String::from(id));
        request
    }

    fn body(outcome: Outcome) -> (StatusCode, Value) {
        let response = outcome.into_response();
        let value = serde_json::from_slice(&response.body).unwrap_or(Value::Null);
        (response.status, value)
    }

    #[tokio::test]
    async fn create_node_test() {
        let (ctx, _) = setup().await;
        let request = Request::new(Method::POST, "/nodes")
            .with_body(r#"{"name": "apollo", "address": "108.51.64.223", "key": "injected"}"#);

        let (status, node) = body(NodeCollection.post(&ctx, &request).await);
        assert_eq!(status, StatusCode::CREATED);
        assert!(node["id"].as_i64().unwrap() > 0);
        assert_eq!(node["name"], "apollo");
        assert!(node.get("key").is_none());

        // name is unique
        let (status, error) = body(NodeCollection.post(&ctx, &request).await);
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error["code"], "409");
    }

    #[tokio::test]
    async fn create_node_rejects_bad_body_test() {
        let (ctx, _) = setup().await;

        let request = Request::new(Method::POST, "/nodes").with_body("not json");
        let (status, error) = body(NodeCollection.post(&ctx, &request).await);
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error["code"], "422");
        assert!(error["reason"].is_string());

        let request = Request::new(Method::POST, "/nodes").with_body(r#"{"name": "  "}"#);
        let (status, _) = body(NodeCollection.post(&ctx, &request).await);
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn list_nodes_newest_first_test() {
        let (ctx, store) = setup().await;
        for name in ["apollo", "artemis", "athena"] {
            store.save_node(&mut Node::new(name)).await.unwrap();
        }
        let mut apollo = store.get_node_by_name("apollo").await.unwrap().unwrap();
        store.save_node(&mut apollo).await.unwrap();

        let (status, nodes) = body(NodeCollection.get(&ctx, &Request::new(Method::GET, "/nodes")).await);
        assert_eq!(status, StatusCode::OK);
        let nodes = nodes.as_array().unwrap().clone();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0]["name"], "apollo");

        let ctx = Context {
            store: store.clone(),
            page_size: 2,
        };
        let (_, nodes) = body(NodeCollection.get(&ctx, &Request::new(Method::GET, "/nodes")).await);
        assert_eq!(nodes.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn node_detail_test() {
        let (ctx, store) = setup().await;
        let mut node = Node::new("apollo");
        store.save_node(&mut node).await.unwrap();

        let (status, found) = body(
            NodeDetail
                .get(&ctx, &with_id(Method::GET, "/nodes/1", &node.id.to_string()))
                .await,
        );
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found["name"], "apollo");

        let (status, error) = body(NodeDetail.get(&ctx, &with_id(Method::GET, "/nodes/9999", "9999")).await);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error["code"], "404");

        let (status, _) = body(NodeDetail.get(&ctx, &with_id(Method::GET, "/nodes/abc", "abc")).await);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn update_node_test() {
        let (ctx, store) = setup().await;
        let mut node = Node::new("apollo");
        node.address = Some(String::from("108.51.64.223"));
        store.save_node(&mut node).await.unwrap();

        let request = with_id(Method::PUT, "/nodes/1", &node.id.to_string())
            .with_body(r#"{"dns": "apollo.example.com", "unknown": true}"#);
        let (status, updated) = body(NodeDetail.put(&ctx, &request).await);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["dns"], "apollo.example.com");
        assert_eq!(updated["address"], "108.51.64.223");

        let request = with_id(Method::PUT, "/nodes/1", &node.id.to_string())
            .with_body(r#"{"name": 42}"#);
        let (status, _) = body(NodeDetail.put(&ctx, &request).await);
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let request = with_id(Method::PUT, "/nodes/9999", "9999").with_body("{}");
        let (status, _) = body(NodeDetail.put(&ctx, &request).await);
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_node_twice_test() {
        let (ctx, store) = setup().await;
        let mut node = Node::new("apollo");
        store.save_node(&mut node).await.unwrap();
        let request = with_id(Method::DELETE, "/nodes/1", &node.id.to_string());

        let (status, value) = body(NodeDetail.delete(&ctx, &request).await);
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(value, Value::Null);

        let (status, _) = body(NodeDetail.delete(&ctx, &request).await);
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ping_lifecycle_test() {
        let (ctx, store) = setup().await;
        let mut source = Node::new("apollo");
        let mut target = Node::new("artemis");
        store.save_node(&mut source).await.unwrap();
        store.save_node(&mut target).await.unwrap();

        let request = Request::new(Method::POST, "/pings").with_body(format!(
            r#"{{"source": {}, "target": {}, "payload": 64, "latency": 12.5}}"#,
            source.id, target.id
        ));
        let (status, ping) = body(PingCollection.post(&ctx, &request).await);
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(ping["payload"], 64);
        assert_eq!(ping["timeout"], false);
        let id = ping["id"].as_i64().unwrap().to_string();

        let request = with_id(Method::PUT, "/pings/1", &id).with_body(r#"{"latency": -1.0}"#);
        let (status, error) = body(PingDetail.put(&ctx, &request).await);
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error["reason"], "invalid ping");

        let request = with_id(Method::PUT, "/pings/1", &id)
            .with_body(r#"{"latency": -1.0, "timeout": true}"#);
        let (status, ping) = body(PingDetail.put(&ctx, &request).await);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ping["timeout"], true);

        let (status, pings) = body(PingCollection.get(&ctx, &Request::new(Method::GET, "/pings")).await);
        assert_eq!(status, StatusCode::OK);
        assert_eq!(pings.as_array().unwrap().len(), 1);

        let request = with_id(Method::DELETE, "/pings/1", &id);
        let (status, _) = body(PingDetail.delete(&ctx, &request).await);
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = body(PingDetail.get(&ctx, &request).await);
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ping_rejects_negative_latency_test() {
        let (ctx, _) = setup().await;
        let request = Request::new(Method::POST, "/pings")
            .with_body(r#"{"source": 1, "target": 2, "latency": -3.0}"#);
        let (status, _) = body(PingCollection.post(&ctx, &request).await);
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
