use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, Stream, StreamExt};
use tracing::{event, Level};
use warp::filters::path::FullPath;
use warp::http::header::CONTENT_LENGTH;
use warp::http::{HeaderMap, Method, StatusCode};
use warp::{Buf, Filter, Reply};

use super::routes::Router;
use super::{Request, Response};
use crate::error::ApiError;

/// The single filter the server mounts. It accepts every method and path,
/// reads the body up to `body_limit` bytes and hands the request to the
/// router.
pub fn api_filter(
    router: Arc<Router>,
    body_limit: usize,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    warp::method()
        .and(warp::path::full())
        .and(
            warp::query::raw()
                .map(Some)
                .or(warp::any().map(|| None))
                .unify(),
        )
        .and(warp::header::headers_cloned())
        .and(warp::body::stream())
        .and(with_router(router))
        .and(warp::any().map(move || body_limit))
        .and_then(api_handler)
}

/// inject the router
fn with_router(
    router: Arc<Router>,
) -> impl Filter<Extract = (Arc<Router>,), Error = Infallible> + Clone {
    warp::any().map(move || router.clone())
}

async fn api_handler<S, B>(
    method: Method,
    path: FullPath,
    query: Option<String>,
    headers: HeaderMap,
    body: S,
    router: Arc<Router>,
    body_limit: usize,
) -> Result<impl Reply, Infallible>
where
    S: Stream<Item = Result<B, warp::Error>> + Send,
    B: Buf,
{
    let body = match read_body(&headers, body, body_limit).await {
        Ok(body) => body,
        Err(err) => {
            event!(Level::WARN, "{} {}: {}", method, path.as_str(), err);
            return Ok(Response::error(err.status(), &err.to_string()).into_http());
        }
    };

    let mut request = Request::new(method, path.as_str());
    request.query = query;
    request.headers = headers;
    request.body = body;

    let response = match AssertUnwindSafe(router.handle(request)).catch_unwind().await {
        Ok(response) => response,
        Err(_) => {
            event!(Level::ERROR, "request handler panicked");
            Response::error(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
        }
    };
    Ok(response.into_http())
}

/// Collect the body, refusing anything over `limit` bytes.
async fn read_body<S, B>(headers: &HeaderMap, body: S, limit: usize) -> Result<Vec<u8>, ApiError>
where
    S: Stream<Item = Result<B, warp::Error>>,
    B: Buf,
{
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());
    if matches!(declared, Some(length) if length > limit) {
        return Err(ApiError::PayloadTooLarge { limit });
    }

    futures::pin_mut!(body);
    let mut buffer = vec![];
    while let Some(chunk) = body.next().await {
        let mut chunk = chunk.map_err(|err| ApiError::Internal(err.to_string()))?;
        while chunk.has_remaining() {
            let bytes = chunk.chunk();
            if buffer.len() + bytes.len() > limit {
                return Err(ApiError::PayloadTooLarge { limit });
            }
            buffer.extend_from_slice(bytes);
            let cnt = bytes.len();
            chunk.advance(cnt);
        }
    }
    Ok(buffer)
}
