use std::future::Future;
use std::sync::Arc;

use tracing::{event, Level};

use crate::auth::Authenticator;
use crate::config::Settings;
use crate::db::SqliteStore;
use crate::http::filters::api_filter;
use crate::http::routes::{routes, Router};
use crate::http::Context;

/// Wire the route table to `store` with the given settings.
pub fn build_router(store: Arc<SqliteStore>, settings: &Settings) -> Router {
    let ctx = Arc::new(Context {
        store: store.clone(),
        page_size: settings.api.page_size,
    });
    let authenticator = Arc::new(Authenticator::new(store, settings.skew()));
    Router::new(routes(), ctx, authenticator)
}

/// Run the Scribo server until `shutdown` completes. In flight requests are
/// allowed to finish.
pub async fn run(settings: Settings, shutdown: impl Future + Send + 'static) -> crate::Result<()> {
    let store = SqliteStore::connect(&settings.database.url, settings.database.max_connections).await?;
    store.migrate().await?;
    let store = Arc::new(store);

    let router = Arc::new(build_router(store, &settings));
    event!(Level::DEBUG, "{:?}", router.route_names());

    let api = api_filter(router, settings.api.body_limit);
    let (addr, server) = warp::serve(api).try_bind_with_graceful_shutdown(
        settings.bind_addr(),
        async move {
            shutdown.await;
            event!(Level::INFO, "shutting down");
        },
    )?;

    event!(Level::INFO, "scribo {} listening on {}", crate::VERSION, addr);
    server.await;
    Ok(())
}
