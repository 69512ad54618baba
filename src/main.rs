use std::{error::Error, sync::Arc};

use clap::Parser;

use mart_query::server::{
    self,
    client::{connect_pool, PgDefinitionStore},
    config::ServerOptions,
    AppState,
};
use mart_query::sql::DefinitionStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let options = ServerOptions::parse();

    init_tracing_opentelemetry::tracing_subscriber_ext::init_subscribers()?;

    let pool = connect_pool(&options).await?;
    let store: Arc<dyn DefinitionStore> = Arc::new(PgDefinitionStore::new(pool.clone()));
    let state = AppState { pool, store };

    let router = server::router(state);

    let address = format!("0.0.0.0:{}", options.port).parse()?;

    tracing::info!("Starting server on {}", address);

    axum::Server::bind(&address)
        .serve(router.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    opentelemetry::global::shutdown_tracer_provider();

    Ok(())
}
