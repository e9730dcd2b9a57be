//! Chat webhook server.
//!
//! The chat platform's own message formatting stays on the platform side;
//! this server only maps its interaction callbacks onto session actions and
//! returns the resulting state as JSON.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use routes::build_router;
pub use state::AppState;

use tokio::net::TcpListener;

/// Serve `state` on `address` until Ctrl+C
///
/// # Errors
///
/// Fails if the address cannot be bound or the server stops on an I/O error.
pub async fn serve(address: &str, state: AppState) -> anyhow::Result<()> {
    let app = state.app.clone();
    let listener = TcpListener::bind(address).await?;
    tracing::info!(address = %listener.local_addr()?, "Webhook server listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!(%error, "Cannot listen for Ctrl+C");
            }
            tracing::info!("Shutting down gracefully...");
            app.shutdown();
        })
        .await?;
    Ok(())
}
