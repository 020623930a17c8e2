use std::sync::Arc;

use tokio_util::task::TaskTracker;
use tracing::error;

use parlor_assistant::Assistant;
use parlor_db::Database;
use parlor_gateway::dispatcher::Dispatcher;
use parlor_types::api::EnvironmentStatus;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub dispatcher: Dispatcher,
    pub assistant: Assistant,
    pub env: EnvironmentStatus,
    /// Background assistant replies still in flight. The server waits on
    /// this during shutdown.
    pub replies: TaskTracker,
}

/// Runs a blocking database call off the async runtime.
pub async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}
