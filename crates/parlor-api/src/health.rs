use axum::{Json, extract::State, response::IntoResponse};
use serde_json::json;

use crate::state::AppState;

fn presence(set: bool, optional: bool) -> &'static str {
    match (set, optional) {
        (true, _) => "SET",
        (false, false) => "MISSING",
        (false, true) => "NOT SET (optional)",
    }
}

/// Reports which configuration variables are present. Never echoes values.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let env = &state.env;
    let (status, message) = if env.all_required_set() {
        ("healthy", "All required environment variables are set")
    } else {
        ("unhealthy", "Some required environment variables are missing")
    };

    Json(json!({
        "status": status,
        "message": message,
        "environment": env,
        "required": {
            "PARLOR_DATABASE_URL": presence(env.has_database_url, false),
        },
        "optional": {
            "OPENAI_API_KEY": presence(env.has_openai_key, true),
            "PERPLEXITY_API_KEY": presence(env.has_perplexity_key, true),
            "PARLOR_AUTH_SECRET": presence(env.has_auth_secret, true),
        },
        "assistantConfigured": state.assistant.is_configured(),
        "realtimeConnections": state.dispatcher.connection_count(),
    }))
}
