use std::path::PathBuf;

use anyhow::Context;

use parlor_assistant::{AssistantConfig, Provider};
use parlor_types::api::EnvironmentStatus;

/// Server settings read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    /// Whether `PARLOR_DATABASE_URL` was set explicitly.
    pub database_url_set: bool,
    pub provider: Provider,
    pub openai_key: Option<String>,
    pub perplexity_key: Option<String>,
    pub ai_base_url: Option<String>,
    pub ai_model: Option<String>,
    pub auth_secret_set: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PARLOR_PORT") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("PARLOR_PORT is not a valid port: {}", raw))?,
            None => 3000,
        };

        let provider = match get("PARLOR_AI_PROVIDER") {
            Some(raw) => raw.parse::<Provider>().map_err(anyhow::Error::msg)?,
            None => Provider::default(),
        };

        let database_url = get("PARLOR_DATABASE_URL");

        Ok(Self {
            host: get("PARLOR_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            database_url_set: database_url.is_some(),
            db_path: PathBuf::from(database_url.unwrap_or_else(|| "parlor.db".into())),
            provider,
            openai_key: get("OPENAI_API_KEY"),
            perplexity_key: get("PERPLEXITY_API_KEY"),
            ai_base_url: get("PARLOR_AI_BASE_URL"),
            ai_model: get("PARLOR_AI_MODEL"),
            auth_secret_set: get("PARLOR_AUTH_SECRET").is_some(),
        })
    }

    /// Assistant settings for the selected provider, with overrides applied.
    pub fn assistant(&self) -> AssistantConfig {
        let key = match self.provider {
            Provider::OpenAi => self.openai_key.clone(),
            Provider::Perplexity => self.perplexity_key.clone(),
        };
        let mut config = AssistantConfig::new(self.provider, key);
        if let Some(url) = &self.ai_base_url {
            config.base_url = url.clone();
        }
        if let Some(model) = &self.ai_model {
            config.model = model.clone();
        }
        config
    }

    /// Presence flags for the health endpoint. Secrets are never included.
    pub fn environment(&self) -> EnvironmentStatus {
        let database_url_preview = if self.database_url_set {
            let path = self.db_path.to_string_lossy();
            let head: String = path.chars().take(20).collect();
            format!("{}...", head)
        } else {
            "NOT SET".into()
        };

        EnvironmentStatus {
            has_database_url: self.database_url_set,
            has_openai_key: self.openai_key.is_some(),
            has_perplexity_key: self.perplexity_key.is_some(),
            has_auth_secret: self.auth_secret_set,
            ai_provider: self.provider.to_string(),
            database_url_preview,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = config(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.db_path, PathBuf::from("parlor.db"));
        assert_eq!(config.provider, Provider::OpenAi);

        let env = config.environment();
        assert!(!env.all_required_set());
        assert_eq!(env.database_url_preview, "NOT SET");
        assert_eq!(env.ai_provider, "openai");
    }

    #[test]
    fn blank_values_are_unset() {
        let config = config(&[("OPENAI_API_KEY", "  "), ("PARLOR_PORT", "")]).unwrap();
        assert!(config.openai_key.is_none());
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn rejects_bad_port_and_provider() {
        assert!(config(&[("PARLOR_PORT", "eighty")]).is_err());
        assert!(config(&[("PARLOR_AI_PROVIDER", "clippy")]).is_err());
    }

    #[test]
    fn assistant_uses_the_selected_providers_key() {
        let config = config(&[
            ("PARLOR_AI_PROVIDER", "perplexity"),
            ("OPENAI_API_KEY", "sk-openai"),
            ("PERPLEXITY_API_KEY", "pplx-key"),
            ("PARLOR_AI_MODEL", "sonar-pro"),
        ])
        .unwrap();

        let assistant = config.assistant();
        assert_eq!(assistant.provider, Provider::Perplexity);
        assert_eq!(assistant.api_key.as_deref(), Some("pplx-key"));
        assert_eq!(assistant.model, "sonar-pro");
        assert_eq!(assistant.base_url, Provider::Perplexity.default_base_url());
    }

    #[test]
    fn database_preview_is_truncated() {
        let config = config(&[("PARLOR_DATABASE_URL", "/var/lib/parlor/data/chat.db")]).unwrap();
        let env = config.environment();
        assert!(env.all_required_set());
        assert_eq!(env.database_url_preview, "/var/lib/parlor/data...");
    }
}
