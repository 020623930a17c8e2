pub mod client;
pub mod error;
pub mod history;
pub mod retry;
pub mod sanitize;

use std::fmt;
use std::str::FromStr;

use tracing::{error, info, warn};

use crate::client::{ChatCompletionRequest, CompletionClient};
use crate::error::{AssistantError, FailureKind};
use crate::history::{ChatTurn, Role, enforce_alternation, most_recent};
use crate::retry::{RetryPolicy, retry_with_timeout};
use crate::sanitize::strip_citations;

pub use crate::history::format_history;

pub const SYSTEM_PROMPT: &str = "You are a helpful AI assistant in a chat application. Provide helpful, friendly, and conversational responses. Keep responses concise but informative.";

/// Apology stored in the room when the reply pipeline itself breaks
/// (database failures around the completion call).
pub const REPLY_FAILED_MESSAGE: &str = "I'm sorry, I'm having trouble responding right now. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    #[default]
    OpenAi,
    /// Search-backed provider: replies carry citation markers and the API
    /// rejects conversations whose roles do not alternate.
    Perplexity,
}

impl Provider {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::Perplexity => "Perplexity",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Perplexity => "https://api.perplexity.ai",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-3.5-turbo",
            Self::Perplexity => "sonar",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OpenAi => "openai",
            Self::Perplexity => "perplexity",
        })
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "perplexity" => Ok(Self::Perplexity),
            other => Err(format!("unknown AI provider '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub provider: Provider,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// How many prior messages are sent along with the new one.
    pub history_limit: usize,
    pub retry: RetryPolicy,
}

impl AssistantConfig {
    pub fn new(provider: Provider, api_key: Option<String>) -> Self {
        Self {
            provider,
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            base_url: provider.default_base_url().to_string(),
            model: provider.default_model().to_string(),
            max_tokens: 500,
            temperature: 0.7,
            history_limit: 10,
            retry: RetryPolicy::default(),
        }
    }
}

/// Produces assistant replies. Never fails outward: every error is turned
/// into an apology the chat can display.
pub struct Assistant {
    config: AssistantConfig,
    client: Option<CompletionClient>,
}

impl Assistant {
    pub fn new(config: AssistantConfig) -> Result<Self, AssistantError> {
        let client = match &config.api_key {
            Some(key) => Some(CompletionClient::new(key, &config.base_url)?),
            None => {
                warn!("{} API key not set, assistant replies will be apologies", config.provider.display_name());
                None
            }
        };
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }

    /// System prompt, shaped history, then the new user message.
    pub fn build_messages(&self, user_message: &str, history: Vec<ChatTurn>) -> Vec<ChatTurn> {
        let mut history = most_recent(history, self.config.history_limit);
        if self.config.provider == Provider::Perplexity {
            history = enforce_alternation(history);
        }

        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatTurn::new(Role::System, SYSTEM_PROMPT));
        messages.extend(history);
        messages.push(ChatTurn::new(Role::User, user_message));
        messages
    }

    pub async fn generate_reply(&self, user_message: &str, history: Vec<ChatTurn>) -> String {
        match self.try_generate_reply(user_message, history).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Error generating AI response: {}", e);
                fallback_reply(self.config.provider, &e)
            }
        }
    }

    pub async fn try_generate_reply(
        &self,
        user_message: &str,
        history: Vec<ChatTurn>,
    ) -> Result<String, AssistantError> {
        let client = self.client.as_ref().ok_or(AssistantError::MissingApiKey {
            provider: self.config.provider.display_name(),
        })?;

        let messages = self.build_messages(user_message, history);
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages: &messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        info!("Sending request to {} with {} messages", self.config.provider.display_name(), messages.len());
        let raw = retry_with_timeout(&self.config.retry, |_| client.complete(&request)).await?;

        let reply = match self.config.provider {
            Provider::Perplexity => strip_citations(&raw),
            Provider::OpenAi => raw.trim().to_string(),
        };
        if reply.is_empty() {
            return Err(AssistantError::EmptyResponse);
        }
        Ok(reply)
    }
}

/// The apology shown in place of a reply, chosen by failure kind.
pub fn fallback_reply(provider: Provider, err: &AssistantError) -> String {
    let name = provider.display_name();
    let kind = match (provider, err.kind()) {
        // Perplexity answers 429 for exhausted credits as well as bursts.
        (Provider::Perplexity, FailureKind::RateLimited) => FailureKind::Quota,
        (_, kind) => kind,
    };
    match kind {
        FailureKind::NotConfigured => format!(
            "I'm sorry, but I'm not properly configured to respond right now. Please check the {} API key configuration.",
            name
        ),
        FailureKind::Timeout => {
            "I'm sorry, the request took too long. Please try again with a shorter message.".to_string()
        }
        FailureKind::Quota => format!(
            "I'm sorry, but there seems to be an issue with the {} account. Please check your billing and usage limits.",
            name
        ),
        FailureKind::RateLimited => {
            "I'm receiving too many requests right now. Please wait a moment and try again.".to_string()
        }
        FailureKind::BadRequest => {
            "I'm sorry, there was an issue with the message format. Please try rephrasing your message.".to_string()
        }
        FailureKind::Other => {
            "I'm sorry, I'm having trouble responding right now. Please try again in a moment.".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assistant(provider: Provider) -> Assistant {
        Assistant::new(AssistantConfig::new(provider, None)).unwrap()
    }

    #[test]
    fn provider_names_parse() {
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!(" perplexity ".parse::<Provider>().unwrap(), Provider::Perplexity);
        assert!("claude".parse::<Provider>().is_err());
        assert_eq!(Provider::Perplexity.to_string(), "perplexity");
    }

    #[test]
    fn blank_key_counts_as_missing() {
        let config = AssistantConfig::new(Provider::OpenAi, Some("  ".into()));
        assert!(config.api_key.is_none());
        assert!(!Assistant::new(config).unwrap().is_configured());
    }

    #[test]
    fn messages_wrap_history_with_prompt_and_question() {
        let history: Vec<ChatTurn> = (0..12)
            .map(|i| {
                let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
                ChatTurn::new(role, format!("turn {}", i))
            })
            .collect();

        let messages = assistant(Provider::OpenAi).build_messages("new question", history);

        assert_eq!(messages.len(), 12);
        assert_eq!(messages[0], ChatTurn::new(Role::System, SYSTEM_PROMPT));
        assert_eq!(messages[1].content, "turn 2");
        assert_eq!(messages.last().unwrap(), &ChatTurn::new(Role::User, "new question"));
    }

    #[test]
    fn perplexity_history_alternates() {
        let history = vec![
            ChatTurn::new(Role::User, "a"),
            ChatTurn::new(Role::Assistant, "b"),
            ChatTurn::new(Role::User, "c"),
        ];

        let messages = assistant(Provider::Perplexity).build_messages("d", history);
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(messages[3].content, "d");
    }

    #[tokio::test]
    async fn unconfigured_assistant_apologises() {
        let reply = assistant(Provider::Perplexity).generate_reply("hello", Vec::new()).await;
        assert_eq!(
            reply,
            "I'm sorry, but I'm not properly configured to respond right now. Please check the Perplexity API key configuration."
        );
    }

    #[test]
    fn fallbacks_by_kind() {
        let timeout = AssistantError::Timeout(std::time::Duration::from_secs(20));
        assert!(fallback_reply(Provider::OpenAi, &timeout).contains("took too long"));

        let quota = AssistantError::Status {
            status: 402,
            body: String::new(),
        };
        assert!(fallback_reply(Provider::OpenAi, &quota).contains("OpenAI account"));

        let too_many = AssistantError::Status {
            status: 429,
            body: "slow down".into(),
        };
        assert!(fallback_reply(Provider::OpenAi, &too_many).contains("too many requests"));
        assert!(fallback_reply(Provider::Perplexity, &too_many).contains("Perplexity account"));

        assert_eq!(
            fallback_reply(Provider::OpenAi, &AssistantError::EmptyResponse),
            "I'm sorry, I'm having trouble responding right now. Please try again in a moment."
        );
    }
}
