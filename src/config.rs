//! Configuration types.
//!
//! Everything is read from environment variables at startup. `from_lookup`
//! takes any key → value function so tests never touch the process env.

use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;

use crate::channels::dispatcher::DEFAULT_MAX_CHUNK;
use crate::channels::whatsapp::DEFAULT_API_VERSION;
use crate::error::ConfigError;
use crate::llm::{LlmBackend, LlmConfig};
use crate::session::machine::{DEFAULT_TRIGGER_PHRASE, MachineSettings};
use crate::session::model::DEFAULT_WORD_LIMIT;
use crate::session::Locale;

/// WhatsApp Cloud API credentials.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    pub access_token: SecretString,
    pub phone_number_id: String,
    pub api_version: String,
}

/// Full bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Token Meta echoes during webhook verification.
    pub verify_token: String,
    pub whatsapp: WhatsAppConfig,
    pub llm: LlmConfig,
    /// Max tokens per draft request.
    pub max_tokens: u32,
    /// Base URL of the call-to-action link.
    pub site_url: String,
    /// Query string appended to `site_url` (without the leading `?`).
    pub cta_utm: String,
    pub db_path: PathBuf,
    pub port: u16,
    pub locale: Locale,
    pub max_chunk: usize,
    /// Word limit for newly created sessions.
    pub word_limit: u32,
    pub trigger_phrase: String,
    /// Directory for daily-rolling log files; stderr only when unset.
    pub log_dir: Option<PathBuf>,
}

impl BotConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require =
            |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()));

        let backend: LlmBackend = parse_or(&get, "ESSAY_BOT_LLM_BACKEND", LlmBackend::OpenAi)?;
        let api_key = require(backend.api_key_var())?;
        let model = get("ESSAY_BOT_MODEL").unwrap_or_else(|| backend.default_model().to_string());

        let max_chunk: usize = parse_or(&get, "ESSAY_BOT_MAX_CHUNK", DEFAULT_MAX_CHUNK)?;
        if max_chunk == 0 {
            return Err(invalid("ESSAY_BOT_MAX_CHUNK", "must be greater than zero"));
        }
        let word_limit: u32 = parse_or(&get, "ESSAY_BOT_WORD_LIMIT", DEFAULT_WORD_LIMIT)?;
        if word_limit == 0 {
            return Err(invalid("ESSAY_BOT_WORD_LIMIT", "must be greater than zero"));
        }

        Ok(Self {
            verify_token: require("META_VERIFY_TOKEN")?,
            whatsapp: WhatsAppConfig {
                access_token: SecretString::from(require("META_ACCESS_TOKEN")?),
                phone_number_id: require("META_PHONE_NUMBER_ID")?,
                api_version: get("WHATSAPP_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            },
            llm: LlmConfig {
                backend,
                api_key: SecretString::from(api_key),
                model,
            },
            max_tokens: parse_or(&get, "ESSAY_BOT_MAX_TOKENS", 2048)?,
            site_url: require("PUBLIC_SITE_URL")?,
            cta_utm: get("CTA_UTM")
                .map(|u| u.trim_start_matches('?').to_string())
                .unwrap_or_default(),
            db_path: get("ESSAY_BOT_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/essay-bot.db")),
            port: parse_or(&get, "ESSAY_BOT_PORT", 8080)?,
            locale: parse_or(&get, "ESSAY_BOT_LOCALE", Locale::English)?,
            max_chunk,
            word_limit,
            trigger_phrase: get("ESSAY_BOT_TRIGGER")
                .unwrap_or_else(|| DEFAULT_TRIGGER_PHRASE.to_string()),
            log_dir: get("ESSAY_BOT_LOG_DIR").map(PathBuf::from),
        })
    }

    /// The call-to-action link: `site_url`, plus `?cta_utm` when set.
    pub fn cta_url(&self) -> String {
        if self.cta_utm.is_empty() {
            self.site_url.clone()
        } else {
            format!("{}?{}", self.site_url, self.cta_utm)
        }
    }

    /// Conversation settings derived from this configuration.
    pub fn machine_settings(&self) -> MachineSettings {
        MachineSettings {
            locale: self.locale,
            trigger_phrase: self.trigger_phrase.clone(),
            cta_url: self.cta_url(),
        }
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}

/// Parse `key` if set, else return `default`.
fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| invalid(key, format!("'{raw}': {e}"))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("META_VERIFY_TOKEN", "verify-me"),
            ("META_ACCESS_TOKEN", "EAAG-token"),
            ("META_PHONE_NUMBER_ID", "1234567890"),
            ("PUBLIC_SITE_URL", "https://essays.example.com"),
            ("OPENAI_API_KEY", "sk-test"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> Result<BotConfig, ConfigError> {
        BotConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_apply_when_optional_vars_unset() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.verify_token, "verify-me");
        assert_eq!(config.whatsapp.access_token.expose_secret(), "EAAG-token");
        assert_eq!(config.whatsapp.api_version, "v17.0");
        assert_eq!(config.llm.backend, LlmBackend::OpenAi);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.max_tokens, 2048);
        assert_eq!(config.port, 8080);
        assert_eq!(config.locale, Locale::English);
        assert_eq!(config.max_chunk, 3500);
        assert_eq!(config.word_limit, 600);
        assert_eq!(config.trigger_phrase, "prompt now");
        assert_eq!(config.db_path, PathBuf::from("./data/essay-bot.db"));
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn missing_required_var_is_reported_by_name() {
        let mut env = base_env();
        env.remove("META_VERIFY_TOKEN");
        match load(&env) {
            Err(ConfigError::MissingEnvVar(key)) => assert_eq!(key, "META_VERIFY_TOKEN"),
            other => panic!("expected MissingEnvVar, got {other:?}"),
        }
    }

    #[test]
    fn blank_required_var_counts_as_missing() {
        let mut env = base_env();
        env.insert("PUBLIC_SITE_URL", "   ");
        assert!(matches!(load(&env), Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn anthropic_backend_needs_its_own_key() {
        let mut env = base_env();
        env.insert("ESSAY_BOT_LLM_BACKEND", "anthropic");
        match load(&env) {
            Err(ConfigError::MissingEnvVar(key)) => assert_eq!(key, "ANTHROPIC_API_KEY"),
            other => panic!("expected MissingEnvVar, got {other:?}"),
        }

        env.insert("ANTHROPIC_API_KEY", "sk-ant-test");
        let config = load(&env).unwrap();
        assert_eq!(config.llm.backend, LlmBackend::Anthropic);
        assert_eq!(config.llm.model, "claude-sonnet-4-20250514");
    }

    #[test]
    fn invalid_numbers_and_enums_are_rejected() {
        for (key, value) in [
            ("ESSAY_BOT_PORT", "eighty"),
            ("ESSAY_BOT_MAX_CHUNK", "0"),
            ("ESSAY_BOT_WORD_LIMIT", "-5"),
            ("ESSAY_BOT_LOCALE", "fr"),
            ("ESSAY_BOT_LLM_BACKEND", "mistral"),
        ] {
            let mut env = base_env();
            env.insert(key, value);
            match load(&env) {
                Err(ConfigError::InvalidValue { key: k, .. }) => assert_eq!(k, key),
                other => panic!("{key}={value}: expected InvalidValue, got {other:?}"),
            }
        }
    }

    #[test]
    fn cta_url_appends_utm_when_set() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.cta_url(), "https://essays.example.com");

        let mut env = base_env();
        env.insert("CTA_UTM", "?utm_source=whatsapp&utm_medium=bot");
        let config = load(&env).unwrap();
        assert_eq!(
            config.cta_url(),
            "https://essays.example.com?utm_source=whatsapp&utm_medium=bot"
        );
        assert_eq!(config.machine_settings().cta_url, config.cta_url());
    }

    #[test]
    fn overrides_are_honored() {
        let mut env = base_env();
        env.insert("ESSAY_BOT_LOCALE", "he");
        env.insert("ESSAY_BOT_MAX_CHUNK", "1000");
        env.insert("ESSAY_BOT_TRIGGER", "draft now");
        env.insert("ESSAY_BOT_LOG_DIR", "/var/log/essay-bot");
        let config = load(&env).unwrap();
        assert_eq!(config.locale, Locale::Hebrew);
        assert_eq!(config.max_chunk, 1000);
        assert_eq!(config.machine_settings().trigger_phrase, "draft now");
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/essay-bot")));
    }
}
