use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

use crate::modal::SupersedePolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} should be set")]
    Missing(&'static str),
    #[error("{key} can't be parsed: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Webhook {
    pub url: Url,
    pub addr: SocketAddr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub teloxide_token: String,
    pub database_url: Option<String>,
    pub log_level: String,
    pub webhook: Option<Webhook>,
    pub auth_auto_verify: bool,
    pub supersede: SupersedePolicy,
    /// Chat sessions untouched for this long are closed, signing their user out.
    pub session_idle: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let teloxide_token = get("TELOXIDE_TOKEN").ok_or(ConfigError::Missing("TELOXIDE_TOKEN"))?;

        let url = get("NGROK_URL")
            .map(|raw| {
                raw.parse::<Url>().map_err(|err| ConfigError::Invalid {
                    key: "NGROK_URL",
                    reason: err.to_string(),
                })
            })
            .transpose()?;
        let addr = get("NGROK_ADDR")
            .map(|raw| {
                raw.parse::<SocketAddr>().map_err(|err| ConfigError::Invalid {
                    key: "NGROK_ADDR",
                    reason: err.to_string(),
                })
            })
            .transpose()?;
        let webhook = match (url, addr) {
            (Some(url), Some(addr)) => Some(Webhook { url, addr }),
            _ => None,
        };

        let auth_auto_verify = match get("AUTH_AUTO_VERIFY") {
            None => true,
            Some(raw) => raw.trim().parse::<bool>().map_err(|err| ConfigError::Invalid {
                key: "AUTH_AUTO_VERIFY",
                reason: err.to_string(),
            })?,
        };

        let supersede = match get("MODAL_SUPERSEDE").as_deref().map(str::trim) {
            None | Some("reject") => SupersedePolicy::Reject,
            Some("abandon") => SupersedePolicy::Abandon,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "MODAL_SUPERSEDE",
                    reason: format!("expected 'reject' or 'abandon', got '{other}'"),
                })
            }
        };

        let session_idle = match get("SESSION_IDLE_SECS") {
            None => Duration::from_secs(60 * 60),
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|err| ConfigError::Invalid {
                    key: "SESSION_IDLE_SECS",
                    reason: err.to_string(),
                })?,
        };

        Ok(Self {
            teloxide_token,
            database_url: get("DATABASE_URL"),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "error".into()),
            webhook,
            auth_auto_verify,
            supersede,
            session_idle,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn token_is_required() {
        assert!(matches!(config(&[]), Err(ConfigError::Missing("TELOXIDE_TOKEN"))));
    }

    #[test]
    fn defaults_apply() {
        let config = config(&[("TELOXIDE_TOKEN", "t")]).unwrap();
        assert_eq!(config.log_level, "error");
        assert_eq!(config.database_url, None);
        assert_eq!(config.webhook, None);
        assert!(config.auth_auto_verify);
        assert_eq!(config.session_idle, Duration::from_secs(3600));
        assert_eq!(config.supersede, SupersedePolicy::Reject);
    }

    #[test]
    fn webhook_needs_url_and_addr() {
        let partial = config(&[("TELOXIDE_TOKEN", "t"), ("NGROK_URL", "https://quiz.ngrok.io")]).unwrap();
        assert_eq!(partial.webhook, None);

        let full = config(&[
            ("TELOXIDE_TOKEN", "t"),
            ("NGROK_URL", "https://quiz.ngrok.io"),
            ("NGROK_ADDR", "127.0.0.1:8443"),
        ])
        .unwrap();
        assert_eq!(full.webhook.unwrap().addr.port(), 8443);
    }

    #[test]
    fn bad_values_are_reported() {
        assert!(matches!(
            config(&[("TELOXIDE_TOKEN", "t"), ("NGROK_ADDR", "nowhere")]),
            Err(ConfigError::Invalid { key: "NGROK_ADDR", .. })
        ));
        assert!(matches!(
            config(&[("TELOXIDE_TOKEN", "t"), ("MODAL_SUPERSEDE", "later")]),
            Err(ConfigError::Invalid { key: "MODAL_SUPERSEDE", .. })
        ));
        let abandon = config(&[("TELOXIDE_TOKEN", "t"), ("MODAL_SUPERSEDE", "abandon")]).unwrap();
        assert_eq!(abandon.supersede, SupersedePolicy::Abandon);
    }
}
