use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// Most-recent-N window for a message thread subscription.
    #[serde(default = "default_message_window")]
    pub message_window: usize,
    /// Most-recent-N window for the conversation list subscription.
    #[serde(default = "default_conversation_window")]
    pub conversation_window: usize,
    /// Cap on the live post feed.
    #[serde(default = "default_feed_limit")]
    pub feed_limit: usize,
    /// Cap on username search results.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

fn default_message_window() -> usize { 50 }
fn default_conversation_window() -> usize { 30 }
fn default_feed_limit() -> usize { 100 }
fn default_search_limit() -> usize { 20 }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            message_window: default_message_window(),
            conversation_window: default_conversation_window(),
            feed_limit: default_feed_limit(),
            search_limit: default_search_limit(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("KITH").separator("__"))
            .build()?;
        Ok(config.try_deserialize().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.message_window, 50);
        assert_eq!(cfg.feed_limit, 100);
        assert!(cfg.search_limit > 0);
    }
}
