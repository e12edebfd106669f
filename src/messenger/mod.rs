//! Outbound messaging: the `Messenger` trait, the Graph API client, a dry-run
//! fallback and a recording test double.

pub mod dry_run;
pub mod graph;
pub mod recording;
pub mod traits;

pub use dry_run::DryRunMessenger;
pub use graph::GraphMessenger;
pub use recording::{RecordingMessenger, SentMessage};
pub use traits::{Messenger, MessengerError, QuickReply, UserProfile};

use std::sync::Arc;

use crate::config::MessengerConfig;

/// Graph API client when a page token is configured, otherwise a dry-run messenger.
pub fn create_messenger(config: &MessengerConfig) -> Arc<dyn Messenger> {
    if config.page_access_token.trim().is_empty() {
        tracing::warn!("No page access token configured; outbound messages are dropped");
        return Arc::new(DryRunMessenger::new());
    }
    Arc::new(GraphMessenger::from_config(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_picks_dry_run_without_a_token() {
        let config = MessengerConfig {
            page_access_token: "  ".into(),
            ..MessengerConfig::default()
        };
        assert_eq!(create_messenger(&config).name(), "dry-run");

        let config = MessengerConfig {
            page_access_token: "page-token".into(),
            ..MessengerConfig::default()
        };
        assert_eq!(create_messenger(&config).name(), "graph");
    }
}
