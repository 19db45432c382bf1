//! `helpbot slack`: Answer mentions over Slack Socket Mode.

use std::path::Path;
use std::sync::Arc;

use helpbot_agent::{DedupDispatcher, FailurePolicy, HandledMessageRegistry};
use helpbot_channels::{SlackChannel, SlackConfig};
use helpbot_config::ConfigError;
use helpbot_core::Channel;
use tracing::{error, info};

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;

    let missing = config.missing_for_slack();
    if !missing.is_empty() {
        return Err(ConfigError::Missing(missing).into());
    }

    let answerer = super::build_answerer(&config)?;
    let channel = Arc::new(SlackChannel::new(SlackConfig::new(
        config.slack.bot_token.clone().unwrap_or_default(),
        config.slack.app_token.clone().unwrap_or_default(),
    )));

    let dispatcher = Arc::new(
        DedupDispatcher::new(
            answerer,
            channel.clone(),
            Arc::new(HandledMessageRegistry::new()),
        )
        .with_failure_policy(FailurePolicy::from_config(&config.dispatcher))
        .with_max_in_flight(config.dispatcher.max_in_flight),
    );

    let events = channel.start().await?;
    info!("helpbot is listening for mentions (Ctrl+C to stop)");

    let result = tokio::select! {
        result = dispatcher.run(events) => result.map(|_| ()),
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
            Ok(())
        }
    };

    channel.stop().await?;
    if let Err(e) = &result {
        error!(error = %e, "Slack channel failed");
    }
    Ok(result?)
}
