//! `helpbot doctor`: Diagnose configuration and connectivity.

use std::path::Path;

use helpbot_channels::{SlackChannel, SlackConfig};
use helpbot_config::AppConfig;
use helpbot_core::Channel;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 helpbot doctor");
    println!("=================\n");

    let mut issues = 0;

    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"));
    if path.exists() {
        println!("  ✅ Config file found at {}", path.display());
    } else {
        println!("  ⚠️  No config file at {} (using defaults + environment)", path.display());
    }

    let config = match super::load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Configuration invalid: {e}");
            println!("\n  ⚠️  1 issue(s) found. See above for details.");
            return Ok(());
        }
    };

    println!(
        "  ℹ️  Model {} via {}, top_k {}, prompt policy {:?}",
        config.completion.model,
        config.completion.provider,
        config.retrieval.top_k,
        config.prompt.policy
    );

    let missing = config.missing_for_slack();
    if missing.is_empty() {
        println!("  ✅ All credentials present");
    } else {
        for name in &missing {
            println!("  ⚠️  {name} is not set");
        }
        issues += missing.len();
    }

    // Completion provider
    let provider = helpbot_providers::build_from_config(&config);
    match provider.health_check().await {
        Ok(true) => println!("  ✅ Completion provider reachable ({})", provider.name()),
        Ok(false) => {
            println!("  ❌ Completion provider rejected the request ({})", provider.name());
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Completion provider unreachable: {e}");
            issues += 1;
        }
    }

    // Vector index
    match super::build_search(&config) {
        Ok(_) => println!("  ✅ Pinecone index configured"),
        Err(e) => {
            println!("  ❌ Pinecone index: {e}");
            issues += 1;
        }
    }

    // Slack
    if let Some(bot_token) = &config.slack.bot_token {
        let channel = SlackChannel::new(SlackConfig::new(
            bot_token.clone(),
            config.slack.app_token.clone().unwrap_or_default(),
        ));
        match channel.health_check().await {
            Ok(true) => println!("  ✅ Slack bot token accepted"),
            Ok(false) => {
                println!("  ❌ Slack rejected the bot token");
                issues += 1;
            }
            Err(e) => {
                println!("  ❌ Slack unreachable: {e}");
                issues += 1;
            }
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
