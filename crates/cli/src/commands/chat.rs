//! `helpbot chat`: Interactive terminal session.

use std::path::Path;

use tokio::io::BufReader;
use tracing::debug;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let answerer = super::build_answerer(&config)?;

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let stats = helpbot_channels::run_interactive(answerer.as_ref(), stdin, &mut stdout).await?;

    debug!(answered = stats.answered, failed = stats.failed, "Chat session ended");
    Ok(())
}
