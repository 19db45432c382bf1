//! `helpbot ask`: Answer a single question.

use std::path::Path;

use helpbot_core::Answerer;

pub async fn run(config_path: Option<&Path>, question: String) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let answerer = super::build_answerer(&config)?;

    let answer = answerer.answer(&question).await?;
    println!("{answer}");
    Ok(())
}
