//! Chat front-ends for helpbot.
//!
//! - [`slack`]: Slack Socket Mode channel implementing `helpbot_core::Channel`
//! - [`terminal`]: interactive question/answer loop over any async reader and writer

pub mod slack;
pub mod terminal;

pub use slack::{SlackChannel, SlackConfig};
pub use terminal::{run_interactive, SessionStats, FOLLOW_UP, GREETING};
