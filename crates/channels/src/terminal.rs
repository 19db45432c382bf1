//! Interactive terminal loop.
//!
//! Reads one question per line, answers it, prints the answer and asks for
//! the next one. Errors are shown to the operator and the loop carries on.
//! End of input ends the session.

use helpbot_core::Answerer;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

pub const GREETING: &str = "Connector development help bot. What do you want to know?";
pub const FOLLOW_UP: &str = "What else can I help you with:";

/// What happened during a terminal session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub answered: usize,
    pub failed: usize,
}

/// Run the question/answer loop until `input` is exhausted.
pub async fn run_interactive<R, W>(
    answerer: &dyn Answerer,
    mut input: R,
    output: &mut W,
) -> std::io::Result<SessionStats>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut stats = SessionStats::default();
    let mut buf = Vec::new();

    output.write_all(format!("{GREETING}\n").as_bytes()).await?;
    output.flush().await?;

    loop {
        buf.clear();
        if input.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }
        // Undecodable bytes become U+FFFD instead of ending the session.
        let line = String::from_utf8_lossy(&buf);
        let query = line.trim();
        if query.is_empty() {
            continue;
        }

        debug!(len = query.len(), "Answering terminal question");
        let reply = match answerer.answer(query).await {
            Ok(answer) => {
                stats.answered += 1;
                answer
            }
            Err(e) => {
                stats.failed += 1;
                warn!(kind = e.kind(), error = %e, "Failed to answer");
                format!("Error: {e}")
            }
        };

        output
            .write_all(format!("{reply}\n\n{FOLLOW_UP}\n").as_bytes())
            .await?;
        output.flush().await?;
    }

    Ok(stats)
}
