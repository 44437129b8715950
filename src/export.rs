use crate::models::Message;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

const TURN_DELIMITER: &str = "----------------------------------------";

/// Renders a transcript: one `[timestamp] ROLE:` header per turn followed by
/// its content, turns separated by a delimiter line.
pub fn format_transcript(messages: &[Message]) -> String {
    let turns: Vec<String> = messages
        .iter()
        .map(|msg| {
            format!(
                "[{}] {}:\n{}",
                msg.timestamp.format("%Y-%m-%d %H:%M:%S"),
                msg.role.heading(),
                msg.content
            )
        })
        .collect();
    let mut transcript = turns.join(&format!("\n{}\n", TURN_DELIMITER));
    transcript.push('\n');
    transcript
}

/// Export filename carrying the moment of export.
pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("vehi-chat-{}.txt", now.format("%Y%m%d-%H%M%S"))
}

/// Writes the transcript into `dir` and returns the created path.
pub async fn write_transcript(dir: &Path, messages: &[Message]) -> Result<PathBuf> {
    let path = dir.join(export_filename(Utc::now()));
    let transcript = format_transcript(messages);
    tokio::fs::write(&path, transcript)
        .await
        .with_context(|| format!("Failed to write transcript to {}", path.display()))?;
    log::info!("Exported {} messages to {}", messages.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::TimeZone;

    #[test]
    fn transcript_has_headers_and_delimiters() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 23, 12, 30, 0).unwrap();
        let messages = vec![
            Message::new(Role::User, "Hello", ts),
            Message::new(Role::Assistant, "Hi there", ts),
        ];

        let transcript = format_transcript(&messages);
        let expected = "[2026-08-23 12:30:00] USER:\nHello\n\
                        ----------------------------------------\n\
                        [2026-08-23 12:30:00] ASSISTANT:\nHi there\n";
        assert_eq!(transcript, expected);
    }

    #[test]
    fn transcript_keeps_multiline_content_intact() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 23, 12, 30, 0).unwrap();
        let messages = vec![Message::new(
            Role::Assistant,
            "```rust\nfn main() {}\n```",
            ts,
        )];

        let transcript = format_transcript(&messages);
        assert!(transcript.contains("```rust\nfn main() {}\n```"));
    }

    #[test]
    fn filename_carries_the_export_timestamp() {
        let ts = Utc.with_ymd_and_hms(2026, 8, 23, 12, 30, 5).unwrap();
        assert_eq!(export_filename(ts), "vehi-chat-20260823-123005.txt");
    }

    #[tokio::test]
    async fn write_transcript_creates_the_file() {
        let dir = std::env::temp_dir();
        let messages = vec![Message::new(Role::User, "Hello", Utc::now())];

        let path = write_transcript(&dir, &messages).await.unwrap();
        let written = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(written.contains("USER:\nHello"));
        let _ = tokio::fs::remove_file(&path).await;
    }
}
