//! Operator commands read from standard input.
//!
//! One command per line:
//!
//! - `filter <regex>` replaces the identity filter; agents that no
//!   longer match (and stale ones) are removed on the next frame;
//! - `filter` alone clears the filter;
//! - `reset` removes every agent on the next frame.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;
use tracing::{info, warn};
use trailcast_playback::{FrameClock, PlaybackScheduler};

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    /// Replace the identity filter. Empty clears it.
    Filter(String),
    /// Mark every agent for removal.
    Reset,
}

fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    match word {
        "filter" => Some(Command::Filter(rest.trim().to_owned())),
        "reset" if rest.trim().is_empty() => Some(Command::Reset),
        _ => None,
    }
}

/// Apply commands from `input` until it ends or `shutdown` flips.
///
/// `clock` must share its origin with the frame loop so filter changes
/// judge staleness on the same time base.
pub async fn run<R>(
    input: R,
    scheduler: Arc<PlaybackScheduler>,
    clock: FrameClock,
    mut shutdown: watch::Receiver<bool>,
) where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = shutdown.changed() => break,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("Stopping console: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Some(Command::Filter(pattern)) => {
                match scheduler.set_filter(&pattern, clock.now_ms()).await {
                    Ok(marked) => info!(pattern = %pattern, marked, "Filter applied"),
                    Err(e) => warn!("Filter rejected: {e}"),
                }
            }
            Some(Command::Reset) => {
                let marked = scheduler.reset().await;
                info!(marked, "Playback reset");
            }
            None => warn!(line = line.trim(), "Unknown command (expected `filter [regex]` or `reset`)"),
        }
    }
    info!("Console stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use trailcast_playback::{AgentStore, FlatResolver, PlaybackConfig};
    use trailcast_types::{AgentKey, Coord, Metadata, StackId, UpdateMessage};

    use super::*;

    fn update(user: &str, stack_id: i64) -> UpdateMessage {
        UpdateMessage {
            metadata: Metadata {
                user: user.to_owned(),
                stack_id: Some(stack_id),
                ..Metadata::default()
            },
            coords: vec![Coord::new(1, 0, 0), Coord::new(2, 0, 0)],
        }
    }

    fn scheduler() -> Arc<PlaybackScheduler> {
        let config = PlaybackConfig {
            stacking_enabled: true,
            ..PlaybackConfig::default()
        };
        Arc::new(PlaybackScheduler::new(
            AgentStore::new(config).unwrap(),
            Arc::new(FlatResolver),
        ))
    }

    #[test]
    fn commands_parse() {
        assert_eq!(
            parse_command("filter ^alice@"),
            Some(Command::Filter("^alice@".to_owned()))
        );
        assert_eq!(
            parse_command("  filter   ^(a|b)@  "),
            Some(Command::Filter("^(a|b)@".to_owned()))
        );
        assert_eq!(parse_command("filter"), Some(Command::Filter(String::new())));
        assert_eq!(parse_command("reset"), Some(Command::Reset));
        assert_eq!(parse_command("reset now"), None);
        assert_eq!(parse_command("quit"), None);
    }

    #[tokio::test]
    async fn filter_line_marks_non_matching_agents() {
        let scheduler = scheduler();
        scheduler.ingest(&update("alice", 1)).await;
        scheduler.ingest(&update("bob", 2)).await;
        let (_tx, shutdown) = watch::channel(false);

        let input: &[u8] = b"bogus\nfilter ^bob@\n";
        run(input, Arc::clone(&scheduler), FrameClock::new(), shutdown).await;

        let store = scheduler.store().lock().await;
        assert_eq!(store.filter().pattern(), Some("^bob@"));
        let alice = store.get(&AgentKey::new("alice", StackId::Explicit(1))).unwrap();
        let bob = store.get(&AgentKey::new("bob", StackId::Explicit(2))).unwrap();
        assert!(alice.is_pending_delete());
        assert!(!bob.is_pending_delete());
    }

    #[tokio::test]
    async fn bad_filter_then_reset() {
        let scheduler = scheduler();
        scheduler.ingest(&update("alice", 1)).await;
        let (_tx, shutdown) = watch::channel(false);

        let input: &[u8] = b"filter (\nreset\n";
        run(input, Arc::clone(&scheduler), FrameClock::new(), shutdown).await;

        let store = scheduler.store().lock().await;
        assert_eq!(store.filter().pattern(), None);
        assert!(
            store
                .get(&AgentKey::new("alice", StackId::Explicit(1)))
                .unwrap()
                .is_pending_delete()
        );
    }

    #[tokio::test]
    async fn shutdown_stops_the_console() {
        let (tx, shutdown) = watch::channel(false);
        tx.send(true).unwrap();
        let (_writer, reader) = tokio::io::duplex(64);
        run(
            tokio::io::BufReader::new(reader),
            scheduler(),
            FrameClock::new(),
            shutdown,
        )
        .await;
    }
}
