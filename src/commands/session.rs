use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::Instrument;

use crate::{
    commands::{self, format_quote, quote, sync, Command},
    init::spawn_background_tasks,
    models::sync::{Resolution, SyncPhase},
    Data,
};

#[derive(Debug, Parser)]
#[command(multicall = true)]
struct SessionLine {
    #[command(subcommand)]
    command: SessionCommand,
}

#[derive(Debug, Subcommand)]
enum SessionCommand {
    #[command(flatten)]
    Shared(Command),
    /// list conflicts waiting for a decision.
    Conflicts,
    /// settle pending conflicts with the server versions.
    Accept,
    /// settle pending conflicts with the local versions.
    Keep,
    /// end the session.
    #[command(alias = "exit")]
    Quit,
}

/// reads commands from stdin until `quit` or end of input while the sync
/// timer runs in the background.
#[tracing::instrument(skip_all)]
pub async fn run(data: &Data) -> anyhow::Result<()> {
    let timer = spawn_background_tasks(data);

    let mut phase = data.reconciler.subscribe_phase();
    let notifier = tokio::spawn(
        async move {
            while phase.changed().await.is_ok() {
                if *phase.borrow_and_update() == SyncPhase::AwaitingUserChoice {
                    println!("server and local quotes disagree. type `conflicts` to review them.");
                }
            }
        }
        .in_current_span(),
    );

    let last_viewed = data.store.lock().await.last_viewed().await;

    match last_viewed {
        Some(last) => println!("last viewed: {}", format_quote(&last)),
        None => quote::show(data, None).await?,
    }
    println!("type `help` for a list of commands.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let words: Vec<&str> = line.split_whitespace().collect();

        if words.is_empty() {
            continue;
        }

        let command = match SessionLine::try_parse_from(words) {
            Ok(parsed) => parsed.command,
            Err(e) => {
                let _ = e.print();
                continue;
            }
        };

        let result = match command {
            SessionCommand::Quit => break,
            SessionCommand::Conflicts => sync::conflicts(data).await,
            SessionCommand::Accept => sync::resolve(data, Resolution::AcceptRemote).await,
            SessionCommand::Keep => sync::resolve(data, Resolution::KeepLocal).await,
            SessionCommand::Shared(command) => commands::execute(data, command).await,
        };

        if let Err(e) = result {
            println!("error: {e:#}");
        }
    }

    timer.shutdown().await;
    notifier.abort();

    println!("bye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_lines_parse_without_a_binary_name() {
        let line = SessionLine::try_parse_from(["show", "--category", "Life"]).unwrap();
        assert!(matches!(
            line.command,
            SessionCommand::Shared(Command::Show { category: Some(c) }) if c == "Life"
        ));

        let line = SessionLine::try_parse_from(["exit"]).unwrap();
        assert!(matches!(line.command, SessionCommand::Quit));

        let line = SessionLine::try_parse_from(["accept"]).unwrap();
        assert!(matches!(line.command, SessionCommand::Accept));
    }

    #[test]
    fn unknown_session_commands_are_errors() {
        assert!(SessionLine::try_parse_from(["dance"]).is_err());
    }
}
