//! Interactive session loop.

use std::str::FromStr;

use sentiscope_ai::LocalState;
use sentiscope_core::BackendMode;
use sentiscope_session::{ModeChange, Orchestrator, Session};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::display;

const HELP: &str = "commands: local | remote | next | status | help | quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShellCommand {
    Mode(BackendMode),
    Next,
    Status,
    Help,
    Quit,
}

impl FromStr for ShellCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Mode(BackendMode::Local)),
            "remote" => Ok(Self::Mode(BackendMode::Remote)),
            "next" | "n" | "" => Ok(Self::Next),
            "status" => Ok(Self::Status),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            other => Err(format!("unknown command {other:?}; {HELP}")),
        }
    }
}

pub async fn run(session: &Session) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("{} items loaded. {HELP}", session.dataset().len());
    println!("{}", session.status());
    if session.orchestrator().mode() == BackendMode::Local {
        announce_when_settled(session.orchestrator().clone());
    }

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.parse::<ShellCommand>() {
            Ok(ShellCommand::Mode(mode)) => {
                let change = session.set_mode(mode);
                println!("{change}");
                if matches!(change, ModeChange::Switched { to: BackendMode::Local, .. }) {
                    if session.orchestrator().local().state() == LocalState::Initializing {
                        println!("{}", display::loading_notice());
                    }
                    announce_when_settled(session.orchestrator().clone());
                }
            }
            Ok(ShellCommand::Next) => {
                let outcome = session.classify_next().await;
                println!("{}", display::outcome(&outcome));
            }
            Ok(ShellCommand::Status) => println!("{}", session.status()),
            Ok(ShellCommand::Help) => println!("{HELP}"),
            Ok(ShellCommand::Quit) => break,
            Err(msg) => println!("{msg}"),
        }
    }
    Ok(())
}

/// Print a notice once the local model finishes loading (or fails).
fn announce_when_settled(orchestrator: Orchestrator) {
    if orchestrator.local().is_ready() {
        return;
    }
    tokio::spawn(async move {
        match orchestrator.wait_for_local().await {
            LocalState::Ready => println!("\nlocal model ready"),
            LocalState::Failed => {
                if let Some(err) = orchestrator.local().last_error() {
                    println!("\n{}", display::fallback_notice(&err));
                }
            }
            LocalState::Idle | LocalState::Initializing => {}
        }
    });
}
