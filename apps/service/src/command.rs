//! Operator commands read line by line from the console.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info};
use url::Url;

use crate::registry::{AddOutcome, RegistryStore, RemoveOutcome};

pub const USAGE: &str = "commands:
  add <uri>   start monitoring <uri>
  del <uri>   stop monitoring <uri>
  ls          list monitored URIs
  help        show this help
  q           quit";

/// A parsed console command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add(String),
    Remove(String),
    List,
    Help,
    Quit,
    /// Anything else, kept verbatim for the diagnostic
    Unknown(String),
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let tokens: Vec<&str> = line.split_whitespace().collect();

        let command = match tokens.as_slice() {
            [] => return None,
            ["add", uri] => Command::Add((*uri).to_owned()),
            ["del", uri] => Command::Remove((*uri).to_owned()),
            ["ls"] => Command::List,
            ["help"] => Command::Help,
            ["q"] => Command::Quit,
            _ => Command::Unknown(line.to_owned()),
        };

        Some(command)
    }
}

/// What the console should do after a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Quit,
}

/// Apply `command` to the registry and describe the result
pub async fn dispatch(command: Command, store: &RegistryStore) -> Reply {
    let text = match command {
        Command::Add(uri) => match store.add(&uri).await {
            Ok(AddOutcome::Added) if is_http_url(&uri) => format!("{uri} was added"),
            Ok(AddOutcome::Added) => {
                format!("{uri} was added (not an http(s) URL, probes will report it as invalid)")
            }
            Ok(AddOutcome::AlreadyExists) => format!("{uri} already exists"),
            Err(e) => failure("add", &e),
        },
        Command::Remove(uri) => match store.remove(&uri).await {
            Ok(RemoveOutcome::Removed) => format!("{uri} was removed"),
            Ok(RemoveOutcome::NotFound) => format!("{uri} is not monitored, nothing was removed"),
            Err(e) => failure("del", &e),
        },
        Command::List => match store.list().await {
            Ok(uris) if uris.is_empty() => "no URIs are monitored".to_owned(),
            Ok(uris) => uris
                .iter()
                .enumerate()
                .map(|(i, uri)| format!("{:>3}. {uri}", i + 1))
                .collect::<Vec<_>>()
                .join("\n"),
            Err(e) => failure("ls", &e),
        },
        Command::Help => USAGE.to_owned(),
        Command::Quit => return Reply::Quit,
        Command::Unknown(raw) => format!("unknown command: {raw} (type `help` for usage)"),
    };

    Reply::Text(text)
}

/// Whether probes can actually issue a request to `uri`
fn is_http_url(uri: &str) -> bool {
    Url::parse(uri).is_ok_and(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
}

fn failure(verb: &str, err: &dyn std::error::Error) -> String {
    error!(command = verb, "Command failed: {}", err);
    format!("{verb} failed: {err}")
}

/// Why [`run_command_loop`] returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The operator entered `q`
    Quit,
    /// Input reached end of file; not a request to stop
    InputClosed,
}

/// Read commands from `input` until `q` or end of input, writing replies to
/// `output`.
pub async fn run_command_loop<R, W>(input: R, mut output: W, store: &RegistryStore) -> io::Result<LoopExit>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        let Some(command) = Command::parse(&line) else {
            continue;
        };
        debug!(?command, "Received command");

        match dispatch(command, store).await {
            Reply::Text(text) => {
                output.write_all(text.as_bytes()).await?;
                output.write_all(b"\n").await?;
                output.flush().await?;
            }
            Reply::Quit => {
                info!("Quit requested");
                return Ok(LoopExit::Quit);
            }
        }
    }

    info!("Command input closed, monitoring continues until interrupted");
    Ok(LoopExit::InputClosed)
}
