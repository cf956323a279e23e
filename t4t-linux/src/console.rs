//! Operator console on stdin: change the served payload while readers are polling.
//!
//! Lines: `uri <text>`, `text <text>`, `show`.

use std::sync::Arc;

use t4t_core::apdu::to_hex;
use t4t_core::{PayloadCell, PayloadConfig};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::config::parse_kind;

#[derive(Debug, PartialEq)]
enum ConsoleCommand {
    Set(PayloadConfig),
    Show,
}

fn parse_line(line: &str) -> Result<ConsoleCommand, String> {
    let line = line.trim_end_matches(['\r', '\n']);
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    if word.eq_ignore_ascii_case("show") && rest.trim().is_empty() {
        return Ok(ConsoleCommand::Show);
    }
    match parse_kind(word) {
        Some(kind) => Ok(ConsoleCommand::Set(PayloadConfig::new(rest, kind))),
        None => Err(format!("unknown command {word:?}; expected uri, text or show")),
    }
}

/// Print the NDEF file currently served, as hex and decoded.
pub fn describe(payload: &PayloadCell) -> String {
    let snapshot = payload.snapshot();
    match snapshot.ndef_file() {
        Ok(file) => format!(
            "{:?} {:?}\nNDEF file ({} bytes): {}",
            snapshot.config().kind,
            snapshot.config().text,
            file.len(),
            to_hex(file)
        ),
        Err(e) => format!("not servable: {e}"),
    }
}

/// Read commands from stdin until EOF.
pub async fn run_console(payload: Arc<PayloadCell>) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_line(&line) {
            Ok(ConsoleCommand::Set(config)) => {
                if let Err(e) = config.validate() {
                    eprintln!("warning: {e}; NDEF reads will fail until the payload is replaced");
                }
                payload.set(config);
            }
            Ok(ConsoleCommand::Show) => println!("{}", describe(&payload)),
            Err(msg) => eprintln!("{msg}"),
        }
    }
    tracing::debug!("stdin closed, console stopped");
    Ok(())
}
