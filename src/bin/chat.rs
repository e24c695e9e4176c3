//! Terminal chat client for a running chatrelay server.
//!
//! Each line read from stdin is sent as the next user turn; the reply is
//! printed as it streams in.

use std::io::{self, Write};
use std::time::Duration;

use chatrelay::consumer::{submit, Exchange, Outcome, Transcript, GREETING};
use chatrelay::providers::RemoteRelay;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

#[derive(Debug, Parser)]
#[command(name = "chatrelay-chat", about = "Chat with a chatrelay server from the terminal")]
struct Args {
    /// Base URL of the relay server
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    url: String,

    /// Give up on a reply after this many seconds without data
    #[arg(long, default_value_t = 120)]
    idle_timeout_secs: u64,

    /// Start without the assistant greeting
    #[arg(long)]
    no_greeting: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let relay = RemoteRelay::new(&args.url)?
        .with_idle_timeout(Duration::from_secs(args.idle_timeout_secs));

    let mut transcript = if args.no_greeting {
        Transcript::new()
    } else {
        println!("assistant: {GREETING}\n");
        Transcript::with_greeting(GREETING)
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        let mut printed = 0;
        let exchange = submit(&relay, transcript, &line, |exchange: &Exchange| {
            if let Err(e) = render(exchange, &mut printed) {
                warn!(error = %e, "failed to write reply to stdout");
            }
        })
        .await;

        if let Some(Outcome::Interrupted(reason)) = &exchange.outcome {
            eprintln!("\n[reply interrupted: {reason}]");
        }
        if exchange.outcome.is_some() {
            println!("\n");
        }

        transcript = exchange.transcript;
        prompt()?;
    }

    Ok(())
}

/// Print the part of the reply not shown yet.
fn render(exchange: &Exchange, printed: &mut usize) -> io::Result<()> {
    let Some(reply) = exchange.reply() else {
        return Ok(());
    };

    let mut stdout = io::stdout().lock();
    if *printed == 0 && exchange.loading && reply.is_empty() {
        write!(stdout, "assistant: ")?;
    }

    // The fallback replaces the reply rather than extending it.
    let fresh = reply.get(*printed..).unwrap_or(reply);
    write!(stdout, "{fresh}")?;
    *printed = reply.len();
    stdout.flush()
}

fn prompt() -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    write!(stdout, "you: ")?;
    stdout.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatrelay::model::ChatMessage;

    fn exchange(reply: &str, loading: bool) -> Exchange {
        Exchange {
            transcript: Transcript::new()
                .push(ChatMessage::user("hi"))
                .push(ChatMessage::assistant(reply)),
            loading,
            outcome: None,
        }
    }

    #[test]
    fn render_tracks_printed_suffix() {
        let mut printed = 0;
        render(&exchange("", true), &mut printed).unwrap();
        assert_eq!(printed, 0);

        render(&exchange("Hel", true), &mut printed).unwrap();
        assert_eq!(printed, 3);

        render(&exchange("Hello", false), &mut printed).unwrap();
        assert_eq!(printed, 5);
    }

    #[test]
    fn render_without_reply_is_a_no_op() {
        let mut printed = 7;
        let idle = Exchange::idle(Transcript::new().push(ChatMessage::user("hi")));
        render(&idle, &mut printed).unwrap();
        assert_eq!(printed, 7);
    }
}
