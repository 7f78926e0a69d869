use std::io::Write;

use llm_core::ServerMessage;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use client::command::HELP;
use client::{build_speech_queue, ClientConfig, Command, Session, TurnOutcome};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    // stdout carries the conversation, logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = ClientConfig::from_env()?;
    info!(
        "Client configuration loaded: server={}, voice={}, format={}, output={:?}",
        config.server_url, config.voice_enabled, config.format, config.output
    );

    let speech = build_speech_queue(&config)?;
    tokio::spawn(client::speech::log_diagnostics(speech.subscribe()));
    let mut session = Session::connect(&config.server_url, speech).await?;

    println!("Hello, start the conversation. ({HELP})");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match Command::parse(&line) {
            Command::Empty => continue,
            Command::Quit => break,
            Command::Stop => session.speech().stop(),
            Command::Voice(on) => {
                session.speech().set_enabled(on);
                if !on {
                    session.speech().stop();
                }
                println!("voice {}", if on { "on" } else { "off" });
            }
            Command::Unknown(line) => println!("unknown command '{line}' ({HELP})"),
            Command::Ask(text) => {
                let state = session
                    .ask(&text, |event| {
                        if let ServerMessage::Chunk { text } = event {
                            print!("{text}");
                            let _ = std::io::stdout().flush();
                        }
                    })
                    .await?;
                match state.outcome {
                    TurnOutcome::Failed(_) => {
                        if !state.content.is_empty() {
                            println!();
                        }
                        println!("{}", state.display_text());
                    }
                    _ => println!(),
                }
            }
        }
    }

    if let Err(e) = session.close().await {
        warn!(error = %e, "close failed");
    }
    Ok(())
}
