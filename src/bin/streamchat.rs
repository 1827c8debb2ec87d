//! Interactive terminal client for a streaming chat service.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a service on http://localhost:8000
//! streamchat
//!
//! # Point at another deployment
//! streamchat --base-url https://chat.example.com
//!
//! # Or set it through the environment
//! STREAMCHAT_API_URL=https://chat.example.com streamchat
//!
//! # Read defaults from a YAML file and disable colors
//! streamchat --config streamchat.yaml --no-color
//! ```
//!
//! The service must answer its health check before the prompt is shown.
//! Type `/help` for commands.  Ctrl+C stops a reply that is still streaming.

use std::sync::{Arc, Mutex};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

use streamchat::config::{self, BASE_URL_ENV};
use streamchat::{
    ChatArgs, ChatClient, ChatCommand, ChatConfig, ChatSession, ConversationRenderer,
    PlainTextRenderer, TurnOutcome, help_text, parse_command,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("streamchat [OPTIONS]");
    let config = config::resolve(args, std::env::var(BASE_URL_ENV).ok())?;
    let client = ChatClient::new(&config)?;

    match client.health().await {
        Ok(report) => debug!(?report, "chat service is up"),
        Err(err) => {
            eprintln!(
                "streamchat: chat service at {} is unavailable: {err}",
                client.base_url()
            );
            std::process::exit(1);
        }
    }

    let mut session = ChatSession::new(client);
    let mut renderer = PlainTextRenderer::with_color(config.display_name.clone(), config.use_color);
    let mut rl = DefaultEditor::new()?;

    // The handler cancels whichever reply is current.
    let current = Arc::new(Mutex::new(CancellationToken::new()));
    let handler_token = Arc::clone(&current);
    ctrlc::set_handler(move || {
        if let Ok(token) = handler_token.lock() {
            token.cancel();
        }
    })?;

    println!("Chatting with {} at {}", config.display_name, session.transport().base_url());
    println!("Type /help for commands, /quit to exit\n");

    loop {
        let line = match rl.readline("You: ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(line);

        if let Some(cmd) = parse_command(line) {
            match cmd {
                ChatCommand::Quit => {
                    println!("Goodbye!");
                    break;
                }
                ChatCommand::Clear => {
                    session.clear();
                    renderer.render(session.messages());
                    renderer.print_info("Conversation cleared.");
                }
                ChatCommand::History(count) => {
                    let messages = session.messages();
                    let skip = count.map_or(0, |n| messages.len().saturating_sub(n));
                    renderer.print_history(&messages[skip..]);
                }
                ChatCommand::Health => match session.transport().health().await {
                    Ok(report) => renderer.print_info(&format!(
                        "Service is up (status: {}, {} ms)",
                        report.status.as_deref().unwrap_or("unknown"),
                        report.latency.as_millis()
                    )),
                    Err(err) => renderer.print_error(&format!("Health check failed: {err}")),
                },
                ChatCommand::Stats => print_stats(&session),
                ChatCommand::ShowConfig => print_config(&config),
                ChatCommand::Help => {
                    for line in help_text().lines() {
                        println!("    {}", line);
                    }
                }
                ChatCommand::Invalid(message) => renderer.print_error(&message),
            }
            continue;
        }

        let token = CancellationToken::new();
        match current.lock() {
            Ok(mut slot) => *slot = token.clone(),
            Err(_) => error!("interrupt handler state is poisoned; Ctrl+C will not stop replies"),
        }
        let outcome = send_and_render(&mut session, &mut renderer, line, &token).await;
        renderer.render(session.messages());
        match outcome {
            Ok(outcome) => renderer.finish_turn(&outcome),
            Err(err) => renderer.print_error(&err.to_string()),
        }
    }

    Ok(())
}

/// Sends one message and renders every conversation change until it ends.
async fn send_and_render(
    session: &mut ChatSession,
    renderer: &mut PlainTextRenderer,
    line: &str,
    token: &CancellationToken,
) -> streamchat::Result<TurnOutcome> {
    let mut rx = session.subscribe();
    rx.borrow_and_update();
    let send = session.send(line, token);
    tokio::pin!(send);
    loop {
        tokio::select! {
            outcome = &mut send => return outcome,
            changed = rx.changed() => {
                if changed.is_ok() {
                    let view = rx.borrow_and_update().clone();
                    renderer.render(&view);
                }
            }
        }
    }
}

fn print_stats(session: &ChatSession) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!("      Messages: {}", stats.message_count);
    println!(
        "      Turns: {} ({} completed, {} truncated, {} interrupted)",
        stats.turns, stats.completed, stats.truncated, stats.interrupted
    );
    println!(
        "      Failures: {} request, {} stream",
        stats.transport_failures, stats.stream_failures
    );
    println!(
        "      Frames: {} ({} malformed)",
        stats.frames, stats.payload_anomalies
    );
}

fn print_config(config: &ChatConfig) {
    println!("    Current Configuration:");
    println!("      Base URL: {}", config.base_url);
    println!("      Display name: {}", config.display_name);
    println!("      Timeout: {}s", config.timeout.as_secs());
    println!(
        "      Colors: {}",
        if config.use_color { "on" } else { "off" }
    );
}
