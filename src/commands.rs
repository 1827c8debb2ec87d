//! Slash command parsing for the chat REPL.
//!
//! Lines starting with `/` control the session locally and are never sent
//! to the chat service.

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Clear the conversation history.
    Clear,

    /// Print the conversation, optionally only the last `n` messages.
    History(Option<usize>),

    /// Check that the chat service is reachable.
    Health,

    /// Display session statistics.
    Stats,

    /// Display the resolved configuration.
    ShowConfig,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Invalid or unrecognized command with an error message.
    Invalid(String),
}

/// Parses a line of input as a slash command.
///
/// Returns `None` for anything that should be sent as a message.
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "clear" | "reset" => ChatCommand::Clear,
        "history" => match argument {
            None => ChatCommand::History(None),
            Some(arg) => match arg.parse::<usize>() {
                Ok(count) if count > 0 => ChatCommand::History(Some(count)),
                _ => ChatCommand::Invalid("/history expects a positive integer".to_string()),
            },
        },
        "health" | "ping" => ChatCommand::Health,
        "stats" | "status" => ChatCommand::Stats,
        "config" => ChatCommand::ShowConfig,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /clear                 Clear conversation history
  /history [n]           Show the conversation (or its last n messages)
  /health                Check that the chat service is reachable
  /stats                 Show session statistics
  /config                Show current configuration
  /help                  Show this help message
  /quit                  Exit the chat

Press Ctrl+C while a reply is streaming to stop it."#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /quit  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_clear() {
        assert_eq!(parse_command("/clear"), Some(ChatCommand::Clear));
        assert_eq!(parse_command("/CLEAR"), Some(ChatCommand::Clear));
        assert_eq!(parse_command("/reset"), Some(ChatCommand::Clear));
    }

    #[test]
    fn parse_history() {
        assert_eq!(parse_command("/history"), Some(ChatCommand::History(None)));
        assert_eq!(
            parse_command("/history  4 "),
            Some(ChatCommand::History(Some(4)))
        );
        assert_eq!(
            parse_command("/history 0"),
            Some(ChatCommand::Invalid(
                "/history expects a positive integer".to_string()
            ))
        );
        assert_eq!(
            parse_command("/history lots"),
            Some(ChatCommand::Invalid(
                "/history expects a positive integer".to_string()
            ))
        );
    }

    #[test]
    fn parse_health_stats_and_config() {
        assert_eq!(parse_command("/health"), Some(ChatCommand::Health));
        assert_eq!(parse_command("/ping"), Some(ChatCommand::Health));
        assert_eq!(parse_command("/stats"), Some(ChatCommand::Stats));
        assert_eq!(parse_command("/config"), Some(ChatCommand::ShowConfig));
    }

    #[test]
    fn parse_unknown() {
        assert_eq!(
            parse_command("/model gpt"),
            Some(ChatCommand::Invalid("Unknown command: /model".to_string()))
        );
        assert_eq!(
            parse_command("/"),
            Some(ChatCommand::Invalid("Unknown command: /".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hello there!"), None);
        assert_eq!(parse_command("what does a/b mean"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
    }

    #[test]
    fn help_text_lists_every_command() {
        let help = help_text();
        for command in ["/clear", "/history", "/health", "/stats", "/config", "/help", "/quit"] {
            assert!(help.contains(command), "missing {command}");
        }
    }
}
