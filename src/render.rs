//! Output rendering for the chat application.
//!
//! Renderers follow the conversation store: each time a new view is
//! published they are handed the full message list and print whatever part
//! of it has not been shown yet.  Because views carry whole snapshots, a
//! renderer that skips a few views still ends up showing the right text.

use std::io::{self, Stdout, Write};

use crate::session::TurnOutcome;
use crate::types::{Message, Role};

/// ANSI escape code for bold text (used for speaker names).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for dim text (used for notices).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the assistant).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for green text (used for the user).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// Trait for rendering the conversation.
pub trait ConversationRenderer: Send {
    /// Shows the parts of `messages` not shown before.
    ///
    /// Called with every published view.  Assistant text that grew since the
    /// previous call is printed incrementally.
    fn render(&mut self, messages: &[Message]);

    /// Called when a reply is complete.
    fn finish_response(&mut self);

    /// Prints the whole conversation.
    fn print_history(&mut self, messages: &[Message]);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Called when the user stops a reply.
    fn print_interrupted(&mut self);

    /// Closes out a turn.
    ///
    /// Failures are logged by the session; what is shown here is only the
    /// conversation itself, so error text never reaches the screen.
    fn finish_turn(&mut self, outcome: &TurnOutcome) {
        match outcome {
            TurnOutcome::Interrupted => self.print_interrupted(),
            _ => self.finish_response(),
        }
    }
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    display_name: String,
    use_color: bool,
    // Messages already handed to `render`.
    seen: usize,
    // Bytes printed of the most recent assistant message.
    streamed: usize,
    mid_line: bool,
}

impl PlainTextRenderer<Stdout> {
    /// Creates a renderer for stdout with ANSI colors enabled.
    pub fn new(display_name: impl Into<String>) -> Self {
        Self::with_color(display_name, true)
    }

    /// Creates a renderer for stdout with the specified color setting.
    pub fn with_color(display_name: impl Into<String>, use_color: bool) -> Self {
        Self::with_writer(io::stdout(), display_name, use_color)
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer that writes to `out`.
    pub fn with_writer(out: W, display_name: impl Into<String>, use_color: bool) -> Self {
        Self {
            out,
            display_name: display_name.into(),
            use_color,
            seen: 0,
            streamed: 0,
            mid_line: false,
        }
    }

    /// Consumes the renderer and returns its writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let _ = self.out.write_all(text.as_bytes());
        self.mid_line = !text.ends_with('\n');
    }

    fn flush(&mut self) {
        let _ = self.out.flush();
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }

    fn speaker(&self, role: Role) -> String {
        match role {
            Role::User => self.styled(&format!("{ANSI_BOLD}{ANSI_GREEN}"), "You:"),
            Role::Assistant => self.styled(
                &format!("{ANSI_BOLD}{ANSI_CYAN}"),
                &format!("{}:", self.display_name),
            ),
        }
    }

    fn end_line(&mut self) {
        if self.mid_line {
            self.write("\n");
        }
    }

    fn stream_tail(&mut self, content: &str) {
        match content.get(self.streamed..) {
            Some(tail) => self.write(tail),
            None => {
                // Text was replaced rather than extended; start over.
                self.end_line();
                self.write(content);
            }
        }
        self.streamed = content.len();
    }
}

impl<W: Write + Send> ConversationRenderer for PlainTextRenderer<W> {
    fn render(&mut self, messages: &[Message]) {
        if messages.len() < self.seen {
            self.seen = 0;
            self.streamed = 0;
            return;
        }
        if let Some(current) = self.seen.checked_sub(1).map(|i| &messages[i]) {
            if current.is_assistant() {
                self.stream_tail(&current.content);
            }
        }
        for message in &messages[self.seen..] {
            if message.is_assistant() {
                self.end_line();
                let header = self.speaker(Role::Assistant);
                self.write(&format!("{header} "));
                self.streamed = 0;
                self.stream_tail(&message.content);
            }
        }
        self.seen = messages.len();
        self.flush();
    }

    fn finish_response(&mut self) {
        self.end_line();
        self.flush();
    }

    fn print_history(&mut self, messages: &[Message]) {
        self.end_line();
        if messages.is_empty() {
            self.print_info("(no messages)");
            return;
        }
        for message in messages {
            let header = self.speaker(message.role);
            self.write(&format!("{header} {}\n", message.content));
        }
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.end_line();
        let line = self.styled(ANSI_RED, &format!("Error: {error}"));
        self.write(&format!("{line}\n"));
        self.flush();
    }

    fn print_info(&mut self, info: &str) {
        self.end_line();
        self.write(&format!("{info}\n"));
        self.flush();
    }

    fn print_interrupted(&mut self) {
        self.end_line();
        let line = self.styled(ANSI_DIM, "[interrupted]");
        self.write(&format!("{line}\n"));
        self.flush();
    }
}
