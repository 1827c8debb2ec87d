//! Configuration for the chat client.
//!
//! The core only ever sees a resolved [`ChatConfig`].  Command-line flags,
//! the optional YAML file, and the environment are merged by [`resolve`],
//! which only the binary calls.

use std::path::Path;
use std::time::Duration;

use arrrg_derive::CommandLine;
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};

/// Default root of the chat service.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Default name shown above assistant replies.
pub const DEFAULT_DISPLAY_NAME: &str = "Assistant";

/// Environment variable that overrides the base URL from the config file.
pub const BASE_URL_ENV: &str = "STREAMCHAT_API_URL";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Command-line arguments for the streamchat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Root URL of the chat service.
    #[arrrg(optional, "Chat service root (default: http://localhost:8000)", "URL")]
    pub base_url: Option<String>,

    /// Name shown above assistant replies.
    #[arrrg(optional, "Name shown for the assistant (default: Assistant)", "NAME")]
    pub display_name: Option<String>,

    /// Request timeout in seconds.
    #[arrrg(optional, "Request timeout in seconds (default: 60)", "SECONDS")]
    pub timeout_secs: Option<u64>,

    /// YAML file with default settings.
    #[arrrg(optional, "YAML config file", "PATH")]
    pub config: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,
}

/// Settings read from a YAML config file.  Every key is optional.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Root URL of the chat service.
    pub base_url: Option<String>,
    /// Name shown above assistant replies.
    pub display_name: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Whether to use ANSI colors.
    pub color: Option<bool>,
}

impl FileConfig {
    /// Parses a config file's contents.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads and parses a config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|err| Error::io(format!("failed to read {}", path.display()), err))?;
        Self::from_yaml(&yaml)
    }
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// Root URL of the chat service.
    pub base_url: String,

    /// Name shown above assistant replies.
    pub display_name: String,

    /// Timeout applied to every request.
    pub timeout: Duration,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Base URL: http://localhost:8000
    /// - Display name: Assistant
    /// - Timeout: 60 seconds
    /// - Color: enabled
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            timeout: DEFAULT_TIMEOUT,
            use_color: true,
        }
    }

    /// Sets the service root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the display name.
    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Checks the base URL and returns it as a directory-style URL.
    ///
    /// The returned URL always ends in `/` so endpoints join beneath it.
    pub fn validate(&self) -> Result<Url> {
        let mut url = Url::parse(self.base_url.trim())?;
        if url.cannot_be_a_base() {
            return Err(Error::validation(
                format!("{} cannot be used as a base URL", self.base_url),
                Some("base_url".to_string()),
            ));
        }
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Merges the config layers: flags, then environment, then file, then defaults.
///
/// `env_base_url` is passed in rather than read here so the core stays free
/// of ambient state.
pub fn resolve(args: ChatArgs, env_base_url: Option<String>) -> Result<ChatConfig> {
    let file = match args.config.as_deref() {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    Ok(merge(args, env_base_url, file))
}

fn merge(args: ChatArgs, env_base_url: Option<String>, file: FileConfig) -> ChatConfig {
    let defaults = ChatConfig::new();
    ChatConfig {
        base_url: args
            .base_url
            .or(env_base_url.filter(|url| !url.trim().is_empty()))
            .or(file.base_url)
            .unwrap_or(defaults.base_url),
        display_name: args
            .display_name
            .or(file.display_name)
            .unwrap_or(defaults.display_name),
        timeout: args
            .timeout_secs
            .or(file.timeout_secs)
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout),
        use_color: !args.no_color && file.color.unwrap_or(defaults.use_color),
    }
}
