use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// acmectl: inspect and drive acme/edwood windows through their files
#[derive(Parser, Debug, Clone)]
#[command(name = "acmectl")]
#[command(author = "RidgetopAI")]
#[command(version)]
#[command(about = "Inspect and drive acme/edwood windows", long_about = None)]
pub struct Cli {
    /// Directory where the editor's file tree is mounted
    #[arg(long, global = true, value_name = "DIR")]
    pub mount: Option<PathBuf>,

    /// Config file to use instead of the default location
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Window id. The editor sets $winid for commands it runs.
    #[arg(short, long, global = true, env = "winid")]
    pub window: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List open windows
    List,
    /// Show the window's parameters
    Info,
    /// Print the current address as character offsets
    Addr,
    /// Print the first and last line of the selection
    Lines,
    /// Print the selected text
    Selection,
    /// Print the tag, or append text to it
    Tag {
        /// Text to append
        #[arg(long, value_name = "TEXT")]
        append: Option<String>,
    },
    /// Send a control message
    Ctl {
        /// Message, e.g. `clean` or `name /tmp/x`
        msg: String,
    },
    /// Print the window's events until it is closed
    Events {
        /// Hand events the editor can run itself back to it
        #[arg(long, default_value_t = false)]
        write_back: bool,
    },
    /// Print the namespace directory
    Namespace,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["acmectl", "list"]);
        assert!(cli.mount.is_none());
        assert!(cli.config.is_none());
        assert!(cli.log_level.is_none());
        assert_eq!(cli.command, Command::List);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["acmectl", "lines", "--mount", "/n/acme", "-w", "12"]);
        assert_eq!(cli.mount, Some(PathBuf::from("/n/acme")));
        assert_eq!(cli.window.as_deref(), Some("12"));
        assert_eq!(cli.command, Command::Lines);
    }

    #[test]
    fn test_ctl_message() {
        let cli = Cli::parse_from(["acmectl", "--window", "3", "ctl", "name /tmp/x"]);
        assert_eq!(
            cli.command,
            Command::Ctl {
                msg: "name /tmp/x".to_string()
            }
        );
    }

    #[test]
    fn test_events_write_back_flag() {
        let cli = Cli::parse_from(["acmectl", "events", "--write-back"]);
        assert_eq!(cli.command, Command::Events { write_back: true });

        let cli = Cli::parse_from(["acmectl", "events"]);
        assert_eq!(cli.command, Command::Events { write_back: false });
    }

    #[test]
    fn test_tag_append() {
        let cli = Cli::parse_from(["acmectl", "tag", "--append", " Test"]);
        assert_eq!(
            cli.command,
            Command::Tag {
                append: Some(" Test".to_string())
            }
        );
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["acmectl"]).is_err());
    }
}
