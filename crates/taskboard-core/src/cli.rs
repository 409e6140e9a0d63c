use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::filter::Tab;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskboard",
    version,
    about = "A small to-do board: today, overdue, and completed tasks",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Add a task
    Add {
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Show one tab of the board
    List {
        #[arg(long)]
        tab: Option<Tab>,
        /// Also show the completed panel
        #[arg(long)]
        completed: bool,
    },
    /// Show completed tasks
    Completed,
    /// Replace the text of a task
    Edit {
        id: u64,
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Flip the completion flag of a task
    #[command(visible_alias = "done")]
    Toggle { id: u64 },
    /// Delete a task
    #[command(visible_alias = "rm")]
    Delete { id: u64 },
    /// Delete every completed task
    ClearCompleted,
    /// Drop soft-deleted tasks from storage
    Purge,
    /// Print every stored task as JSON
    Export,
    /// Show all fields of one task
    Info { id: u64 },
    /// Print the effective configuration
    Show,
    /// Interactive board
    Shell,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls `rc.key=value` / `rc.key:value` words out of the argument list.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> PreprocessedArgs {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = rest.split_once('=').or_else(|| rest.split_once(':'));
            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((format!("rc.{k}"), v.to_string()));
                continue;
            }
        }

        cleaned.push(arg);
    }

    PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use clap::Parser;

    use super::{Command, GlobalCli, preprocess_args};
    use crate::filter::Tab;

    fn args(words: &[&str]) -> Vec<OsString> {
        words.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_rc_overrides_are_extracted() {
        let pre = preprocess_args(&args(&[
            "taskboard",
            "rc.delete.policy=soft",
            "add",
            "rc.color:off",
            "milk",
        ]));
        assert_eq!(pre.cleaned_args, args(&["taskboard", "add", "milk"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.delete.policy".to_string(), "soft".to_string()),
                ("rc.color".to_string(), "off".to_string()),
            ]
        );
    }

    #[test]
    fn parses_subcommands_and_aliases() {
        let cli = GlobalCli::parse_from(["taskboard", "-vv", "add", "Buy", "oat", "milk"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(
            cli.command,
            Some(Command::Add {
                text: vec!["Buy".into(), "oat".into(), "milk".into()]
            })
        );

        let cli = GlobalCli::parse_from(["taskboard", "done", "3"]);
        assert_eq!(cli.command, Some(Command::Toggle { id: 3 }));

        let cli = GlobalCli::parse_from(["taskboard", "list", "--tab", "overdue"]);
        assert_eq!(
            cli.command,
            Some(Command::List {
                tab: Some(Tab::Overdue),
                completed: false
            })
        );

        let cli = GlobalCli::parse_from(["taskboard", "show", "--config", "/tmp/rc"]);
        assert_eq!(cli.command, Some(Command::Show));
        assert!(cli.config.is_some());

        let cli = GlobalCli::parse_from(["taskboard", "--rc", "color=off"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.rc_overrides[0].key, "color");
    }
}
