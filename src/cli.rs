//! Minimal CLI parsing for operator commands.

use std::env;

use anyhow::{Context, Result, bail};
use uuid::Uuid;

pub const USAGE: &str = "usage: harvester [run | queue <release-id> | failed | reset <release-id>]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Command {
    /// Run the acquisition loop and completion poller until interrupted
    #[default]
    Run,
    /// Queue a release for acquisition
    Queue(Uuid),
    /// List releases whose acquisition was exhausted
    Failed,
    /// Clear a failed acquisition so the release is retried
    Reset(Uuid),
}

impl Command {
    pub fn from_args() -> Result<Self> {
        Self::parse(env::args().skip(1))
    }

    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        let command = match args.next().as_deref() {
            None | Some("run") => Command::Run,
            Some("queue") => Command::Queue(release_id(args.next())?),
            Some("failed") => Command::Failed,
            Some("reset") => Command::Reset(release_id(args.next())?),
            Some(other) => bail!("unknown command '{}'\n{}", other, USAGE),
        };

        if let Some(extra) = args.next() {
            bail!("unexpected argument '{}'\n{}", extra, USAGE);
        }
        Ok(command)
    }
}

fn release_id(arg: Option<String>) -> Result<Uuid> {
    let arg = arg.with_context(|| format!("missing release id\n{}", USAGE))?;
    Uuid::parse_str(arg.trim()).with_context(|| format!("invalid release id '{}'", arg))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Command> {
        Command::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_defaults_to_run() {
        assert_eq!(parse(&[]).unwrap(), Command::Run);
        assert_eq!(parse(&["run"]).unwrap(), Command::Run);
    }

    #[test]
    fn test_release_commands() {
        let id = "b84ee12a-09ef-421b-82de-0441a926375b";
        let uuid = Uuid::parse_str(id).unwrap();
        assert_eq!(parse(&["queue", id]).unwrap(), Command::Queue(uuid));
        assert_eq!(parse(&["reset", id]).unwrap(), Command::Reset(uuid));
        assert_eq!(parse(&["failed"]).unwrap(), Command::Failed);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(parse(&["queue"]).is_err());
        assert!(parse(&["reset", "not-a-uuid"]).is_err());
        assert!(parse(&["failed", "extra"]).is_err());
        assert!(parse(&["download"]).is_err());
    }
}
