//! Command line parsing

use anyhow::{anyhow, bail, Context, Result};

/// Index list used when none is given
pub const DEFAULT_INDICES: &str = "cd_t,cd_f_t,cd_f2_t,cd_f3_t";

pub const USAGE: &str = "usage: citeindex-worker <partition | index <names> | all [names] | missing> \
[--batch-size N] [--limit N]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Partition phase only
    Partition,
    /// Index phase only, for a comma separated index list
    Index(String),
    /// Partition phase followed by the index phase
    All(String),
    /// List referenced ids that are absent from the patent table
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: Command,
    pub batch_size: Option<u64>,
    pub limit: Option<u64>,
}

/// Parse arguments (without the program name)
pub fn parse_args(args: &[String]) -> Result<Invocation> {
    let mut positional = Vec::new();
    let mut batch_size = None;
    let mut limit = None;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--batch-size" => batch_size = Some(number(iter.next(), "--batch-size")?),
            "--limit" => limit = Some(number(iter.next(), "--limit")?),
            flag if flag.starts_with("--") => bail!("unknown option {}\n{}", flag, USAGE),
            _ => positional.push(arg.as_str()),
        }
    }

    let command = match positional.as_slice() {
        ["partition"] => Command::Partition,
        ["index", names] => Command::Index(names.to_string()),
        ["index"] => bail!("index requires a list of index names\n{}", USAGE),
        ["all"] => Command::All(DEFAULT_INDICES.to_string()),
        ["all", names] => Command::All(names.to_string()),
        ["missing"] => Command::Missing,
        [] => bail!("missing command\n{}", USAGE),
        other => bail!("unexpected arguments {:?}\n{}", other, USAGE),
    };

    Ok(Invocation {
        command,
        batch_size,
        limit,
    })
}

fn number(value: Option<&String>, flag: &str) -> Result<u64> {
    let raw = value.ok_or_else(|| anyhow!("{} requires a value", flag))?;
    let parsed: u64 = raw
        .parse()
        .with_context(|| format!("{} expects a positive integer, got {:?}", flag, raw))?;
    if parsed == 0 {
        bail!("{} must be positive", flag);
    }
    Ok(parsed)
}
