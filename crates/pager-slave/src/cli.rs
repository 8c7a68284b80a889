//! Command-line interface.
//!
//! The slave historically takes single-dash long flags with an attached
//! value (`-configfile=/etc/slave.conf`).  clap expects `--configfile`, so
//! [`normalize_args`] rewrites the raw argument list first and sets aside
//! anything it does not recognise.  Rejected arguments are logged by `main`
//! once logging is up; they never abort the run.
//!
//! | Flag                       | Meaning                                      |
//! |----------------------------|----------------------------------------------|
//! | `-nogui`                   | Headless: no status observer                 |
//! | `-logfile=<path>`          | Append log output to `<path>`                |
//! | `-configfile=<path>`       | Load this configuration file                 |
//! | `-loglevel=<n>`            | Override the configured log level (0..=2)    |
//! | `-v`, `-verbose`           | Log to the console even with `-logfile`      |
//! | `-version`                 | Print the version and exit                   |
//! | `-help`, `-h`, `--help`    | Print usage and exit                         |
//!
//! Double-dash spellings of every flag are accepted too.

use std::path::PathBuf;

use clap::Parser;

/// Flags that take no value.  A value suffix (`-nogui=1`) is ignored.
const SWITCHES: &[&str] = &["nogui", "verbose", "version", "help"];

/// Flags that need an attached `=value`.
const VALUED: &[&str] = &["logfile", "configfile", "loglevel"];

/// Pager slave relay node.
///
/// Accepts paging calls from authorised masters and hands them to the
/// transmitter.
#[derive(Debug, Parser)]
#[command(
    name = "pager-slave",
    about = "Pager slave relay node",
    disable_version_flag = true,
    args_override_self = true
)]
pub struct Cli {
    /// Console only, no status front end.  Requires -configfile.
    #[arg(long)]
    pub nogui: bool,

    /// Write log information into this file.
    #[arg(long, value_name = "LOGFILE")]
    pub logfile: Option<PathBuf>,

    /// Load the given configuration file.
    #[arg(long, value_name = "CONFIGFILE")]
    pub configfile: Option<PathBuf>,

    /// Override the configured log level (0, 1 or 2).
    #[arg(long, value_name = "LOGLEVEL")]
    pub loglevel: Option<String>,

    /// Also write log information to the console when -logfile is given.
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Print the version and exit.
    #[arg(long)]
    pub version: bool,
}

/// Outcome of [`normalize_args`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedArgs {
    /// Arguments in clap's spelling, program name first.
    pub args: Vec<String>,
    /// Arguments that were not recognised, verbatim.
    pub rejected: Vec<String>,
}

/// Rewrites the slave's flag spellings into clap's.
///
/// The first item is taken as the program name and passed through.
pub fn normalize_args<I, S>(raw: I) -> NormalizedArgs
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut iter = raw.into_iter().map(Into::into);
    let mut args: Vec<String> = iter.next().into_iter().collect();
    let mut rejected = Vec::new();

    for arg in iter {
        match normalize_one(&arg) {
            Some(normalized) => args.push(normalized),
            None => rejected.push(arg),
        }
    }

    NormalizedArgs { args, rejected }
}

fn normalize_one(arg: &str) -> Option<String> {
    let body = arg
        .strip_prefix("--")
        .or_else(|| arg.strip_prefix('-'))
        .filter(|b| !b.is_empty() && !b.starts_with('-'))?;

    let (name, value) = match body.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (body, None),
    };

    match name {
        "v" => Some("-v".to_string()),
        "h" => Some("--help".to_string()),
        _ if SWITCHES.contains(&name) => Some(format!("--{name}")),
        _ if VALUED.contains(&name) => match value {
            Some(v) if !v.is_empty() => Some(format!("--{name}={v}")),
            _ => None,
        },
        _ => None,
    }
}

impl Cli {
    /// Normalises and parses `raw`, exiting on `--help`.
    ///
    /// Returns the parsed flags and the arguments that were set aside.
    pub fn parse_normalized<I, S>(raw: I) -> (Self, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let NormalizedArgs { args, rejected } = normalize_args(raw);
        (Self::parse_from(args), rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalize(args: &[&str]) -> NormalizedArgs {
        normalize_args(std::iter::once("pager-slave").chain(args.iter().copied()))
    }

    #[test]
    fn test_single_dash_long_flags_become_double_dash() {
        let n = normalize(&["-nogui", "-configfile=/etc/slave.conf", "-verbose"]);

        assert_eq!(
            n.args,
            ["pager-slave", "--nogui", "--configfile=/etc/slave.conf", "--verbose"]
        );
        assert!(n.rejected.is_empty());
    }

    #[test]
    fn test_double_dash_spellings_are_accepted() {
        let n = normalize(&["--nogui", "--loglevel=2", "--help"]);
        assert_eq!(n.args, ["pager-slave", "--nogui", "--loglevel=2", "--help"]);
    }

    #[test]
    fn test_short_aliases() {
        let n = normalize(&["-v", "-h"]);
        assert_eq!(n.args, ["pager-slave", "-v", "--help"]);
    }

    #[test]
    fn test_unknown_and_bare_arguments_are_rejected() {
        let n = normalize(&["-frequency=439.9875", "positional", "-", "---nogui"]);

        assert_eq!(n.args, ["pager-slave"]);
        assert_eq!(n.rejected, ["-frequency=439.9875", "positional", "-", "---nogui"]);
    }

    #[test]
    fn test_valued_flag_without_value_is_rejected() {
        let n = normalize(&["-logfile", "-configfile="]);
        assert_eq!(n.rejected, ["-logfile", "-configfile="]);
    }

    #[test]
    fn test_switch_value_suffix_is_ignored() {
        let n = normalize(&["-nogui=yes"]);
        assert_eq!(n.args, ["pager-slave", "--nogui"]);
    }

    #[test]
    fn test_value_may_contain_equals_sign() {
        let n = normalize(&["-logfile=/tmp/a=b.log"]);
        assert_eq!(n.args, ["pager-slave", "--logfile=/tmp/a=b.log"]);
    }

    #[test]
    fn test_parse_normalized_fills_cli() {
        // Arrange
        let raw = [
            "pager-slave",
            "-nogui",
            "-logfile=/tmp/slave.log",
            "-configfile=slave.conf",
            "-loglevel=1",
            "-v",
            "-bogus",
        ];

        // Act
        let (cli, rejected) = Cli::parse_normalized(raw);

        // Assert
        assert!(cli.nogui);
        assert!(cli.verbose);
        assert!(!cli.version);
        assert_eq!(cli.logfile, Some(PathBuf::from("/tmp/slave.log")));
        assert_eq!(cli.configfile, Some(PathBuf::from("slave.conf")));
        assert_eq!(cli.loglevel.as_deref(), Some("1"));
        assert_eq!(rejected, ["-bogus"]);
    }

    #[test]
    fn test_repeated_flag_keeps_last_value() {
        let (cli, _) = Cli::parse_normalized(["pager-slave", "-loglevel=0", "-loglevel=2"]);
        assert_eq!(cli.loglevel.as_deref(), Some("2"));
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
