//! Command-line arguments and subcommands of the `checkflow` binary.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "checkflow",
    version,
    about = "Expands `check` expressions and `handle` blocks into explicit error propagation."
)]
pub struct CheckflowArgs {
    /// Extra package stubs (JSON), merged over the builtin ones.
    #[arg(long = "stubs", global = true, value_name = "FILE")]
    pub stubs: Vec<PathBuf>,

    /// Raise log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Expand every marked source of a package directory.
    Expand {
        /// The package directory.
        #[arg(required = true)]
        dir: PathBuf,
        /// Print the expanded files instead of writing them.
        #[arg(long)]
        stdout: bool,
    },
    /// Print the lexically rewritten text and its marker positions.
    Rewrite {
        /// The marked source file.
        #[arg(required = true)]
        file: PathBuf,
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Show each fixed-point iteration as a coloured diff.
    Trace {
        /// The package directory.
        #[arg(required = true)]
        dir: PathBuf,
    },
    /// Show the syntax tree of a rewritten source file.
    Ast {
        /// The marked source file.
        #[arg(required = true)]
        file: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_options_follow_the_subcommand() {
        let args = CheckflowArgs::parse_from([
            "checkflow", "expand", "pkg", "--stdout", "--stubs", "a.json", "--stubs", "b.json", "-vv",
        ]);
        assert_eq!(args.stubs, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
        assert_eq!(args.verbose, 2);
        assert!(matches!(args.command, Command::Expand { stdout: true, .. }));
    }
}
