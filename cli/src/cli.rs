use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[clap(name = "market-advisor", version, about = "Snapshot collector and LLM trade-setup advisor")]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll the exchange and append snapshots until ctrl-c
    Collect,

    /// Build the Market State and ask the model for ranked setups
    Analyze {
        /// Print the Market State that would be sent and stop
        #[clap(long)]
        dry_run: bool,
    },

    /// Show what the snapshot store holds
    Status,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["market-advisor", "analyze", "--dry-run"]).unwrap();
        assert!(matches!(cli.command, Command::Analyze { dry_run: true }));

        let cli = Cli::try_parse_from(["market-advisor", "analyze"]).unwrap();
        assert!(matches!(cli.command, Command::Analyze { dry_run: false }));

        let cli = Cli::try_parse_from(["market-advisor", "status"]).unwrap();
        assert!(matches!(cli.command, Command::Status));
    }

    #[test]
    fn rejects_unknown_subcommand() {
        assert!(Cli::try_parse_from(["market-advisor", "trade"]).is_err());
        assert!(Cli::try_parse_from(["market-advisor"]).is_err());
    }
}
