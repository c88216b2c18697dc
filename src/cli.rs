//! Command-line parser.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "dinobot")]
#[command(about = "GroupMe dino responder and Twitter relay", long_about = None)]
#[command(version)]
pub struct Cli {
    /// TOML config file.
    #[arg(long, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Answer GroupMe callbacks.
    Serve,
    /// Run one feed relay pass and exit.
    Relay,
    /// Answer callbacks and relay on the configured schedule.
    Run,
    /// Create a feed bot in one of your groups.
    Register {
        access_token: String,
        group_id: String,
        /// Words are joined with single spaces.
        #[arg(required = true, num_args = 1..)]
        search_term: Vec<String>,
    },
    /// List your groups and feed bots.
    Bots { access_token: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("dinobot").chain(args.iter().copied()))
    }

    #[test]
    fn test_simple_commands() {
        assert_eq!(parse(&["serve"]).unwrap().command, Command::Serve);
        assert_eq!(parse(&["relay"]).unwrap().command, Command::Relay);
        assert_eq!(parse(&["run"]).unwrap().command, Command::Run);
        assert_eq!(parse(&["serve"]).unwrap().config, PathBuf::from("config.toml"));
    }

    #[test]
    fn test_config_flag_before_or_after_command() {
        let cli = parse(&["--config", "/etc/dinobot.toml", "relay"]).unwrap();
        assert_eq!(cli.command, Command::Relay);
        assert_eq!(cli.config, PathBuf::from("/etc/dinobot.toml"));

        let cli = parse(&["bots", "tok", "--config", "alt.toml"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Bots {
                access_token: "tok".to_string()
            }
        );
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
    }

    #[test]
    fn test_register_collects_search_words() {
        let cli = parse(&["register", "tok", "g1", "jurassic", "park"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Register {
                access_token: "tok".to_string(),
                group_id: "g1".to_string(),
                search_term: vec!["jurassic".to_string(), "park".to_string()],
            }
        );
    }

    #[test]
    fn test_bad_usage() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["fly"]).is_err());
        assert!(parse(&["serve", "extra"]).is_err());
        assert!(parse(&["register", "tok", "g1"]).is_err());
        assert!(parse(&["bots"]).is_err());
        assert!(parse(&["serve", "--config"]).is_err());
    }
}
