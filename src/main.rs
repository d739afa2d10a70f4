//! Gene panels worker main executable

pub mod common;
pub mod conf;
pub mod err;
pub mod panels;
pub mod server;
pub mod vocab;

use clap::{Args, Parser, Subcommand};
use console::{Emoji, Term};

/// CLI parser based on clap.
#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Gene panels from phenotype terms",
    long_about = "This tool ranks candidate genes by the phenotype terms they explain"
)]
struct Cli {
    /// Commonly used arguments
    #[command(flatten)]
    common: common::Args,

    /// The sub command to run
    #[command(subcommand)]
    command: Commands,
}

/// Enum supporting the parsing of top-level commands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Gene panel related commands.
    Panels(Panels),
    /// Server related commands.
    Server(Server),
}

/// Parsing of "panels *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Panels {
    /// The sub command to run
    #[command(subcommand)]
    command: PanelsCommands,
}

/// Enum supporting the parsing of "panels *" sub commands.
#[derive(Debug, Subcommand)]
enum PanelsCommands {
    Query(panels::cli::Args),
}

/// Parsing of "server *" sub commands.
#[derive(Debug, Args)]
#[command(args_conflicts_with_subcommands = true)]
struct Server {
    /// The sub command to run
    #[command(subcommand)]
    command: ServerCommands,
}

/// Enum supporting the parsing of "server *" sub commands.
#[derive(Debug, Subcommand)]
enum ServerCommands {
    Rest(server::rest::Args),
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Build a tracing subscriber according to the configuration in `cli.common`.
    let collector = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(match cli.common.verbose.log_level() {
            Some(level) => match level {
                log::Level::Error => tracing::Level::ERROR,
                log::Level::Warn => tracing::Level::WARN,
                log::Level::Info => tracing::Level::INFO,
                log::Level::Debug => tracing::Level::DEBUG,
                log::Level::Trace => tracing::Level::TRACE,
            },
            None => tracing::Level::INFO,
        })
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    // Install collector and go into sub commands.
    let term = Term::stderr();
    tracing::subscriber::with_default(collector, || {
        match &cli.command {
            Commands::Panels(panels) => match &panels.command {
                PanelsCommands::Query(args) => panels::cli::run(&cli.common, args)?,
            },
            Commands::Server(server) => match &server.command {
                ServerCommands::Rest(args) => server::rest::run(&cli.common, args)?,
            },
        }

        Ok::<(), anyhow::Error>(())
    })?;
    term.write_line(&format!("All done. Have a nice day!{}", Emoji(" 😃", "")))?;

    Ok(())
}

#[cfg(test)]
mod test {
    use clap::Parser;
    use pretty_assertions::assert_eq;

    use super::{Cli, Commands, PanelsCommands, ServerCommands};

    #[test]
    fn parse_panels_query() -> Result<(), anyhow::Error> {
        let cli = Cli::try_parse_from([
            "gene-panels-worker",
            "-v",
            "panels",
            "query",
            "--path-conf",
            "conf.toml",
            "--present-term",
            "HP:0001250",
            "--present-term",
            "HP:0001263",
            "--rejected-gene",
            "SCN1A",
            "--limit",
            "10",
        ])?;

        match cli.command {
            Commands::Panels(panels) => match panels.command {
                PanelsCommands::Query(args) => {
                    assert_eq!(args.present_term, vec!["HP:0001250", "HP:0001263"]);
                    assert_eq!(args.rejected_gene, vec!["SCN1A"]);
                    assert_eq!(args.limit, Some(10));
                    assert_eq!(args.start_page, None);
                }
            },
            _ => panic!("unexpected command"),
        }
        assert_eq!(cli.common.verbose.log_level(), Some(log::Level::Debug));

        Ok(())
    }

    #[rstest::rstest]
    #[case("--present-term", "HP:0001250")]
    #[case("--absent-term", "HP:0002133")]
    #[case("--rejected-gene", "SCN1A")]
    fn patient_conflicts_with_terms(#[case] flag: &str, #[case] value: &str) {
        let result = Cli::try_parse_from([
            "gene-panels-worker",
            "panels",
            "query",
            "--path-conf",
            "conf.toml",
            "--path-patient-json",
            "p.json",
            flag,
            value,
        ]);

        assert!(result.is_err(), "{}", flag);
    }

    #[test]
    fn parse_server_rest() -> Result<(), anyhow::Error> {
        let cli = Cli::try_parse_from([
            "gene-panels-worker",
            "server",
            "rest",
            "--path-conf",
            "conf.toml",
            "--listen-port",
            "9000",
        ])?;

        match cli.command {
            Commands::Server(server) => match server.command {
                ServerCommands::Rest(args) => {
                    assert_eq!(args.listen_port, Some(9000));
                    assert_eq!(args.listen_host, None);
                }
            },
            _ => panic!("unexpected command"),
        }

        Ok(())
    }
}
