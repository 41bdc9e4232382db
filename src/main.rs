use clap::{Parser as ClapParser, Subcommand};
use spl_lang::cli::{self, CheckOptions, CliError};
use std::io::{self, Read};

#[derive(ClapParser)]
#[command(name = "spl")]
#[command(about = "spl - Compile Splunk-style search pipelines into query plans")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a query and print its plan as JSON
    Check {
        /// The query to compile (reads from stdin if not provided)
        query: Option<String>,

        /// Anchor relative times to this epoch millisecond instead of the clock
        #[arg(long)]
        now: Option<i64>,

        /// Pretty-print the output
        #[arg(short, long)]
        pretty: bool,

        /// Print the translated search tree instead of the full plan
        #[arg(long)]
        ast: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check {
            query,
            now,
            pretty,
            ast,
        } => run_check(query, now, pretty, ast),
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_check(query: Option<String>, now: Option<i64>, pretty: bool, ast: bool) -> Result<(), CliError> {
    let query = match query {
        Some(q) => q,
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer).map_err(CliError::Io)?;
            buffer
        }
        None => return Err(CliError::NoInput),
    };

    let options = CheckOptions {
        query,
        now,
        pretty,
        ast,
    };

    let result = cli::execute_check(&options)?;
    println!("{}", result.to_json(pretty)?);
    Ok(())
}
