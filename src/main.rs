use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser, Subcommand};
use lensforge::config::Config;
use lensforge::error::{LensForgeError, LfResult};
use std::process;
use tracing::{error, info, warn, Level};

mod cmd;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON file with engine settings; explicit flags override it
    #[arg(global = true, long)]
    settings: Option<String>,

    #[arg(global = true, long, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Evaluate(cmd::evaluate::EvaluateArgs),
    Expand(cmd::expand::ExpandArgs),
    Variables(cmd::variables::VariablesArgs),
}

fn main() {
    // 1. Parse raw matches so explicit flags can be told apart from defaults
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    let level = if cli.debug { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    // 2. Resolve engine settings: file first, CLI flags on top
    let (cli_config, sub_name) = match &cli.command {
        Commands::Evaluate(args) => (Some(&args.config), "evaluate"),
        Commands::Variables(args) => (Some(&args.config), "variables"),
        Commands::Expand(_) => (None, "expand"),
    };
    let config = match cli_config {
        Some(c) => resolve_config(cli.settings.as_deref(), c, matches.subcommand_matches(sub_name)),
        None => Ok(Config::default()),
    }
    .and_then(|c| c.validate().map(|()| c));
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            error!("{e}");
            eprintln!("\n❌ {e}");
            process::exit(1);
        }
    };

    // 3. Execute
    let result = match cli.command {
        Commands::Evaluate(args) => cmd::evaluate::run(args, config),
        Commands::Expand(args) => cmd::expand::run(args),
        Commands::Variables(args) => cmd::variables::run(args, config),
    };

    if let Err(e) = result {
        error!("{e}");
        eprintln!("\n❌ {e}");
        process::exit(1);
    }
}

fn resolve_config(
    path: Option<&str>,
    cli_config: &Config,
    sub_matches: Option<&ArgMatches>,
) -> LfResult<Config> {
    let Some(path) = path else {
        return Ok(cli_config.clone());
    };
    info!("⚙️  Loading settings from: {}", path);
    match Config::load_from_file(path) {
        Ok(mut file_config) => {
            if let Some(m) = sub_matches {
                file_config.merge_from_cli(cli_config, m);
            }
            Ok(file_config)
        }
        Err(LensForgeError::Io(e)) => {
            warn!("⚠️  cannot read {path}: {e}. Using command-line settings.");
            Ok(cli_config.clone())
        }
        Err(e) => Err(e),
    }
}
