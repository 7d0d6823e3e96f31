use crate::reports;
use clap::Args;
use lensforge::api::Workbench;
use lensforge::config::Config;
use lensforge::error::LfResult;
use lensforge::merit::loader::load_operands;
use lensforge::merit::ExternalZernikeFit;
use lensforge::system::LiveTables;
use std::fs;

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[command(flatten)]
    pub config: Config,

    /// System snapshot (JSON)
    #[arg(short, long)]
    pub system: String,

    /// Merit editor rows (JSON or CSV)
    #[arg(short, long)]
    pub merit: String,

    /// Live host tables for the active configuration (JSON)
    #[arg(long)]
    pub live: Option<String>,

    /// Externally computed Zernike fits (JSON array)
    #[arg(long)]
    pub zernike_fits: Option<String>,

    /// Print the breakdown as JSON instead of tables
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub fn run(args: EvaluateArgs, config: Config) -> LfResult<()> {
    if !args.json {
        println!("\n🔭 Loading system: {}", args.system);
    }
    let mut bench = Workbench::load_from_file(&args.system, config)?;

    if let Some(path) = &args.live {
        let live: LiveTables = serde_json::from_str(&fs::read_to_string(path)?)?;
        bench = bench.with_live(live);
    }
    if let Some(path) = &args.zernike_fits {
        let fits: Vec<ExternalZernikeFit> = serde_json::from_str(&fs::read_to_string(path)?)?;
        bench.engine.external_fits = fits;
    }

    let mut operands = load_operands(&args.merit)?;
    let breakdown = bench.evaluate(&mut operands);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&breakdown)?);
        return Ok(());
    }

    println!("📋 {} operands from {}", operands.len(), args.merit);
    reports::print_merit_report(&breakdown);
    println!(
        "\nTotal merit: {:.6e}   (cache {} hits / {} misses)",
        breakdown.total, breakdown.cache_hits, breakdown.cache_misses
    );
    Ok(())
}
