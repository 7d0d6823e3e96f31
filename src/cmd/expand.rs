use crate::reports;
use clap::Args;
use lensforge::api::Workbench;
use lensforge::config::Config;
use lensforge::error::{LensForgeError, LfResult};

#[derive(Args, Debug, Clone)]
pub struct ExpandArgs {
    /// System snapshot (JSON)
    #[arg(short, long)]
    pub system: String,

    /// Configuration id; the active one when omitted
    #[arg(short = 'c', long)]
    pub config_id: Option<String>,
}

pub fn run(args: ExpandArgs) -> LfResult<()> {
    let bench = Workbench::load_from_file(&args.system, Config::default())?;
    let expansion = bench.expand_config(args.config_id.as_deref())?;

    println!(
        "\n🧩 === EXPANSION: {} === 🧩",
        args.config_id.as_deref().unwrap_or("Current")
    );
    if !expansion.rows.is_empty() {
        reports::print_surface_table(&expansion.rows);
    }
    if !expansion.issues.is_empty() {
        reports::print_issues(&expansion.issues);
    }

    if expansion.has_fatal() {
        return Err(LensForgeError::Validation(format!(
            "{} fatal issue(s)",
            expansion.fatal_issues().count()
        )));
    }
    Ok(())
}
