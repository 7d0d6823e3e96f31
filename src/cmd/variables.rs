use crate::reports;
use clap::Args;
use lensforge::api::Workbench;
use lensforge::config::Config;
use lensforge::error::LfResult;
use lensforge::merit::loader::load_operands;

#[derive(Args, Debug, Clone)]
pub struct VariablesArgs {
    #[command(flatten)]
    pub config: Config,

    /// System snapshot (JSON)
    #[arg(short, long)]
    pub system: String,

    /// Merit rows; when given, the objective at the current values is printed
    #[arg(short, long)]
    pub merit: Option<String>,
}

pub fn run(args: VariablesArgs, config: Config) -> LfResult<()> {
    let bench = Workbench::load_from_file(&args.system, config)?;
    let vars = bench.variables();

    println!("\n🎛️  === DESIGN VARIABLES ({}) === 🎛️", vars.len());
    if vars.is_empty() {
        println!("No parameters are marked V.");
        return Ok(());
    }
    reports::print_variables(&vars);

    if let Some(path) = &args.merit {
        let operands = load_operands(path)?;
        let objective = bench.objective(&operands);
        let x0 = objective.x0();
        let value = objective.value(&x0)?;
        let residuals = objective.residuals(&x0)?;
        println!(
            "\nObjective at current values: {:.6e}   ({} residuals)",
            value,
            residuals.len()
        );
    }
    Ok(())
}
