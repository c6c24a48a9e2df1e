use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;

use mucalc_rs::checker::{check, Algorithm, Options};
use mucalc_rs::labels::LabelTable;
use mucalc_rs::lts::Lts;
use mucalc_rs::parser::parse;

#[derive(Debug, Parser)]
#[command(author, version, about = "Mu-calculus model checker for labelled transition systems")]
struct Cli {
    /// LTS in Aldebaran format.
    #[arg(value_name = "LTS")]
    lts: PathBuf,

    /// Mu-calculus formula.
    #[arg(value_name = "FORMULA")]
    formula: PathBuf,

    /// Verbose mode: print each evaluated subformula (-v), and its states (-vv).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Fixpoint algorithm: emerson-lei or naive.
    #[arg(short, long, value_name = "ALGORITHM", default_value = "emerson-lei")]
    algorithm: Algorithm,

    /// Output each satisfying state on a separate line.
    #[arg(short = 's', long)]
    print_states: bool,

    /// Do not print evaluation statistics.
    #[arg(short, long)]
    no_stats: bool,

    /// Maximum number of threads evaluating in parallel.
    #[arg(short, long, value_name = "INT", default_value = "1")]
    threads: usize,
}

/// Exit status when the run fails before a verdict is reached.
/// Statuses 0 and 1 carry the verdict.
const EXIT_ERROR: u8 = 2;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = init(&cli).and_then(|()| run(&cli));
    if let Err(e) = &result {
        eprintln!("Error: {:?}", e);
    }
    ExitCode::from(exit_status(&result))
}

fn exit_status(result: &Result<bool>) -> u8 {
    match result {
        Ok(holds) => *holds as u8,
        Err(_) => EXIT_ERROR,
    }
}

fn init(cli: &Cli) -> Result<()> {
    color_eyre::install()?;

    let level = match cli.verbose {
        0 => simplelog::LevelFilter::Warn,
        1 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )?;
    Ok(())
}

/// Checks the formula and prints the report. Returns whether the initial
/// state satisfies the formula.
fn run(cli: &Cli) -> Result<bool> {
    let time_total = std::time::Instant::now();

    let mut labels = LabelTable::new();
    let lts = Lts::load(&cli.lts, &mut labels).wrap_err_with(|| format!("cannot read LTS '{}'", cli.lts.display()))?;
    log::info!(
        "Loaded LTS with {} states, {} transitions, {} labels",
        lts.num_states(),
        lts.num_transitions(),
        labels.len()
    );

    let source = std::fs::read_to_string(&cli.formula)
        .wrap_err_with(|| format!("cannot open '{}'", cli.formula.display()))?;
    let formula = parse(&source).wrap_err_with(|| format!("cannot parse formula '{}'", cli.formula.display()))?;
    log::info!("Formula of size {}: {}", formula.size(), formula);

    let options = Options {
        algorithm: cli.algorithm,
        threads: cli.threads,
    };
    let report = check(&lts, &mut labels, &formula, &options)?;
    log::info!("Checked in {:.3} s", time_total.elapsed().as_secs_f64());

    // The report is rendered in full before anything reaches stdout.
    let out = report.render(cli.print_states, !cli.no_stats);
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(out.as_bytes())?;
    stdout.flush()?;

    Ok(report.initial_holds)
}

#[cfg(test)]
mod tests {
    use super::*;

    use color_eyre::eyre::eyre;

    fn cli(lts: &str, formula: &str) -> Cli {
        Cli::parse_from(["mucalc", lts, formula])
    }

    #[test]
    fn test_exit_status() {
        assert_eq!(exit_status(&Ok(true)), 1);
        assert_eq!(exit_status(&Ok(false)), 0);
        assert_eq!(exit_status(&Err(eyre!("cannot read LTS"))), EXIT_ERROR);
        assert_ne!(EXIT_ERROR, 1);
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let dir = std::env::temp_dir();
        let missing = dir.join("mucalc-no-such-file.aut");
        let result = run(&cli(missing.to_str().unwrap(), "formula.mcf"));
        assert!(result.is_err());
        assert_eq!(exit_status(&result), EXIT_ERROR);
    }

    #[test]
    fn test_run_verdict() {
        let dir = std::env::temp_dir().join(format!("mucalc-run-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let lts = dir.join("one.aut");
        let formula = dir.join("reach.mcf");
        std::fs::write(&lts, "des (0,1,2)\n(0,\"a\",1)\n").unwrap();
        std::fs::write(&formula, "% eventually a\nmu X. X || <a>true\n").unwrap();

        let result = run(&cli(lts.to_str().unwrap(), formula.to_str().unwrap()));
        assert_eq!(exit_status(&result), 1);

        std::fs::write(&formula, "[a]false").unwrap();
        let result = run(&cli(lts.to_str().unwrap(), formula.to_str().unwrap()));
        assert_eq!(exit_status(&result), 0);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
