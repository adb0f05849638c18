use std::process::ExitCode;

use clap::{ArgAction, Parser};

use strand_harness::{logging, run, Experiment, HarnessConfig, ThreadSpawner};

/// Run concurrency experiments against the strand primitives.
#[derive(Parser, Debug)]
#[command(name = "strand", version, about)]
struct Cli {
    /// Tasks incrementing each counter
    #[arg(long, default_value_t = 4)]
    tasks: usize,

    /// Increments per counter task
    #[arg(long, default_value_t = 10_000)]
    per_task: u64,

    /// Items each producer hands off
    #[arg(long, default_value_t = 100)]
    items: u64,

    /// Producer tasks for the hand-off experiment
    #[arg(long, default_value_t = 1)]
    producers: usize,

    /// Consumer tasks for the hand-off experiment
    #[arg(long, default_value_t = 1)]
    consumers: usize,

    /// Backoff rounds a consumer spins before parking
    #[arg(long, default_value_t = strand_queue::DEFAULT_SPIN_ITERS)]
    spin_iters: usize,

    /// Iterations of the timed loop
    #[arg(long, default_value_t = 1_000_000)]
    loop_iters: u64,

    /// Run only these experiments (repeatable)
    #[arg(long, value_enum)]
    only: Vec<Experiment>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    verbose: u8,

    /// Decrease log verbosity
    #[arg(short = 'q', long = "quiet", action = ArgAction::Count)]
    quiet: u8,
}

impl Cli {
    fn config(&self) -> HarnessConfig {
        HarnessConfig {
            tasks: self.tasks,
            per_task: self.per_task,
            items: self.items,
            producers: self.producers,
            consumers: self.consumers,
            spin_iters: self.spin_iters,
            loop_iters: self.loop_iters,
        }
    }

    fn experiments(&self) -> Vec<Experiment> {
        if self.only.is_empty() {
            Experiment::ALL.to_vec()
        } else {
            self.only.clone()
        }
    }

    fn verbosity(&self) -> i8 {
        let v = i8::try_from(self.verbose).unwrap_or(i8::MAX);
        let q = i8::try_from(self.quiet).unwrap_or(i8::MAX);
        v.saturating_sub(q)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbosity());

    let reports = match run(&ThreadSpawner::new(), &cli.config(), &cli.experiments()) {
        Ok(reports) => reports,
        Err(err) => {
            tracing::error!(%err, "harness aborted");
            eprintln!("error: {err}");
            let mut source = std::error::Error::source(&err);
            while let Some(cause) = source {
                eprintln!("  caused by: {cause}");
                source = cause.source();
            }
            return ExitCode::from(2);
        }
    };

    for report in &reports {
        println!("{report}");
    }

    let failed = reports.iter().filter(|r| !r.passed()).count();
    if failed == 0 {
        println!("All experiments passed.");
        ExitCode::SUCCESS
    } else {
        println!("{failed} of {} experiments failed.", reports.len());
        ExitCode::FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_config_default() {
        let cli = Cli::parse_from(["strand"]);
        assert_eq!(cli.config(), HarnessConfig::default());
        assert_eq!(cli.experiments(), Experiment::ALL.to_vec());
        assert_eq!(cli.verbosity(), 0);
    }

    #[test]
    fn only_and_verbosity() {
        let cli = Cli::parse_from([
            "strand", "--only", "handoff", "--only", "task-local", "-vvv", "-q",
        ]);
        assert_eq!(
            cli.experiments(),
            vec![Experiment::Handoff, Experiment::TaskLocal]
        );
        assert_eq!(cli.verbosity(), 2);
    }

    #[test]
    fn sizes_flow_into_config() {
        let cli = Cli::parse_from([
            "strand",
            "--producers",
            "3",
            "--consumers",
            "2",
            "--spin-iters",
            "0",
        ]);
        let config = cli.config();
        assert_eq!(config.producers, 3);
        assert_eq!(config.consumers, 2);
        assert_eq!(config.spin_iters, 0);
    }
}
