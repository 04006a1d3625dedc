use std::{
    env, fs,
    io::{self, BufRead},
    path::PathBuf,
    process,
};

use anyhow::{Context, bail};
use federated::{config::FederatedConfig, experiment::Experiment};
use log::info;

const USAGE: &str = "Usage: federated-orchestra [config.json] [--predict] [--report <report.json>]";

/// The command line arguments.
#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    predict: bool,
    report: Option<PathBuf>,
}

impl Args {
    fn parse<I: IntoIterator<Item = String>>(args: I) -> anyhow::Result<Self> {
        let mut parsed = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--predict" => parsed.predict = true,
                "--report" => {
                    let path = args.next().context("--report expects a path")?;
                    parsed.report = Some(path.into());
                }
                "-h" | "--help" => {
                    println!("{USAGE}");
                    process::exit(0);
                }
                flag if flag.starts_with('-') => bail!("unknown flag {flag}\n{USAGE}"),
                path if parsed.config.is_none() => parsed.config = Some(path.into()),
                extra => bail!("unexpected argument {extra}\n{USAGE}"),
            }
        }

        Ok(parsed)
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = Args::parse(env::args().skip(1))?;
    let config = match &args.config {
        Some(path) => FederatedConfig::from_json_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => FederatedConfig::default(),
    };

    info!("running with {config:?}");
    let experiment = Experiment::new(config)?;
    let (comparison, model) = experiment.run_and_keep_model()?;

    println!("{comparison}");

    if let Some(path) = &args.report {
        fs::write(path, comparison.to_json()?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("report written to {}", path.display());
    }

    if args.predict {
        println!("\nPrediction Mode:");

        let mut predictor = experiment.predictor(model);
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();

        loop {
            if predictor.prompt(&mut input, &mut output)?.is_none() {
                break;
            }

            println!("\nPredict another sample? [y/N]");
            let mut answer = String::new();
            if input.read_line(&mut answer)? == 0 || !answer.trim().eq_ignore_ascii_case("y") {
                break;
            }
        }
    }

    Ok(())
}
