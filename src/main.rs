mod cli;
mod decode;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use std::path::Path;

use cadenza::{analyze, AnalysisConfig, AnalysisResult};
use cli::Cli;
use decode::decode_audio;
use settings::{discover_config, load_config, Config};

#[derive(Serialize)]
struct FileResult {
    file: String,
    #[serde(flatten)]
    result: AnalysisResult,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Load config: explicit --config path, or auto-detect cadenza.toml / global config
    let file_config = match cli.config.clone().or_else(discover_config) {
        Some(path) => {
            let cfg = load_config(&path)?;
            log::info!("Loaded config from {}", path.display());
            cfg
        }
        None => Config::default(),
    };

    let mut analysis_config = file_config.analysis;
    cli.apply_overrides(&mut analysis_config);
    analysis_config.validate().context("Invalid analysis configuration")?;
    let pretty = cli.pretty || file_config.output.pretty;

    for input in &cli.inputs {
        if !input.exists() {
            anyhow::bail!("Input file not found: {}", input.display());
        }
    }

    let json = if let [input] = cli.inputs.as_slice() {
        let result = analyze_file(input, &analysis_config)?;
        to_json(&result, pretty)?
    } else {
        let pb = ProgressBar::new(cli.inputs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} files ({eta} remaining)")
                .context("Invalid progress bar template")?
                .progress_chars("=>-"),
        );

        // One worker per file; each analysis fans out across frames internally
        let results = cli
            .inputs
            .par_iter()
            .map(|input| {
                let result = analyze_file(input, &analysis_config)?;
                pb.inc(1);
                Ok(FileResult {
                    file: input.display().to_string(),
                    result,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        pb.finish_with_message("Analysis complete");
        to_json(&results, pretty)?
    };

    match cli.output {
        Some(ref path) => {
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write output: {}", path.display()))?;
            log::info!("Done! Output: {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn analyze_file(input: &Path, config: &AnalysisConfig) -> Result<AnalysisResult> {
    let signal = decode_audio(input)?;
    analyze(&signal, config).with_context(|| format!("Analysis failed for {}", input.display()))
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}
