mod args;
mod survey;

use clap::Parser;
use log::{debug, info, LevelFilter};
use serde_json::json;
use serde_json::Value as JSValue;
use snafu::{ErrorCompat, ResultExt};

use crate::args::{Args, Command};
use crate::survey::config_reader::{
    parse_input_type, read_column_contract, read_config, PipelineConfig,
};
use crate::survey::feedback::{check_reference, load_bundle};
use crate::survey::io_gemini::GeminiClient;
use crate::survey::summary::SummaryResult;
use crate::survey::*;

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    } else if std::env::var("RUST_LOG").is_err() {
        builder.filter_level(LevelFilter::Warn);
    }
    builder.init();
}

fn load_config(args: &Args) -> PResult<PipelineConfig> {
    let mut config = match args.config.as_ref() {
        Some(path) => read_config(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(input_type) = args.input_type.as_ref() {
        config.provider = parse_input_type(input_type)?;
    }
    if let Some(column) = args.wave_column.as_ref() {
        config.wave_column_name = column.clone();
    }
    debug!("load_config: {:?}", config);
    Ok(config)
}

fn generator(config: &PipelineConfig) -> PResult<GeminiClient> {
    GeminiClient::from_env(config).context(GenerationUnavailableSnafu)
}

fn print_json(js: &JSValue) -> PResult<()> {
    let pretty = serde_json::to_string_pretty(js).context(SerializingArtifactSnafu {
        path: "<stdout>",
    })?;
    println!("{}", pretty);
    Ok(())
}

fn stats_js(stats: &cleaning::CleaningStats) -> JSValue {
    json!({
        "rowsRead": stats.rows_read,
        "rowsInWave": stats.rows_in_wave,
        "rowsIncomplete": stats.rows_incomplete,
        "rowsKept": stats.rows_kept,
    })
}

fn summary_js(summary: &SummaryResult, config: &PipelineConfig) -> PResult<JSValue> {
    let js = serde_json::to_value(summary).context(SerializingArtifactSnafu {
        path: "<summary>",
    })?;
    Ok(json!({
        "summaryPath": config.summary_output_file,
        "summary": js,
    }))
}

fn run(args: &Args) -> PResult<()> {
    let mut config = load_config(args)?;
    match &args.command {
        Command::Extract {
            locator,
            wave,
            out,
            reference,
        } => {
            if let Some(out) = out {
                config.feedback_output_file = out.clone();
            }
            let contract = read_column_contract(&config.column_contract_file)?;
            let source = open_sheet_source(&config, locator)?;
            let request = ExtractionRequest {
                locator: locator.clone(),
                wave_label: wave.clone(),
            };
            let (sheet, _) = extract_feedback(&request, &config, &contract, source.as_ref())?;
            print_json(&json!({
                "sheetId": sheet.sheet_id,
                "feedbackBundlePath": config.feedback_output_file,
                "stats": stats_js(&sheet.stats),
            }))?;
            if let Some(reference) = reference {
                check_reference(&config.feedback_output_file, reference)?;
            }
        }
        Command::Summarize { bundle, out } => {
            if let Some(out) = out {
                config.summary_output_file = Some(out.clone());
            }
            let bundle_path = bundle
                .clone()
                .unwrap_or_else(|| config.feedback_output_file.clone());
            let bundle = load_bundle(&bundle_path)?;
            let client = generator(&config)?;
            let summary = summarize_and_store(&bundle, &config, &client)?;
            print_json(&summary_js(&summary, &config)?)?;
        }
        Command::Score {
            locator,
            waves,
            by_wave,
        } => {
            let contract = read_column_contract(&config.column_contract_file)?;
            let source = open_sheet_source(&config, locator)?;
            match (*by_wave, waves.as_slice()) {
                (false, [wave]) => {
                    let request = ExtractionRequest {
                        locator: locator.clone(),
                        wave_label: wave.clone(),
                    };
                    let sheet =
                        load_cleaned_records(&request, &config, &contract, source.as_ref())?;
                    let outcome = score_records(&sheet.records, &config)?;
                    print_json(&scoring::score_outcome_to_json(&outcome))?;
                }
                _ => {
                    let outcome =
                        score_waves(locator, waves, &config, &contract, source.as_ref())?;
                    if *by_wave {
                        print_json(&scoring::wave_outcome_to_json(&outcome))?;
                    } else {
                        print_json(&scoring::score_outcome_to_json(&outcome.overall))?;
                    }
                }
            }
        }
        Command::Insights { bundle } => {
            let bundle_path = bundle
                .clone()
                .unwrap_or_else(|| config.feedback_output_file.clone());
            let bundle = load_bundle(&bundle_path)?;
            let res = insights::analyze_feedback(&bundle);
            let js = serde_json::to_value(&res).context(SerializingArtifactSnafu {
                path: "<insights>",
            })?;
            print_json(&js)?;
        }
        Command::Run { locator, wave } => {
            let contract = read_column_contract(&config.column_contract_file)?;
            let source = open_sheet_source(&config, locator)?;
            let client = generator(&config)?;
            let request = ExtractionRequest {
                locator: locator.clone(),
                wave_label: wave.clone(),
            };
            let outcome = run_extraction(&request, &config, &contract, source.as_ref(), &client)?;
            let mut js = summary_js(&outcome.summary, &config)?;
            js["sheetId"] = json!(outcome.sheet_id);
            js["feedbackBundlePath"] = json!(outcome.feedback_bundle_path);
            js["stats"] = stats_js(&outcome.stats);
            print_json(&js)?;
        }
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);
    info!("args: {:?}", args);

    if let Err(e) = run(&args) {
        eprintln!("An error occurred: {}", e);
        for cause in e.iter_chain().skip(1) {
            eprintln!("  caused by: {}", cause);
        }
        std::process::exit(1);
    }
}
