use anyhow::{anyhow, Result};
use bridge_core::{AnchorStore, BridgeEngine};
use bridge_structs::{
    anchors::AnchorDataset,
    config::EngineConfig,
    core::{KVCache, WMatrix},
};
use bridge_utils::{jsonify, load_json_arg};
use clap::{arg, ArgMatches, Command};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const GATE_FAILED_EXIT_CODE: i32 = 2;

fn cli() -> Command {
    Command::new("bridge-verifier")
        .about("Aligns KV-caches across models and validates latent vectors against semantic anchors")
        .arg_required_else_help(true)
        .arg(
            arg!(--config [CONFIG] "Engine config json string or path to json file")
                .value_parser(clap::value_parser!(String))
                .global(true),
        )
        .arg(
            arg!(--anchors [ANCHORS] "Anchor dataset json string or path to json file")
                .value_parser(clap::value_parser!(String))
                .global(true),
        )
        .arg(arg!(-v --verbose "Log per-call metrics to stderr").global(true))
        .subcommand(
            Command::new("align_kv_cache")
                .about("Aligns a KV-cache into the target model's latent space")
                .arg(
                    arg!(<KV_CACHE> "KV-cache json string, path to json file, or '-' for stdin")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(<W_MATRIX> "W-Matrix json string or path to json file")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(<TARGET_MODEL> "Model the aligned cache is intended for")
                        .value_parser(clap::value_parser!(String)),
                ),
        )
        .subcommand(
            Command::new("validate_vector")
                .about("Scores a vector against the anchor set before packaging")
                .arg(
                    arg!(<VECTOR> "Vector json array, path to json file, or '-' for stdin")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(--"source-model" [SOURCE_MODEL] "Model the vector was produced by")
                        .value_parser(clap::value_parser!(String)),
                ),
        )
        .subcommand(
            Command::new("contrastive_loss")
                .about("Computes the InfoNCE loss of a vector with a category as the positive class")
                .arg(
                    arg!(<VECTOR> "Vector json array, path to json file, or '-' for stdin")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(<CATEGORY> "Anchor category, e.g. factual_knowledge")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(--"w-matrix" [W_MATRIX] "W-Matrix json string or path; adds the total loss")
                        .value_parser(clap::value_parser!(String)),
                ),
        )
        .subcommand(
            Command::new("orthogonality_loss")
                .about("Reports the orthogonality loss and fidelity estimates of a W-Matrix")
                .arg(
                    arg!(<W_MATRIX> "W-Matrix json string, path to json file, or '-' for stdin")
                        .value_parser(clap::value_parser!(String)),
                ),
        )
        .subcommand(
            Command::new("nearest_anchors")
                .about("Lists the anchors most similar to a vector")
                .arg(
                    arg!(<VECTOR> "Vector json array, path to json file, or '-' for stdin")
                        .value_parser(clap::value_parser!(String)),
                )
                .arg(
                    arg!(--k [K] "Number of anchors to return")
                        .value_parser(clap::value_parser!(usize))
                        .default_value("5"),
                ),
        )
        .subcommand(Command::new("export_anchors").about("Prints the anchor dataset in use"))
}

fn main() {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("verbose"));

    match run(&matches) {
        Ok(true) => {}
        Ok(false) => std::process::exit(GATE_FAILED_EXIT_CODE),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Returns `Ok(false)` when the command ran but the quality gate failed.
fn run(matches: &ArgMatches) -> Result<bool> {
    let config = match matches.get_one::<String>("config") {
        Some(arg) => load_json_arg::<EngineConfig>(arg)?,
        None => EngineConfig::default(),
    };
    config.validate()?;
    let dataset = match matches.get_one::<String>("anchors") {
        Some(arg) => load_json_arg::<AnchorDataset>(arg)?,
        None => AnchorDataset::builtin(),
    };

    if let Some(("export_anchors", _)) = matches.subcommand() {
        dataset.validate()?;
        print_json(&dataset)?;
        return Ok(true);
    }

    let store = AnchorStore::build(&dataset, config.anchor_dimension, &config.anchor_seed)?;
    debug!(
        version = store.version(),
        dimension = store.dimension(),
        "loaded anchors"
    );
    let engine = BridgeEngine::new(Arc::new(store), config)?;

    match matches.subcommand() {
        Some(("align_kv_cache", sub_m)) => align_kv_cache(
            &engine,
            required(sub_m, "KV_CACHE")?,
            required(sub_m, "W_MATRIX")?,
            required(sub_m, "TARGET_MODEL")?,
        ),
        Some(("validate_vector", sub_m)) => {
            let vector = load_json_arg::<Vec<f32>>(required(sub_m, "VECTOR")?)?;
            let source_model = sub_m.get_one::<String>("source-model").map(|s| s.as_str());
            print_json(&engine.validate_vector(&vector, source_model)?)?;
            Ok(true)
        }
        Some(("contrastive_loss", sub_m)) => {
            let vector = load_json_arg::<Vec<f32>>(required(sub_m, "VECTOR")?)?;
            let category = required(sub_m, "CATEGORY")?;
            let mut output = serde_json::json!({
                "category": category,
                "contrastiveLoss": engine.contrastive_loss(&vector, category)?,
                "temperature": engine.config().temperature,
            });
            if let Some(arg) = sub_m.get_one::<String>("w-matrix") {
                let w_matrix = load_json_arg::<WMatrix>(arg)?;
                output["totalLoss"] = engine.total_loss(&vector, category, &w_matrix)?.into();
            }
            print_json(&output)?;
            Ok(true)
        }
        Some(("orthogonality_loss", sub_m)) => {
            let w_matrix = load_json_arg::<WMatrix>(required(sub_m, "W_MATRIX")?)?;
            print_json(&engine.inspect_w_matrix(&w_matrix)?)?;
            Ok(true)
        }
        Some(("nearest_anchors", sub_m)) => {
            let vector = load_json_arg::<Vec<f32>>(required(sub_m, "VECTOR")?)?;
            let k = *sub_m
                .get_one::<usize>("k")
                .ok_or_else(|| anyhow!("Missing argument: k"))?;
            let outcome = engine.find_nearest(&vector, k)?;
            print_json(&serde_json::json!({
                "nearestAnchors": outcome.neighbours,
                "warnings": outcome.warnings,
            }))?;
            Ok(true)
        }
        _ => Err(anyhow!("Invalid subcommand")),
    }
}

fn align_kv_cache(
    engine: &BridgeEngine,
    kv_cache: &str,
    w_matrix: &str,
    target_model: &str,
) -> Result<bool> {
    let kv_cache = load_json_arg::<KVCache>(kv_cache)?;
    let w_matrix = load_json_arg::<WMatrix>(w_matrix)?;
    let result = engine.align_kv_cache(&kv_cache, &w_matrix, target_model)?;
    print_json(&result)?;
    if let Err(e) = result.ensure_passes(engine.config().quality_threshold) {
        eprintln!("{}", e);
        return Ok(false);
    }
    Ok(true)
}

fn required<'a>(sub_m: &'a ArgMatches, name: &str) -> Result<&'a str> {
    sub_m
        .get_one::<String>(name)
        .map(|s| s.as_str())
        .ok_or_else(|| anyhow!("Missing argument: {}", name))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", jsonify(value)?);
    Ok(())
}
