//! Q-CapsNets CLI
//!
//! # Usage
//!
//! ```bash
//! # Run the search and save the quantized configurations
//! qcapsnets search shallowcaps_mnist.yaml
//!
//! # Tighter memory budget, YAML summary
//! qcapsnets search shallowcaps_mnist.yaml --memory-budget-mb 0.1 --format yaml
//!
//! # Validate config
//! qcapsnets validate shallowcaps_mnist.yaml --detailed
//!
//! # Sensitivity ranking and layer table
//! qcapsnets rank shallowcaps_mnist.yaml
//! qcapsnets info shallowcaps_mnist.yaml
//! ```

use clap::Parser;
use qcapsnets::config::{
    apply_overrides, load_config, load_inputs, validate_config, Cli, Command, InfoArgs,
    OutputFormat, RankArgs, SearchArgs, ValidateArgs,
};
use qcapsnets::io::save_outcome;
use qcapsnets::model::{mb_to_bits, ModelSummary};
use qcapsnets::oracle::CommandOracle;
use qcapsnets::search::{quantize, QuantizationOutcome, QuantizationReport, SearchResult};
use serde::Serialize;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Configure output based on verbose/quiet flags
    let level = if cli.quiet {
        LevelFilter::ERROR
    } else if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Command::Search(args) => run_search(args),
        Command::Validate(args) => run_validate(args),
        Command::Rank(args) => run_rank(args),
        Command::Info(args) => run_info(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_search(args: SearchArgs) -> Result<(), String> {
    info!("Q-CapsNets: searching bit-widths from {}", args.config.display());

    let mut spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    apply_overrides(&mut spec, &args);
    validate_config(&spec).map_err(|e| format!("Validation failed: {e}"))?;

    let inputs = load_inputs(&spec).map_err(|e| format!("Input error: {e}"))?;
    let summary = ModelSummary::from_layers(&inputs.layers);

    if args.dry_run {
        info!(
            layers = inputs.layers.len(),
            baseline_mb = summary.baseline_mb(),
            budget_bits = mb_to_bits(spec.search.memory_budget_mb),
            min_required_bits = summary.min_required_bits(),
            "dry run - inputs loaded, no evaluations performed"
        );
        return Ok(());
    }

    let layers = inputs.layers.clone();
    let activation_scales = inputs.statistics.activation_scales.clone();
    let checkpoint = spec.model.checkpoint.clone();
    let report = quantize(
        inputs.layers,
        inputs.ranking,
        &spec.search.settings(),
        &spec.search.scheme,
        |scheme| {
            Ok(CommandOracle::new(
                &spec.evaluator.command,
                scheme.name(),
                layers.clone(),
                activation_scales,
            )?
            .with_checkpoint(&checkpoint))
        },
    )
    .map_err(|e| format!("Search error: {e}"))?;

    let paths = save_outcome(
        &report.outcome,
        &layers,
        &checkpoint,
        spec.output.dir.as_deref(),
        spec.output.format,
    )
    .map_err(|e| format!("Save error: {e}"))?;

    print_report(&report, args.format)?;
    for path in paths {
        info!("saved {}", path.display());
    }
    Ok(())
}

fn print_report(report: &QuantizationReport, format: OutputFormat) -> Result<(), String> {
    match format {
        OutputFormat::Text => {
            println!("Stages:");
            for stage in &report.stages {
                println!(
                    "  {:<22} accuracy {:>7.3}%  evaluations {:>3}",
                    stage.stage.to_string(),
                    stage.accuracy,
                    stage.evaluations
                );
            }
            println!();
            match &report.outcome {
                QuantizationOutcome::Satisfied(result) => {
                    println!("Accuracy and memory constraints satisfied:");
                    print_result(result);
                }
                QuantizationOutcome::Tradeoff {
                    memory_optimal,
                    accuracy_optimal,
                } => {
                    println!("Accuracy and memory constraints conflict.");
                    println!();
                    println!("Model-memory (fits the budget):");
                    print_result(memory_optimal);
                    println!();
                    println!("Model-accuracy (meets the accuracy floor):");
                    print_result(accuracy_optimal);
                }
            }
            println!();
            println!("Oracle evaluations: {}", report.evaluations());
            Ok(())
        }
        OutputFormat::Json | OutputFormat::Yaml => print_structured(&report.outcome, format),
    }
}

fn print_result(result: &SearchResult) {
    println!("  Weight bits:           {:?}", result.weight_bits);
    println!("  Activation bits:       {:?}", result.act_bits);
    println!("  Dynamic routing bits:  {:?}", result.dr_bits);
    println!("  Accuracy:              {:.3}%", result.accuracy);
    println!("  Memory reduction:      {:.2}x", result.memory_reduction);
}

fn print_structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<(), String> {
    let text = match format {
        OutputFormat::Yaml => serde_yaml::to_string(value)
            .map_err(|e| format!("YAML serialization error: {e}"))?,
        _ => serde_json::to_string_pretty(value)
            .map_err(|e| format!("JSON serialization error: {e}"))?,
    };
    println!("{text}");
    Ok(())
}

fn run_validate(args: ValidateArgs) -> Result<(), String> {
    info!("Validating config: {}", args.config.display());

    let spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    println!("Configuration is valid");

    if args.detailed {
        let inputs = load_inputs(&spec).map_err(|e| format!("Input error: {e}"))?;
        let summary = ModelSummary::from_layers(&inputs.layers);
        println!();
        println!("Configuration Summary:");
        println!("  Checkpoint: {}", spec.model.checkpoint.display());
        println!("  Topology: {} ({} leaf layers)", spec.model.topology.display(), inputs.layers.len());
        println!("  Weight statistics: {}", spec.statistics.weights.display());
        println!("  Activation statistics: {}", spec.statistics.activations.display());
        println!();
        println!("  Top accuracy: {}%", spec.search.top_accuracy);
        println!("  Accuracy tolerance: {}%", spec.search.accuracy_tolerance);
        println!("  Memory budget: {} MB", spec.search.memory_budget_mb);
        println!("  Scheme: {}", spec.search.scheme);
        println!("  Std multiplier: {}", spec.search.std_multiplier);
        println!();
        println!("  Evaluator: {}", spec.evaluator.command.join(" "));
        let budget_bits = mb_to_bits(spec.search.memory_budget_mb);
        if budget_bits < summary.min_required_bits() {
            println!(
                "  Warning: budget of {budget_bits} bits is below the {} bits needed at 1 bit per weight",
                summary.min_required_bits()
            );
        }
    }

    Ok(())
}

fn run_rank(args: RankArgs) -> Result<(), String> {
    let spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    let inputs = load_inputs(&spec).map_err(|e| format!("Input error: {e}"))?;

    match args.format {
        OutputFormat::Text => {
            println!("Weight rank (descending SQNR):");
            for &i in &inputs.ranking.weight_rank {
                println!(
                    "  {:<24} {:>10.3}",
                    inputs.layers[i].name, inputs.statistics.weight_sqnr[i]
                );
            }
            println!();
            println!("Activation groups (ascending SQNR):");
            for (g, group) in inputs.ranking.act_groups.iter().enumerate() {
                let names: Vec<&str> = group.iter().map(|&i| inputs.layers[i].name.as_str()).collect();
                println!("  group {g}: {}", names.join(", "));
            }
            Ok(())
        }
        format => print_structured(&inputs.ranking, format),
    }
}

fn run_info(args: InfoArgs) -> Result<(), String> {
    let spec = load_config(&args.config).map_err(|e| format!("Config error: {e}"))?;
    let inputs = load_inputs(&spec).map_err(|e| format!("Input error: {e}"))?;
    let summary = ModelSummary::from_layers(&inputs.layers);

    match args.format {
        OutputFormat::Text => {
            println!("Layers:");
            println!(
                "  {:>3}  {:<24} {:>12} {:>10} {:>8}",
                "#", "name", "weights", "scale", "routing"
            );
            for layer in &inputs.layers {
                let routing = if layer.is_capsule_with_routing {
                    layer.routing_iterations.to_string()
                } else {
                    "-".to_string()
                };
                println!(
                    "  {:>3}  {:<24} {:>12} {:>10.4} {:>8}",
                    layer.index,
                    layer.name,
                    layer.weight_count,
                    layer.weight_scale_factor.unwrap_or(0.0),
                    routing
                );
            }
            println!();
            println!("Parameters: {}", summary.total_parameters);
            println!("Baseline memory: {:.4} MB", summary.baseline_mb());
            println!("Minimum memory (1 bit/weight): {} bits", summary.min_required_bits());
            Ok(())
        }
        format => print_structured(&inputs.layers, format),
    }
}
