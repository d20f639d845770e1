use anyhow::{bail, Context, Result};
use clap::Parser;
use dl4jgraph::inference::{expected_input_len, fit_length, random_input, select_starts};
use dl4jgraph::loader::sample::{build_sample_archive, SAMPLE_FILE_NAME};
use dl4jgraph::{run_inference, DecodeOptions, Dl4jDecoder, ImportResult, InferenceInput, InferenceOptions};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dl4jgraph")]
#[command(about = "Inspect exported DL4J model archives")]
#[command(version)]
struct Args {
    /// Model archive (.zip) or configuration (.json)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Write the decoded result as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Show summary only
    #[arg(long, default_value_t = false)]
    summary: bool,

    /// Run the approximate forward pass with random inputs
    #[arg(long, default_value_t = false)]
    infer: bool,

    /// Seed for synthetic weights and random inputs
    #[arg(long)]
    seed: Option<u64>,

    /// JSON file with decode options
    #[arg(long)]
    options: Option<PathBuf>,

    /// Write the built-in sample archive to this path
    #[arg(long)]
    sample: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut options = match &args.options {
        Some(path) => DecodeOptions::from_json_file(path)
            .with_context(|| format!("Failed to read options: {}", path.display()))?,
        None => DecodeOptions::default(),
    };
    if let Some(seed) = args.seed {
        options = options.with_seed(seed);
    }

    if let Some(path) = &args.sample {
        let bytes = build_sample_archive(options.seed).context("Failed to build sample archive")?;
        std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote sample archive to {}", path.display());
    }

    let decoder = Dl4jDecoder::new(options);
    let result = match (&args.input, &args.sample) {
        (Some(path), _) => {
            let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            decoder
                .decode(&file_name, &bytes)
                .with_context(|| format!("Failed to decode model: {}", path.display()))?
        }
        (None, Some(path)) => {
            let bytes = std::fs::read(path)?;
            decoder.decode(SAMPLE_FILE_NAME, &bytes)?
        }
        (None, None) => bail!("either --input or --sample is required"),
    };

    print_summary(&result);
    if !args.summary {
        print_layers(&result);
    }

    if args.infer {
        print_inference(&result, decoder.options().seed);
    }

    if let Some(path) = &args.output {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("\nWrote result to {}", path.display());
    }

    Ok(())
}

fn print_summary(result: &ImportResult) {
    let s = &result.summary;
    println!("dl4jgraph v{}", env!("CARGO_PKG_VERSION"));
    println!("Model: {} ({})", result.model.name, result.model.source_file_name);
    println!("\n=== Summary ===");
    println!("Layers: {}", s.num_layers);
    println!("Total parameters: {}", s.total_parameters);
    println!("Layers with weights: {}", s.layers_with_weights);
    println!("Binary weights: {}", s.has_binary_weights);
    println!("Updater state: {}", s.has_updater_state);
    if let Some(binary) = s.binary_parameters {
        println!(
            "Binary parameters: {} (ratio {:.4}, mismatch {})",
            binary,
            s.parameter_match_ratio.unwrap_or_default(),
            s.parameter_mismatch.unwrap_or_default()
        );
    }
    println!("Shape inference passes: {}", s.shape_inference_passes);

    if !s.skipped_items.is_empty() {
        println!("\n=== Skipped ===");
        for item in &s.skipped_items {
            println!("  - {}", item);
        }
    }
    if !s.unresolved_dimensions.is_empty() {
        println!("\n=== Unresolved dimensions ===");
        for item in &s.unresolved_dimensions {
            println!("  - {}", item);
        }
    }
}

fn print_layers(result: &ImportResult) {
    println!("\n=== Layers ===");
    for layer in &result.layers {
        println!(
            "  {:24} {:40} in={:8} out={:8} params={}",
            layer.name,
            layer.layer_type.rsplit('.').next().unwrap_or(&layer.layer_type),
            layer.input_shape.as_deref().unwrap_or("-"),
            layer.output_shape.as_deref().unwrap_or("-"),
            layer.num_parameters
        );
        for stat in result.stats_for(layer) {
            println!(
                "      {:6} {:9} n={:6} min={:+.4} max={:+.4} mean={:+.4} std={:.4}",
                stat.parameter_group.as_str(),
                format!("{:?}", stat.provenance).to_lowercase(),
                stat.num_values,
                stat.min,
                stat.max,
                stat.mean,
                stat.std_dev
            );
        }
    }
}

fn print_inference(result: &ImportResult, seed: u64) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let options = InferenceOptions::default();
    let starts = select_starts(&result.layers, &options);
    let len_a = starts.and_then(|(a, _)| expected_input_len(a));
    let len_b = starts.and_then(|(_, b)| expected_input_len(b)).or(len_a);

    let input = InferenceInput {
        branch_a: fit_length(random_input(len_a.unwrap_or(16), 1.0, &mut rng), len_a),
        branch_b: fit_length(random_input(len_b.unwrap_or(16), 1.0, &mut rng), len_b),
    };
    let inference = run_inference(&result.layers, &input, &options);

    println!("\n=== Inference ===");
    for output in &inference.layer_outputs {
        println!("  {:24} len={}", output.layer, output.values.len());
    }
    println!("Final output: {:?}", inference.final_output);
    for warning in &inference.warnings {
        println!("  warning: {}", warning);
    }
}
