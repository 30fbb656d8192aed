//! kiln-stage1: export document collections as flat, all-string Parquet.
//!
//! Usage:
//!   # Process every collection dumped under ./dumps
//!   kiln-stage1 ./dumps --output-dir ./exports/stage1
//!
//!   # Process a subset
//!   kiln-stage1 ./dumps --collections orders,users
//!
//!   # Tune classification
//!   kiln-stage1 ./dumps --sample-cap 500 --nested-threshold 25.0

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::Result;
use clap::Parser;
use kiln::{BatchSummary, DumpStore, Stage1Pipeline, StageConfig};

#[derive(Parser, Debug)]
#[command(name = "kiln-stage1")]
#[command(about = "Flatten document collection dumps into Parquet artifacts", long_about = None)]
struct Args {
    /// Directory of <collection>.jsonl dump files
    #[arg(value_name = "DUMP_DIR")]
    dump_dir: String,

    /// Output directory for stage-1 artifacts (default: ./exports/stage1)
    #[arg(long, short = 'o')]
    output_dir: Option<String>,

    /// Comma-separated collection names; all collections if omitted
    #[arg(long)]
    collections: Option<String>,

    /// Maximum documents sampled per collection when classifying (default: 100)
    #[arg(long)]
    sample_cap: Option<usize>,

    /// Nested-document percentage above which a collection is flattened
    /// (default: 10.0)
    #[arg(long)]
    nested_threshold: Option<f64>,

    /// Separator for flattened column names (default: "_")
    #[arg(long)]
    separator: Option<String>,

    /// Print the run summary as JSON instead of text
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let args = Args::parse();

    let mut config = StageConfig::default();
    if let Some(cap) = args.sample_cap {
        config.sample_cap = cap;
    }
    if let Some(threshold) = args.nested_threshold {
        config.nested_threshold = threshold;
    }
    if let Some(sep) = args.separator {
        config.separator = sep;
    }

    let output_dir = args
        .output_dir
        .unwrap_or_else(|| String::from("exports/stage1"));

    // The store handle is the connection: opened once per invocation,
    // released when it drops, on success and failure alike.
    let store = DumpStore::open(&args.dump_dir)?;
    let pipeline = Stage1Pipeline::new(config, &output_dir)?;

    let summary = if let Some(names) = args.collections {
        let names: Vec<String> = names
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        pipeline.run(&store, &names)?
    } else {
        pipeline.run_all(&store)?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    if summary.succeeded < summary.total {
        std::process::exit(1);
    }
    Ok(())
}

fn print_summary(summary: &BatchSummary) {
    println!("{}", "=".repeat(60));
    println!("PROCESSING SUMMARY");
    println!("{}", "=".repeat(60));
    println!("Total collections: {}", summary.total);
    println!("Successful: {}", summary.succeeded);
    println!("Failed: {}", summary.failed.len());
    if summary.total > 0 {
        println!(
            "Success rate: {:.1}%",
            summary.succeeded as f64 / summary.total as f64 * 100.0
        );
    }

    if !summary.failed.is_empty() {
        println!("\nFailed collections:");
        for name in &summary.failed {
            println!("  - {}", name);
        }
    }
    println!("{}", "=".repeat(60));
}
