//! SCC Optimizer Driver
//!
//! Command-line front to the SSA layer: builds one of the sample modules,
//! runs the selected optimization passes over it, verifies the result and
//! prints it as text or JSON.

use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info};
use scc_common::{SsaError, TargetInfo};
use scc_ssa::{print_module, sample, try_optimize, verify_module, OptimizerOptions, SAMPLE_NAMES};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "scc")]
#[command(about = "SCC SSA optimizer")]
#[command(version = "0.1.0")]
struct Cli {
    /// Log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in sample modules
    List,

    /// Build sample modules and optimize them
    Optimize {
        /// Samples to process; all of them when omitted
        samples: Vec<String>,

        /// Enable every pass
        #[arg(short = 'O', long)]
        optimize: bool,

        #[arg(long)]
        fold_constants: bool,

        #[arg(long)]
        eliminate_dead_code: bool,

        #[arg(long)]
        promote_allocas: bool,

        /// JSON file with pass switches, merged with the flags
        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, value_enum, default_value = "lp64")]
        target: Target,

        #[arg(long, value_enum, default_value = "text")]
        emit: Emit,

        /// Abort once this many IR nodes have been allocated
        #[arg(long)]
        node_limit: Option<usize>,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Target {
    Lp64,
    Ilp32,
}

#[derive(Clone, Copy, ValueEnum)]
enum Emit {
    Text,
    Json,
}

/// Settings of one `optimize` invocation
struct Job {
    options: OptimizerOptions,
    target: TargetInfo,
    emit: Emit,
    node_limit: Option<usize>,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::List => {
            for name in SAMPLE_NAMES {
                println!("{name}");
            }
        }
        Commands::Optimize {
            samples,
            optimize,
            fold_constants,
            eliminate_dead_code,
            promote_allocas,
            config,
            target,
            emit,
            node_limit,
            output,
        } => {
            let flags = if optimize {
                OptimizerOptions::all()
            } else {
                OptimizerOptions { fold_constants, eliminate_dead_code, promote_allocas }
            };
            let options = match load_options(config.as_deref()) {
                Ok(from_file) => flags.union(from_file),
                Err(e) => {
                    eprintln!("Error reading config: {}", e);
                    std::process::exit(1);
                }
            };
            let target = match target {
                Target::Lp64 => TargetInfo::lp64(),
                Target::Ilp32 => TargetInfo::ilp32(),
            };
            let job = Job { options, target, emit, node_limit };

            if let Err(e) = run_optimize(&job, &samples, output.as_deref()) {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn load_options(path: Option<&Path>) -> Result<OptimizerOptions, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(OptimizerOptions::default());
    };
    let text = fs::read_to_string(path).map_err(SsaError::from)?;
    let options: OptimizerOptions = serde_json::from_str(&text)?;
    debug!("loaded {:?} from {}", options, path.display());
    Ok(options)
}

fn run_optimize(job: &Job, samples: &[String], output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let names: Vec<&str> = if samples.is_empty() {
        SAMPLE_NAMES.to_vec()
    } else {
        samples.iter().map(String::as_str).collect()
    };

    let mut rendered = Vec::new();
    for name in names {
        rendered.push(render_sample(job, name)?);
    }
    let text = rendered.join("\n");

    match output {
        Some(path) => {
            fs::write(path, &text).map_err(SsaError::from)?;
            info!("output written to {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn render_sample(job: &Job, name: &str) -> Result<String, Box<dyn std::error::Error>> {
    let (mut ctx, mut module) = sample(name, job.target.clone(), job.node_limit)?;
    verify_module(&ctx, &module)?;
    try_optimize(&mut ctx, &mut module, &job.options)?;
    verify_module(&ctx, &module)?;
    info!("'{}': {} nodes after optimization", name, ctx.node_count());

    Ok(match job.emit {
        Emit::Text => print_module(&ctx, &module),
        Emit::Json => {
            let mut json = serde_json::to_string_pretty(&serde_json::json!({
                "module": module,
                "context": ctx,
            }))?;
            json.push('\n');
            json
        }
    })
}
