use crate::config::{Config, load_config};
use crate::dot::write_dot;
use crate::layout_dump::{LayoutDump, write_layout_dump};
use crate::parser::load_scene;
use crate::pipeline::solve_scene;
use crate::preprocess::SplitMode;
use crate::solver::GoodLpEngine;
use anyhow::Result;
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "scene-layout",
    version,
    about = "Solve furniture and room layouts from scene graphs"
)]
pub struct Args {
    /// Scene description (.json or .json5)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Layout JSON output. Defaults to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Config JSON file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Place rooms in 2D; ignores vertical relations
    #[arg(long = "floorplan")]
    pub floorplan: bool,

    /// Split every vertex into cells before solving
    #[arg(long = "split", value_enum)]
    pub split: Option<SplitArg>,

    /// Seed for the splitter
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// Solver time limit in seconds
    #[arg(long = "time-limit")]
    pub time_limit: Option<f64>,

    /// Relative MIP gap
    #[arg(long = "mip-gap")]
    pub mip_gap: Option<f64>,

    /// Objective weights: area,size,position,adjacency
    #[arg(long = "weights", value_delimiter = ',')]
    pub weights: Option<Vec<f64>>,

    /// Write the input graph as Graphviz DOT
    #[arg(long = "dot-in")]
    pub dot_in: Option<PathBuf>,

    /// Write the solved graph as Graphviz DOT
    #[arg(long = "dot-out")]
    pub dot_out: Option<PathBuf>,

    /// Write the infeasibility report here when the model has no solution
    #[arg(long = "iis")]
    pub iis: Option<PathBuf>,

    /// More logging (-v debug, -vv trace). RUST_LOG wins when set.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum SplitArg {
    None,
    Half,
    Quarter,
}

impl From<SplitArg> for SplitMode {
    fn from(arg: SplitArg) -> Self {
        match arg {
            SplitArg::None => SplitMode::None,
            SplitArg::Half => SplitMode::Half,
            SplitArg::Quarter => SplitMode::Quarter,
        }
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args)?;

    let scene = load_scene(&args.input)?;
    if let Some(path) = &args.dot_in {
        write_dot(path, &scene.graph)?;
    }

    let report = solve_scene(&scene, &config, &GoodLpEngine::new())?;
    info!(
        status = %report.status,
        variables = report.stats.variables,
        binaries = report.stats.binaries,
        constraints = report.stats.linear_constraints + report.stats.quadratic_constraints,
        "solve finished"
    );

    if let Some(path) = &args.dot_out {
        write_dot(path, &report.graph)?;
    }
    if let (Some(path), Some(text)) = (&args.iis, report.infeasibility_text()) {
        std::fs::write(path, text)?;
    }

    match &args.output {
        Some(path) => write_layout_dump(path, &report, &scene.boundary)?,
        None => {
            let dump = LayoutDump::from_report(&report, &scene.boundary);
            println!("{}", serde_json::to_string_pretty(&dump)?);
        }
    }

    if !report.has_layout() {
        return Err(anyhow::anyhow!("no layout found: {}", report.status));
    }
    Ok(())
}

fn apply_overrides(config: &mut Config, args: &Args) -> Result<()> {
    if args.floorplan {
        config.floorplan = true;
    }
    if let Some(split) = args.split {
        config.split = split.into();
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(limit) = args.time_limit {
        config.solver.time_limit_secs = limit;
    }
    if let Some(gap) = args.mip_gap {
        config.solver.mip_gap = gap;
    }
    if let Some(weights) = &args.weights {
        let weights: [f64; 4] = weights.as_slice().try_into().map_err(|_| {
            anyhow::anyhow!("--weights takes 4 values (area,size,position,adjacency), got {}", weights.len())
        })?;
        config.weights = weights.into();
    }
    Ok(())
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
