//! layerpath CLI - turns sliced layer outlines into G-code
//!
//! Usage:
//!   layerpath slice <layers.json> -o <output.gcode> [options]
//!   layerpath slice <layers.json> --config my_config.json
//!   layerpath info <layers.json>

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use layerpath::{
    BoundingBox, CancellationToken, CommandRecorder, GCodeWriter, InfillPattern, PolygonSet,
    PrintConfig, PrintPipeline, PrintSummary, SlicedInput,
};
use log::{info, warn, LevelFilter};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Layer toolpath planner for FFF 3D printing
#[derive(Parser, Debug)]
#[command(name = "layerpath")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Plan toolpaths for sliced layers and write G-code
    Slice {
        /// Sliced layer outlines (JSON)
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output G-code file (stdout when omitted)
        #[arg(short, long, value_name = "OUTPUT")]
        output: Option<PathBuf>,

        /// Print configuration file (JSON); flags below override it
        #[arg(short, long, value_name = "CONFIG")]
        config: Option<PathBuf>,

        /// Layer height in mm
        #[arg(long)]
        layer_height: Option<f64>,

        /// First layer height in mm
        #[arg(long)]
        first_layer_height: Option<f64>,

        /// Number of perimeters
        #[arg(long)]
        perimeters: Option<usize>,

        /// Infill density (0-100)
        #[arg(long)]
        infill_density: Option<f64>,

        /// Infill pattern (lines, grid, triangles, hexagon, concentric)
        #[arg(long)]
        infill_pattern: Option<String>,

        /// Generate supports
        #[arg(long)]
        support: bool,

        /// Support overhang angle threshold (degrees from vertical)
        #[arg(long)]
        support_angle: Option<f64>,

        /// Print the outer wall as one continuous spiral
        #[arg(long)]
        spiral: bool,
    },

    /// Show information about a sliced layer file
    Info {
        /// Sliced layer outlines (JSON)
        #[arg(value_name = "INPUT")]
        input: PathBuf,
    },
}

/// Command-line overrides applied on top of the loaded configuration.
#[derive(Debug, Default)]
struct Overrides {
    layer_height: Option<f64>,
    first_layer_height: Option<f64>,
    perimeters: Option<usize>,
    infill_density: Option<f64>,
    infill_pattern: Option<String>,
    support: bool,
    support_angle: Option<f64>,
    spiral: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.debug {
        LevelFilter::Debug
    } else if cli.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    match cli.command {
        Commands::Slice {
            input,
            output,
            config,
            layer_height,
            first_layer_height,
            perimeters,
            infill_density,
            infill_pattern,
            support,
            support_angle,
            spiral,
        } => cmd_slice(
            input,
            output,
            config,
            Overrides {
                layer_height,
                first_layer_height,
                perimeters,
                infill_density,
                infill_pattern,
                support,
                support_angle,
                spiral,
            },
        ),
        Commands::Info { input } => cmd_info(input),
    }
}

fn load_config(path: Option<&Path>) -> Result<PrintConfig> {
    let Some(path) = path else {
        return Ok(PrintConfig::default());
    };
    info!("Loading print config from: {}", path.display());
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    serde_json::from_str(&text).context("Failed to parse print config")
}

fn apply_overrides(mut config: PrintConfig, overrides: Overrides) -> Result<PrintConfig> {
    if let Some(height) = overrides.layer_height {
        config = config.layer_height(height);
    }
    if let Some(height) = overrides.first_layer_height {
        config = config.first_layer_height(height);
    }
    if let Some(count) = overrides.perimeters {
        config = config.perimeters(count);
    }
    if let Some(density) = overrides.infill_density {
        config = config.infill_percent(density);
    }
    if let Some(pattern) = overrides.infill_pattern {
        let pattern: InfillPattern = pattern.parse().map_err(anyhow::Error::msg)?;
        config = config.infill_pattern(pattern);
    }
    if overrides.support {
        config = config.support(true);
    }
    if let Some(angle) = overrides.support_angle {
        config = config.support_overhang_angle(angle);
    }
    if overrides.spiral {
        config = config.spiral(true);
    }
    Ok(config)
}

fn cmd_slice(
    input: PathBuf,
    output: Option<PathBuf>,
    config_file: Option<PathBuf>,
    overrides: Overrides,
) -> Result<()> {
    info!("Loading layers from: {}", input.display());
    let sliced = SlicedInput::from_file(&input).context("Failed to load sliced layers")?;
    info!(
        "  {} extruder(s), {} layers",
        sliced.extruder_count(),
        sliced.layer_count()
    );

    // The slicing planes fix the layer heights unless a flag says otherwise.
    let mut config = load_config(config_file.as_deref())?;
    if let Some(height) = sliced.first_layer_height {
        config = config.first_layer_height(height);
    }
    if let Some(height) = sliced.layer_height {
        config = config.layer_height(height);
    }
    let config = apply_overrides(config, overrides)?;
    let pipeline = PrintPipeline::new(config).context("Invalid print configuration")?;
    if sliced.layer_count() == 0 {
        warn!("Input has no layers; output will only contain start and end code");
    }

    // Progress goes to stderr so G-code can stream to stdout.
    let progress = ProgressBar::new(100);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}% {msg}")
            .context("Invalid progress template")?
            .progress_chars("#>-"),
    );

    let cancel = CancellationToken::new();
    let report = |stage: &str, fraction: f64| {
        // Preparation fills the first half of the bar, writing the rest.
        let (base, span) = match stage {
            "insets" => (0.0, 20.0),
            "skins" => (20.0, 20.0),
            "support" => (40.0, 10.0),
            _ => (50.0, 50.0),
        };
        progress.set_message(stage.to_string());
        progress.set_position((base + span * fraction) as u64);
    };

    let outlines = sliced.into_outlines();
    let (summary, stats) = match &output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_gcode(&pipeline, outlines, BufWriter::new(file), &cancel, report)?
        }
        None => {
            let stdout = io::stdout();
            write_gcode(&pipeline, outlines, BufWriter::new(stdout.lock()), &cancel, report)?
        }
    };
    progress.finish_with_message("done");

    eprintln!();
    eprintln!("Toolpaths written:");
    if let Some(path) = &output {
        eprintln!("  Output: {}", path.display());
    }
    eprintln!("  Layers: {}", summary.layers);
    eprintln!("  Extruders: {}", summary.extruders);
    eprintln!("  Support: {}", if summary.with_support { "yes" } else { "no" });
    eprintln!("  Estimated time: {}", format_duration(summary.estimated_seconds));
    for (extruder, used) in stats.filament_used.iter().enumerate() {
        eprintln!("  Filament (extruder {}): {:.1} mm", extruder, used);
    }
    eprintln!("  Size: {} bytes", stats.bytes_written);

    Ok(())
}

/// What the G-code writer reports once the job is done.
#[derive(Debug)]
struct OutputStats {
    filament_used: Vec<f64>,
    bytes_written: usize,
}

fn write_gcode<W: Write>(
    pipeline: &PrintPipeline,
    outlines: Vec<Vec<PolygonSet>>,
    out: W,
    cancel: &CancellationToken,
    report: impl FnMut(&str, f64),
) -> Result<(PrintSummary, OutputStats)> {
    let mut writer = GCodeWriter::new(out, pipeline.config());
    let summary = pipeline
        .run_with_callback(outlines, &mut writer, cancel, report)
        .context("Toolpath generation failed")?;
    let stats = OutputStats {
        filament_used: writer.filament_used().to_vec(),
        bytes_written: writer.bytes_written(),
    };
    writer
        .into_inner()
        .flush()
        .context("Failed to flush G-code")?;
    Ok((summary, stats))
}

fn cmd_info(input: PathBuf) -> Result<()> {
    info!("Loading layers from: {}", input.display());
    let sliced = SlicedInput::from_file(&input).context("Failed to load sliced layers")?;
    let extruders = sliced.extruder_count();
    let layers = sliced.layer_count();
    let (first_layer_height, layer_height) = (sliced.first_layer_height, sliced.layer_height);
    let outlines = sliced.into_outlines();

    let mut bounds = BoundingBox::new();
    let mut contours = 0;
    for stack in &outlines {
        for layer in stack {
            bounds.merge(&layer.bounding_box());
            contours += layer.len();
        }
    }

    println!("Layer Information:");
    println!("  File: {}", input.display());
    println!("  Extruders: {}", extruders);
    println!("  Layers: {}", layers);
    println!("  Contours: {}", contours);
    if bounds.defined {
        println!(
            "  Footprint: ({:.3}, {:.3}) - ({:.3}, {:.3}) mm",
            layerpath::unscale(bounds.min.x),
            layerpath::unscale(bounds.min.y),
            layerpath::unscale(bounds.max.x),
            layerpath::unscale(bounds.max.y)
        );
    }

    // Dry run with default settings for an estimate.
    let mut config = PrintConfig::default();
    if let Some(height) = first_layer_height {
        config = config.first_layer_height(height);
    }
    if let Some(height) = layer_height {
        config = config.layer_height(height);
    }
    let pipeline = PrintPipeline::new(config)?;
    let mut recorder = CommandRecorder::new();
    let summary = pipeline
        .run(outlines, &mut recorder, &CancellationToken::new())
        .context("Toolpath generation failed")?;
    println!("  With default settings:");
    println!("    Layers printed: {}", summary.layers);
    println!("    Extrusion moves: {}", recorder.extrusion_count());
    println!("    Estimated time: {}", format_duration(summary.estimated_seconds));

    Ok(())
}

fn format_duration(seconds: f64) -> String {
    let total = seconds.round() as u64;
    format!("{}h {:02}m {:02}s", total / 3600, (total % 3600) / 60, total % 60)
}
