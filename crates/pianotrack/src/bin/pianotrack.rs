//! pianotrack CLI: render keyboard templates, calibrate a frame against a
//! template from four marked corners, and track a frame sequence.

use clap::{ArgAction, Args, Parser, Subcommand};
use log::LevelFilter;
use nalgebra::Point2;
use pianotrack::align::{find_homography, CornerSearchMode, FeatureMatcher};
use pianotrack::frames::{load_gray, load_template};
use pianotrack::io::{
    read_json, write_json, CalibrationReport, ConfigError, FrameSource, IoError, TemplateSource,
    TrackConfig, TrackReport,
};
use pianotrack::template::{synthesize, write_png, KeyboardSpec, TemplateError};
use pianotrack::{Alignment, Tracker, UnavailableReason};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("no alignment found: {0}")]
    Unavailable(UnavailableReason),
    #[error("{}: no image frames found", .0.display())]
    EmptySource(PathBuf),
    #[error("failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "pianotrack")]
#[command(about = "Keyboard template synthesis and homography tracking")]
#[command(version)]
struct Cli {
    /// Raise log verbosity (-v: debug, -vv: trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a synthetic keyboard template to PNG.
    Template(TemplateArgs),

    /// Find the frame-to-template homography from four marked corners.
    Calibrate(CalibrateArgs),

    /// Track a directory of frames.
    Track(TrackArgs),
}

#[derive(Debug, Args)]
struct TemplateArgs {
    /// Number of keys.
    #[arg(long, default_value_t = 88)]
    keys: usize,

    /// Template scale in pixels per white key.
    #[arg(long, default_value_t = 10.0)]
    px_per_white_key: f64,

    /// Pitch class of the lowest key (0 = C, 9 = A).
    #[arg(long, default_value_t = 9)]
    start_pitch_class: u8,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Args)]
struct CalibrateArgs {
    /// Frame the corners were marked on.
    #[arg(long)]
    frame: PathBuf,

    /// Template image; defaults to the config's template.
    #[arg(long)]
    template: Option<PathBuf>,

    /// Marked keyboard corners as `x,y`, in any order.
    #[arg(long, num_args = 1.., value_parser = parse_point, required = true)]
    points: Vec<Point2<f32>>,

    /// Try all 24 corner orderings instead of the 4 rotations.
    #[arg(long)]
    permutations: bool,

    /// JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the calibration JSON; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct TrackArgs {
    /// Directory of frame images, processed in name order.
    #[arg(long)]
    video_source: PathBuf,

    /// Template image; defaults to the config's template.
    #[arg(long)]
    template: Option<PathBuf>,

    /// Calibration JSON for the first (or reference) frame; enables refinement.
    #[arg(long)]
    homography: Option<PathBuf>,

    /// Align every frame to this reference image instead of the previous frame.
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Process every n-th frame.
    #[arg(long)]
    every: Option<usize>,

    /// JSON config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the track report; stdout when omitted.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn parse_point(s: &str) -> Result<Point2<f32>, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `x,y`, got `{s}`"))?;
    let x: f32 = x.trim().parse().map_err(|e| format!("bad x in `{s}`: {e}"))?;
    let y: f32 = y.trim().parse().map_err(|e| format!("bad y in `{s}`: {e}"))?;
    Ok(Point2::new(x, y))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    pianotrack::init_logging(level);

    let result = match cli.command {
        Commands::Template(args) => run_template(&args),
        Commands::Calibrate(args) => run_calibrate(&args),
        Commands::Track(args) => run_track(&args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(path: Option<&Path>) -> CliResult<TrackConfig> {
    Ok(match path {
        Some(p) => TrackConfig::load_json(p)?,
        None => TrackConfig::default(),
    })
}

fn emit_json<T: serde::Serialize>(value: &T, out: Option<&Path>) -> CliResult<()> {
    match out {
        Some(path) => {
            write_json(value, path)?;
            log::info!("wrote {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(value)?),
    }
    Ok(())
}

// ── template ───────────────────────────────────────────────────────────

fn run_template(args: &TemplateArgs) -> CliResult<()> {
    let spec = KeyboardSpec::with_keys(args.keys, args.start_pitch_class, args.px_per_white_key);
    let img = synthesize(&spec)?;
    write_png(&img, &args.out)?;
    log::info!(
        "{} keys -> {}x{} template at {}",
        args.keys,
        img.width,
        img.height,
        args.out.display()
    );
    Ok(())
}

// ── calibrate ──────────────────────────────────────────────────────────

fn run_calibrate(args: &CalibrateArgs) -> CliResult<()> {
    let mut cfg = load_config(args.config.as_deref())?;
    if let Some(path) = &args.template {
        cfg.template = TemplateSource::File(path.clone());
    }
    if args.permutations {
        cfg.corner_search = CornerSearchMode::Permutations;
    }

    let frame = load_gray(&args.frame)?;
    let template = load_template(&cfg.template)?;
    log::info!(
        "calibrating {}x{} frame against {}x{} template",
        frame.width,
        frame.height,
        template.width,
        template.height
    );

    match find_homography(&frame.view(), &template.view(), &args.points, cfg.corner_search) {
        Alignment::Aligned(fit) => {
            let report =
                CalibrationReport::new(&fit, cfg.corner_search, [template.width, template.height]);
            emit_json(&report, args.out.as_deref())
        }
        Alignment::Unavailable(reason) => Err(CliError::Unavailable(reason)),
    }
}

// ── track ──────────────────────────────────────────────────────────────

fn run_track(args: &TrackArgs) -> CliResult<()> {
    let mut cfg = load_config(args.config.as_deref())?;
    if let Some(path) = &args.template {
        cfg.template = TemplateSource::File(path.clone());
    }
    if let Some(every) = args.every {
        cfg.every = every;
    }
    cfg.validate()?;

    let source = FrameSource::open(&args.video_source)?;
    if source.is_empty() {
        return Err(CliError::EmptySource(args.video_source.clone()));
    }

    let mut tracker = match &args.reference {
        Some(path) => {
            let reference = load_gray(path)?;
            Tracker::against_reference(FeatureMatcher::new(&reference.view(), cfg.matcher.clone()))
        }
        None => Tracker::stabilized(cfg.stabilizer.clone()),
    };
    if let Some(path) = &args.homography {
        let calibration: CalibrationReport = read_json(path)?;
        let template = load_template(&cfg.template)?;
        tracker = tracker.with_refinement(cfg.refiner.clone(), template, calibration.homography());
    }

    let mut report = TrackReport::default();
    for (index, path) in source.every(cfg.every) {
        let frame = load_gray(path)?;
        let entry = tracker.process(index, &path.display().to_string(), &frame.view());
        report.frames.push(entry);
    }
    log::info!(
        "tracked {} frames, {} aligned",
        report.frames.len(),
        report.aligned()
    );
    emit_json(&report, args.out.as_deref())
}
