use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};
use stroke2bez::geometry::GeometrySet;
use stroke2bez::nalgebra::{Matrix4, Vector3};
use stroke2bez::output::{json, svg};
use stroke2bez::{
    CurveType, DepthMode, DepthSnapshot, DrawContext, DrawSettings, FitMethod, FitOptions,
    InputEvent, NdCubicFitter, StrokeRecord,
};

#[derive(Parser)]
#[command(name = "stroke2bez", about = "Freehand strokes to fitted bezier curves")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay an input-event stream through an interactive session
    Draw(DrawArgs),
    /// Fit stored stroke records without interaction
    Replay(ReplayArgs),
    /// Translate or transform a geometry set
    Transform(TransformArgs),
}

#[derive(Args)]
struct SceneArgs {
    /// Scene description (view, object matrix, cursor) as JSON
    #[arg(long)]
    scene: Option<PathBuf>,

    /// Tool settings preset as JSON
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Existing curve to add the stroke to (JSON); a new curve otherwise
    #[arg(long)]
    curve: Option<PathBuf>,

    /// Output curve path (JSON)
    #[arg(short, long)]
    output: PathBuf,

    /// Also write an SVG preview of the curve's XY projection
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Output spline type
    #[arg(long, value_enum)]
    curve_type: Option<CliCurveType>,

    /// Fit method (resolved from settings if omitted)
    #[arg(long, value_enum)]
    method: Option<CliFitMethod>,

    /// Fit error threshold in object units (derived from the stroke if omitted)
    #[arg(long)]
    error: Option<f64>,

    /// Corner angle in degrees (180 = no corners)
    #[arg(long)]
    corner_angle: Option<f64>,

    /// Close the curve (detected from the stroke if omitted)
    #[arg(long)]
    cyclic: Option<bool>,
}

#[derive(Args)]
struct DrawArgs {
    /// Input events as a JSON array of {kind, mval, pressure}
    #[arg(short, long)]
    events: PathBuf,

    /// Depth map (grayscale, white = far) for surface projection
    #[arg(long)]
    depth: Option<PathBuf>,

    /// Valid depth range; depths outside it count as empty
    #[arg(long, num_args = 2, value_names = ["NEAR", "FAR"], default_values_t = [0.0, 1.0])]
    depth_range: Vec<f64>,

    /// Write the captured stroke as replayable records (JSON)
    #[arg(long)]
    record: Option<PathBuf>,

    #[command(flatten)]
    scene: SceneArgs,
}

#[derive(Args)]
struct ReplayArgs {
    /// Stroke records (JSON)
    #[arg(short, long)]
    records: PathBuf,

    #[command(flatten)]
    scene: SceneArgs,
}

#[derive(Args)]
struct TransformArgs {
    /// Geometry set (JSON)
    #[arg(short, long)]
    input: PathBuf,

    /// Output geometry set (JSON)
    #[arg(short, long)]
    output: PathBuf,

    /// Translation
    #[arg(long, num_args = 3, value_names = ["X", "Y", "Z"], allow_hyphen_values = true)]
    translate: Option<Vec<f64>>,

    /// Column-major 4x4 matrix, applied after any translation
    #[arg(long, num_args = 16, allow_hyphen_values = true)]
    matrix: Option<Vec<f64>>,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliCurveType {
    Bezier,
    Poly,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliFitMethod {
    Split,
    Refit,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    eprintln!();
    match cli.command {
        Command::Draw(args) => run_draw(args)?,
        Command::Replay(args) => run_replay(args)?,
        Command::Transform(args) => run_transform(args)?,
    }
    eprintln!();
    Ok(())
}

/// Scene, settings, options and target curve from the shared flags.
fn load_scene(
    args: &SceneArgs,
) -> Result<(DrawContext, DrawSettings, FitOptions, stroke2bez::Curve), Box<dyn std::error::Error>> {
    let ctx: DrawContext = match &args.scene {
        Some(path) => json::read(path)?,
        None => DrawContext::default(),
    };
    let mut settings: DrawSettings = match &args.settings {
        Some(path) => json::read(path)?,
        None => DrawSettings::default(),
    };
    if let Some(curve_type) = args.curve_type {
        settings.curve_type = match curve_type {
            CliCurveType::Bezier => CurveType::Bezier,
            CliCurveType::Poly => CurveType::Poly,
        };
    }
    let options = FitOptions {
        fit_method: args.method.map(|m| match m {
            CliFitMethod::Split => FitMethod::Split,
            CliFitMethod::Refit => FitMethod::Refit,
        }),
        error_threshold: args.error,
        corner_angle: args.corner_angle.map(f64::to_radians),
        use_cyclic: args.cyclic,
    };
    let curve = match &args.curve {
        Some(path) => json::read(path)?,
        None => ctx.new_curve(),
    };
    Ok((ctx, settings, options, curve))
}

fn write_curve(args: &SceneArgs, curve: &stroke2bez::Curve) -> Result<(), Box<dyn std::error::Error>> {
    json::write(&args.output, curve)?;
    eprintln!("  \u{2713} {}", args.output.display());
    if let Some(svg_path) = &args.svg {
        std::fs::write(svg_path, svg::curve_to_svg(curve))?;
        eprintln!("  \u{2713} {}", svg_path.display());
    }
    Ok(())
}

fn describe_options(options: &FitOptions) -> String {
    let method = options.fit_method.map_or("default".to_string(), |m| format!("{:?}", m));
    let error = options.error_threshold.map_or("default".to_string(), |e| format!("{:.4}", e));
    let corner = options
        .corner_angle
        .map_or("default".to_string(), |a| format!("{:.1}\u{00b0}", a.to_degrees()));
    let cyclic = match options.use_cyclic {
        Some(true) => "yes",
        Some(false) => "no",
        None => "default",
    };
    format!("{method}, error {error}, corner {corner}, cyclic {cyclic}")
}

fn run_draw(args: DrawArgs) -> Result<(), Box<dyn std::error::Error>> {
    let t_start = Instant::now();
    let (ctx, settings, options, mut curve) = load_scene(&args.scene)?;
    let events: Vec<InputEvent> = json::read(&args.events)?;

    // ── Load ──────────────────────────────────────────────
    let depths = match &args.depth {
        Some(path) => {
            let range = (args.depth_range[0], args.depth_range[1]);
            Some(DepthSnapshot::load(path, range)?)
        }
        None => None,
    };
    let depth_note = match &depths {
        Some(d) => format!(", depth {}x{}", d.width(), d.height()),
        None if settings.depth_mode == DepthMode::Surface => ", no depth (view plane)".to_string(),
        None => String::new(),
    };
    eprintln!(
        "  Load        {} events, view {}x{}{}",
        events.len(),
        ctx.view.width,
        ctx.view.height,
        depth_note
    );

    // ── Sample & fit ──────────────────────────────────────
    let report = stroke2bez::draw(&ctx, settings.clone(), options, depths, &events, &mut curve, &NdCubicFitter)?;
    eprintln!(
        "  Sample      {} samples{}",
        report.samples,
        if report.uses_substeps { " (substeps)" } else { "" }
    );
    eprintln!("  Fit         {}", describe_options(&report.options));

    if let Some(record_path) = &args.record {
        json::write(record_path, &report.records)?;
        eprintln!("  Record      {}", record_path.display());
    }

    eprintln!(
        "  Result      {:?} \u{00b7} {} {:?} points \u{00b7} {} splines  ({}ms)",
        report.status,
        report.spline_points,
        settings.curve_type,
        curve.splines.len(),
        t_start.elapsed().as_millis(),
    );
    write_curve(&args.scene, &curve)
}

fn run_replay(args: ReplayArgs) -> Result<(), Box<dyn std::error::Error>> {
    let t_start = Instant::now();
    let (ctx, settings, options, mut curve) = load_scene(&args.scene)?;
    let records: Vec<StrokeRecord> = json::read(&args.records)?;
    eprintln!("  Load        {} records", records.len());
    eprintln!("  Fit         {}", describe_options(&options));

    let points = stroke2bez::exec_records(&ctx, &settings, &options, &records, &mut curve, &NdCubicFitter)?;
    eprintln!(
        "  Result      {} {:?} points \u{00b7} {} splines  ({}ms)",
        points,
        settings.curve_type,
        curve.splines.len(),
        t_start.elapsed().as_millis(),
    );
    write_curve(&args.scene, &curve)
}

fn run_transform(args: TransformArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut geometry: GeometrySet = json::read(&args.input)?;
    eprintln!("  Load        {} components", geometry.component_count());

    if let Some(t) = &args.translate {
        let translation = Vector3::new(t[0], t[1], t[2]);
        stroke2bez::transform::translate_geometry(&mut geometry, &translation);
        eprintln!("  Translate   ({}, {}, {})", t[0], t[1], t[2]);
    }
    if let Some(values) = &args.matrix {
        let matrix = Matrix4::from_column_slice(values);
        if let Some(errors) = stroke2bez::transform::transform_geometry(&mut geometry, &matrix) {
            eprintln!("  Warning     volume too small, grids cleared");
            if errors.bad_volume_transform {
                eprintln!("  Warning     invalid volume transform, grids left unchanged");
            }
        }
        eprintln!("  Transform   matrix applied");
    }

    json::write(&args.output, &geometry)?;
    eprintln!("  \u{2713} {}", args.output.display());
    Ok(())
}
