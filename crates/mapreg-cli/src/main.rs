//! mapreg: register boundary overlays onto map images from the command
//! line.
//!
//! Two subcommands mirror the two registration modes:
//!
//! - `project`: place the registration frame (fitted, `--quad` or
//!   `--rect`), project the boundary through it and print the confirmed
//!   `rect4` descriptor.
//! - `solve`: solve the homography from four `geo`/`pixel` pairs and print
//!   the matrix, its residual and the legacy descriptor.
//!
//! Both can write the overlay as SVG (display pixels) and as a PNG
//! preview composited onto the image (natural pixels).
//!
//! # Usage
//!
//! ```text
//! mapreg project conus.json --image map.png --rect 120,80,980,610 --svg overlay.svg
//! mapreg solve conus.json --image map.png --pairs '[{"geo":[0,50],"pixel":[150,125]}, ...]'
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use image::RgbaImage;
use mapreg_core::{
    BoundaryDocument, ConfirmedRegistration, Dimensions, Point, ProjectionSummary, Quadrilateral, Region,
    RegistrationConfig, RegistrationMode, RegistrationSession, Transform,
};
use mapreg_export::{OverlayStyle, SvgMetadata, render_overlay, to_overlay_svg};
use serde::{Deserialize, Serialize};

/// Register vector boundaries onto raster map images.
#[derive(Parser)]
#[command(name = "mapreg", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Place the registration frame and project the boundary through it.
    Project(ProjectArgs),
    /// Solve a homography from four point correspondences.
    Solve(SolveArgs),
}

/// Inputs and outputs shared by both subcommands.
#[derive(Args)]
struct CommonArgs {
    /// Boundary document (JSON with `bounds` and `geojson`).
    boundary: PathBuf,

    /// Raster map image (PNG, JPEG, BMP, WebP).
    #[arg(long)]
    image: PathBuf,

    /// Width the image is displayed at; coordinates given on the command
    /// line are in this space. Defaults to the image's natural width.
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    display_width: Option<u32>,

    /// Region being registered (conus, alaska, hawaii).
    #[arg(long, default_value = "conus")]
    region: Region,

    /// Minimum frame width and height in display pixels.
    #[arg(long, default_value_t = RegistrationConfig::DEFAULT_MIN_SIZE)]
    min_size: f64,

    /// Fraction of the display a fitted frame fills.
    #[arg(long, default_value_t = RegistrationConfig::DEFAULT_FIT_FRACTION)]
    fit_fraction: f64,

    /// Full registration config as a JSON string.
    ///
    /// When provided, the individual config flags are ignored.
    #[arg(long)]
    config_json: Option<String>,

    /// Write the overlay as SVG (display pixels).
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Write a PNG preview of the overlay on the image (natural pixels).
    #[arg(long)]
    png: Option<PathBuf>,

    /// Print a single JSON object with the descriptor, transform and
    /// projection summary instead of the descriptor alone.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ProjectArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Frame as JSON: `{"centerX":..,"centerY":..,"width":..,"height":..,"rotationDegrees":..}`.
    #[arg(long, conflicts_with = "rect")]
    quad: Option<String>,

    /// Frame from a drawn rectangle, two opposite corners.
    #[arg(long, value_name = "X0,Y0,X1,Y1")]
    rect: Option<String>,
}

#[derive(Args)]
struct SolveArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Four correspondences as JSON: `[{"geo":[x,y],"pixel":[x,y]}, ...]`.
    #[arg(long)]
    pairs: String,
}

/// One correspondence as given on the command line.
#[derive(Deserialize)]
struct PairArg {
    geo: [f64; 2],
    pixel: [f64; 2],
}

/// `--json` output.
#[derive(Serialize)]
struct Report<'a> {
    region: Region,
    registration: &'a ConfirmedRegistration,
    transform: Transform,
    summary: ProjectionSummary,
}

fn config_from_cli(common: &CommonArgs) -> Result<RegistrationConfig, String> {
    if let Some(json) = &common.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Invalid --config-json: {e}"));
    }
    Ok(RegistrationConfig {
        min_size: common.min_size,
        fit_fraction: common.fit_fraction,
        ..RegistrationConfig::default()
    })
}

/// Parse `--rect "X0,Y0,X1,Y1"`.
fn parse_rect(rect: &str) -> Result<(Point, Point), String> {
    let values = rect
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .map_err(|e| format!("invalid --rect value '{v}': {e}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    match values.as_slice() {
        &[x0, y0, x1, y1] => Ok((Point::new(x0, y0), Point::new(x1, y1))),
        _ => Err(format!("--rect must be 'X0,Y0,X1,Y1', got: '{rect}'")),
    }
}

/// Display size for an image of natural size `natural` shown
/// `display_width` pixels wide, preserving aspect ratio.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn display_size(natural: Dimensions, display_width: Option<u32>) -> Dimensions {
    let Some(width) = display_width else {
        return natural;
    };
    let height = (f64::from(natural.height) * f64::from(width) / f64::from(natural.width))
        .round()
        .max(1.0) as u32;
    Dimensions::new(width, height)
}

/// Load inputs and build a session with the image dimensions set.
fn open_session(common: &CommonArgs) -> Result<(RegistrationSession, RgbaImage), Box<dyn Error>> {
    let config = config_from_cli(common)?;
    log::debug!("registration config: {config:?}");

    eprintln!("Reading boundary from {}", common.boundary.display());
    let json = std::fs::read_to_string(&common.boundary)?;
    let boundary = BoundaryDocument::from_json(&json)?;
    eprintln!(
        "Boundary: {} polylines, {} points ({} features skipped)",
        boundary.geometry.len(),
        boundary.geometry.point_count(),
        boundary.skipped_features,
    );

    eprintln!("Reading image from {}", common.image.display());
    let image = image::open(&common.image)?.to_rgba8();
    let natural = Dimensions::new(image.width(), image.height());
    let display = display_size(natural, common.display_width);
    eprintln!(
        "Image: {}x{} natural, {}x{} display",
        natural.width, natural.height, display.width, display.height,
    );

    let mut session = RegistrationSession::new(common.region.config(), boundary, config)?;
    session.set_image(natural, display)?;
    Ok((session, image))
}

/// Print results and write the requested overlay files.
fn finish(
    session: &RegistrationSession,
    image: &RgbaImage,
    frame: Option<[Point; 4]>,
    common: &CommonArgs,
) -> Result<(), Box<dyn Error>> {
    let transform = session.transform()?;
    let summary = ProjectionSummary::collect(&session.boundary().geometry, &transform);
    eprintln!();
    eprintln!("{}", summary.report());

    let confirmed = session.confirm()?;
    let registration_json = serde_json::to_string(&confirmed)?;
    if common.json {
        let report = Report {
            region: session.region().region,
            registration: &confirmed,
            transform,
            summary,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{registration_json}");
    }

    if common.svg.is_none() && common.png.is_none() {
        return Ok(());
    }
    let overlay = session.overlay()?;
    let style = OverlayStyle::for_region(session.region());
    let mapping = session.mapping().ok_or("image dimensions are not known")?;

    if let Some(path) = &common.svg {
        let description = match session.mode() {
            RegistrationMode::Similarity => "similarity registration",
            RegistrationMode::Projective => "projective registration",
        };
        let svg = to_overlay_svg(
            &overlay,
            mapping.display,
            frame.as_ref(),
            &style,
            &SvgMetadata {
                title: Some(session.region().region.name()),
                description: Some(description),
                registration_json: Some(&registration_json),
            },
        );
        write_output(path, svg.as_bytes())?;
    }

    if let Some(path) = &common.png {
        eprintln!("Rendering overlay...");
        let preview = render_overlay(image, &overlay, frame.as_ref(), &style, mapping.scale());
        eprintln!("Saving to {}", path.display());
        preview.save(path)?;
    }
    Ok(())
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), Box<dyn Error>> {
    eprintln!("Saving to {}", path.display());
    std::fs::write(path, bytes)?;
    Ok(())
}

fn run_project(args: &ProjectArgs) -> Result<(), Box<dyn Error>> {
    let (mut session, image) = open_session(&args.common)?;

    if let Some(json) = &args.quad {
        let quad: Quadrilateral =
            serde_json::from_str(json).map_err(|e| format!("Invalid --quad: {e}"))?;
        session.seed(quad);
    } else if let Some(rect) = &args.rect {
        let (a, b) = parse_rect(rect)?;
        session.seed_from_rect(a, b);
    }

    let quad = *session.controller().quad();
    eprintln!(
        "Frame: center ({:.1}, {:.1}), {:.1}x{:.1}, rotation {:.1} deg",
        quad.center_x,
        quad.center_y,
        quad.width,
        quad.height,
        quad.normalized_rotation(),
    );
    finish(&session, &image, Some(quad.corners()), &args.common)
}

fn run_solve(args: &SolveArgs) -> Result<(), Box<dyn Error>> {
    let pairs: Vec<PairArg> =
        serde_json::from_str(&args.pairs).map_err(|e| format!("Invalid --pairs: {e}"))?;
    let (mut session, image) = open_session(&args.common)?;
    session.set_mode(RegistrationMode::Projective);

    for pair in &pairs {
        let geo = Point::new(pair.geo[0], pair.geo[1]);
        let pixel = Point::new(pair.pixel[0], pair.pixel[1]);
        let step = session.add_correspondence(geo, pixel)?;
        eprintln!(
            "Pair {}: geo ({}, {}) -> pixel ({}, {})",
            step + 1,
            geo.x,
            geo.y,
            pixel.x,
            pixel.y,
        );
    }

    let solution = session
        .solution()
        .ok_or_else(|| format!("need 4 correspondences to solve, have {}", pairs.len()))?;
    eprintln!("Homography:");
    for row in solution.transform.matrix() {
        eprintln!("  [{:>14.6e} {:>14.6e} {:>14.6e}]", row[0], row[1], row[2]);
    }
    eprintln!("Max residual: {:.3e} px", solution.max_residual_px);

    // Outline of the warped extent; omitted if a corner has no image.
    let transform = session.transform()?;
    let frame = match session.boundary().extent.corners().map(|p| transform.project_point(p)) {
        [Ok(a), Ok(b), Ok(c), Ok(d)] => Some([a, b, c, d]),
        _ => None,
    };
    finish(&session, &image, frame, &args.common)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let result = match &cli.command {
        Command::Project(args) => run_project(args),
        Command::Solve(args) => run_solve(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
