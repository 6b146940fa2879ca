use anyhow::{bail, Result};
use clap::Parser;
use log::info;
use std::path::PathBuf;

use indicatif::ProgressStyle;
use tracing::info_span;
use tracing::Span;
use tracing_indicatif::span_ext::IndicatifSpanExt;
use tracing_indicatif::IndicatifLayer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use lk_tracker::config::*;
use lk_tracker::detector::Detector;
use lk_tracker::matcher::{Matcher, Reference};
use lk_tracker::my_types::*;
use lk_tracker::optical_flow::OpticalFlow;
use lk_tracker::region::Region;
use lk_tracker::render::{Control, Headless, Overlay, Scene};
use lk_tracker::source::{FrameSource, SyntheticSource};
use lk_tracker::tracker::Session;

const SYNTHETIC_SHAPE: (usize, usize) = (640, 480);

#[derive(Parser)]
pub struct Args {
    /// Camera peripheral (0 for built-in webcam, 1 for external webcam)
    #[clap(long, default_value = "0")]
    pub camera: i32,
    /// Pan over a generated texture instead of reading a camera
    #[clap(long)]
    pub synthetic: bool,
    /// Run without a window
    #[clap(long)]
    pub headless: bool,
    /// Stop after this many frames (headless only)
    #[clap(long)]
    pub frames: Option<usize>,
    /// Zone committed on the first frame, as x0,y0,x1,y1
    #[clap(long)]
    pub region: Option<String>,
    /// Folder of reference photographs (limits mode)
    #[clap(long, default_value = "limits/images/Pen")]
    pub folder: PathBuf,
    /// Coordinates aligned with the photographs, defaults to <folder>_coordinates.json
    #[clap(long)]
    pub coordinates: Option<PathBuf>,
    #[clap(short, long)]
    pub verbose: bool,
    #[clap(flatten)]
    pub config: Config,
}

fn main() -> Result<()> {
    // parse the config
    let args = Args::parse();

    // setup logging
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let indicatif_layer = IndicatifLayer::new();
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(indicatif_layer.get_stdout_writer()))
        .with(indicatif_layer)
        .with(level)
        .init();

    let mut source = open_source(&args)?;
    let mut overlay = open_overlay(&args)?;

    let header_span = info_span!("tracking");
    header_span.pb_set_style(&ProgressStyle::default_spinner());
    let header_span_enter = header_span.enter();

    match args.config.item {
        Item::Limits => run_matcher(&args, source.as_mut(), overlay.as_mut())?,
        _ => run_tracker(&args, source.as_mut(), overlay.as_mut())?,
    }

    std::mem::drop(header_span_enter);
    std::mem::drop(header_span);

    Ok(())
}

fn run_tracker(args: &Args, source: &mut dyn FrameSource, overlay: &mut dyn Overlay) -> Result<()> {
    let config = &args.config;
    let mut session = Session::new(
        config,
        Box::new(OpticalFlow::new(config)),
        Box::new(Detector::new()),
    );
    let mut initial_region = args
        .region
        .as_deref()
        .map(str::parse::<Region>)
        .transpose()?;

    loop {
        let frame = source.next_frame()?;

        for event in overlay.pointer_events() {
            session.handle_pointer(event);
        }
        // seeding needs a frame to detect on
        if session.previous_frame().is_some() {
            if let Some(region) = initial_region.take() {
                session.commit(region);
            }
        }

        session.process(frame)?;
        Span::current().pb_inc(1);

        let control = match session.previous_frame() {
            Some(frame) => overlay.present(&Scene {
                frame,
                points: session.points(),
                region: session.region(),
                pending: session.selection().pending_start(),
            })?,
            None => Control::Continue,
        };
        if control == Control::Quit {
            info!(
                "quit after {} frames, {} of {} points still tracked",
                session.step(),
                session.active_count(),
                session.points().len()
            );
            return Ok(());
        }
    }
}

fn run_matcher(args: &Args, source: &mut dyn FrameSource, overlay: &mut dyn Overlay) -> Result<()> {
    let mut matcher = Matcher::new(load_references(args)?);
    if matcher.is_empty() {
        bail!("no reference photograph in {}", args.folder.display());
    }
    let mut optical_flow = OpticalFlow::new(&args.config);

    loop {
        let frame = source.next_frame()?;
        let report = matcher.match_frame(&mut optical_flow, &frame)?;
        Span::current().pb_inc(1);

        // photographs are fixed, pointer input has no effect here
        let _ = overlay.pointer_events();
        let scene = Scene {
            frame: &frame,
            points: &report.points,
            region: None,
            pending: None,
        };
        if overlay.present(&scene)? == Control::Quit {
            info!(
                "found pixels: {} out of {} ({:.1}%)",
                report.found,
                report.total,
                100. * report.ratio()
            );
            return Ok(());
        }
    }
}

fn open_source(args: &Args) -> Result<Box<dyn FrameSource>> {
    if args.synthetic {
        let (width, height) = SYNTHETIC_SHAPE;
        return Ok(Box::new(SyntheticSource::new(
            width,
            height,
            Vector2d::new(1.0, 0.5),
            args.config.seed,
        )?));
    }
    open_camera(args.camera)
}

fn open_overlay(args: &Args) -> Result<Box<dyn Overlay>> {
    if args.headless {
        return Ok(Box::new(Headless::new(args.frames)));
    }
    open_viewer()
}

#[cfg(feature = "opencv")]
fn open_camera(index: i32) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(lk_tracker::camera::CameraSource::new(index)?))
}

#[cfg(not(feature = "opencv"))]
fn open_camera(index: i32) -> Result<Box<dyn FrameSource>> {
    bail!("camera {index} unavailable: built without the `opencv` feature, use --synthetic")
}

#[cfg(feature = "opencv")]
fn open_viewer() -> Result<Box<dyn Overlay>> {
    Ok(Box::new(lk_tracker::visualization::Viewer::new("Frame")?))
}

#[cfg(not(feature = "opencv"))]
fn open_viewer() -> Result<Box<dyn Overlay>> {
    bail!("no display: built without the `opencv` feature, use --headless")
}

#[cfg(feature = "opencv")]
fn load_references(args: &Args) -> Result<Vec<Reference>> {
    let coordinates = args.coordinates.clone().unwrap_or_else(|| {
        let mut name = args.folder.clone().into_os_string();
        name.push("_coordinates.json");
        PathBuf::from(name)
    });
    lk_tracker::camera::load_references(&args.folder, &coordinates)
}

#[cfg(not(feature = "opencv"))]
fn load_references(args: &Args) -> Result<Vec<Reference>> {
    bail!(
        "cannot decode the photographs of {}: built without the `opencv` feature",
        args.folder.display()
    )
}
