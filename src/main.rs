mod build_info;
mod cli;
mod config;
mod detection;
mod detection_store;
mod detector;
mod font;
mod host;
mod logging;
mod overlay;
mod session;
mod settings;
mod subscription;
mod surface;

#[allow(unused_imports)]
use log::{Level, trace, debug, info, warn, error};

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::build_info::BuildInfo;
use crate::cli::Args;
use crate::config::{APP_NAME, FALLBACK_FONT_FAMILIES};
use crate::detection::ImageFrame;
use crate::detector::ReplayDetector;
use crate::font::LabelFont;
use crate::host::HeadlessHost;
use crate::overlay::{OverlayRenderer, RenderOutcome};
use crate::session::OverlaySession;
use crate::settings::UserSettings;
use crate::surface::raster::RasterSurface;
use crate::surface::recording::RecordingSurface;
use crate::surface::Surface;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.version {
        println!("{} {}", APP_NAME, BuildInfo::display_version());
        println!("{}", BuildInfo::detailed_info());
        return Ok(());
    }

    let log_buffer = logging::setup_logger(args.verbose);
    logging::setup_panic_hook(APP_NAME, log_buffer.clone());
    info!("Starting {} {}", APP_NAME, BuildInfo::build_string());

    let result = run(&args).await;

    if args.export_logs {
        match logging::export_debug_logs(APP_NAME, &log_buffer) {
            Ok(path) => println!("Debug logs exported to: {}", path.display()),
            Err(e) => eprintln!("Failed to export debug logs: {e}"),
        }
    }

    result
}

/// Apply command line overrides on top of the loaded settings
fn apply_overrides(settings: &mut UserSettings, args: &Args) {
    if let Some(width) = args.line_width {
        settings.line_width = width;
    }
    if let Some(size) = args.font_size {
        settings.font_size = size;
    }
    if let Some(padding) = args.padding {
        settings.label_padding = padding;
    }
    if args.clamp_labels {
        settings.clamp_labels = true;
    }
    if let Some(font) = &args.font {
        settings.font_path = font.clone();
    }
    if let Some((width, height)) = args.display {
        settings.display_width = width;
        settings.display_height = height;
    }
    if let Some(ratio) = args.dpr {
        settings.device_pixel_ratio = ratio;
    }
}

async fn run(args: &Args) -> Result<()> {
    let (Some(image_path), Some(response_path)) = (&args.image, &args.response) else {
        bail!("--image and --response are required");
    };

    let mut settings = UserSettings::load(args.settings.as_deref());
    apply_overrides(&mut settings, args);
    if args.save_settings {
        let saved = match &args.settings {
            Some(path) => settings.save_to(Path::new(path)),
            None => settings.save(),
        };
        if let Err(e) = saved {
            warn!("{}", e);
        }
    }

    let image_bytes = tokio::fs::read(image_path)
        .await
        .with_context(|| format!("failed to read image {}", image_path.display()))?;
    let base = image::load_from_memory(&image_bytes)
        .with_context(|| format!("failed to decode image {}", image_path.display()))?
        .to_rgba8();
    let frame = ImageFrame::new(base.width(), base.height());
    info!("Loaded {} ({}x{})", image_path.display(), frame.width, frame.height);

    let font = LabelFont::resolve(settings.font_path(), FALLBACK_FONT_FAMILIES);

    let mut host = HeadlessHost::new(
        settings.display_width,
        settings.display_height,
        settings.device_pixel_ratio,
    );
    host.set_natural_size(Some(frame));
    host.mount(RasterSurface::new(font.clone()));

    let renderer = OverlayRenderer::new(settings.overlay_style());
    let mut session = OverlaySession::new(host, renderer);

    let detector = ReplayDetector::new(response_path);
    match session
        .submit(&detector, &image_bytes)
        .await
        .context("detection failed")?
    {
        Some(outcome) => report_outcome(&outcome),
        None => warn!("Detection result arrived for a replaced image and was dropped"),
    }

    print_results(&session);

    for step in &args.resize {
        if let Some(ratio) = step.device_pixel_ratio {
            session.host_mut().set_device_pixel_ratio(ratio);
        }
        session.host_mut().resize(step.width, step.height);
        for outcome in session.pump() {
            report_outcome(&outcome);
        }
    }

    let surface = session
        .host()
        .surface()
        .context("overlay surface is not mounted")?;
    let (backing_width, backing_height) = surface.backing_size();
    let (css_width, css_height) = surface.css_size();
    info!(
        "Overlay backing {}x{}, displayed at {:.0}x{:.0}",
        backing_width, backing_height, css_width, css_height
    );
    let composite = surface.composite_over(&base);

    if let Some(out) = &args.out {
        composite
            .save(out)
            .with_context(|| format!("failed to write {}", out.display()))?;
        println!("Overlay written to {}", out.display());
    }

    if let Some(out) = &args.display_out {
        let view = displayed_view(&composite, &session);
        view.save(out)
            .with_context(|| format!("failed to write {}", out.display()))?;
        println!("Displayed view written to {}", out.display());
    }

    if let Some(out) = &args.commands {
        let mut recorder = RecordingSurface::new(font);
        session.render_onto(&mut recorder);
        let json = serde_json::to_string_pretty(&recorder.display_list())?;
        tokio::fs::write(out, json)
            .await
            .with_context(|| format!("failed to write {}", out.display()))?;
        println!("Draw commands written to {}", out.display());
    }

    Ok(())
}

fn print_results<H: host::SurfaceProvider>(session: &OverlaySession<H>) {
    let snapshot = session.snapshot();
    let Some(detections) = snapshot.detections().filter(|d| !d.is_empty()) else {
        println!("No results to display");
        return;
    };

    println!("Results:");
    for detection in detections {
        let bbox = detection.bbox.to_array().map(|c| c.to_string());
        println!("  {}", detection.label);
        println!("    Confidence: {:.2}", detection.confidence);
        println!("    Bounding box: {}", bbox.join(", "));
    }
    let summary: Vec<String> = detections
        .summary()
        .into_iter()
        .map(|(label, count)| format!("{label} x{count}"))
        .collect();
    println!("Summary: {}", summary.join(", "));
}

fn report_outcome(outcome: &RenderOutcome) {
    match outcome {
        RenderOutcome::Painted(_) => debug!("Painted {} box(es)", outcome.painted().len()),
        RenderOutcome::Cleared => debug!("Overlay cleared"),
        RenderOutcome::InvalidViewport => warn!("Displayed size is not drawable; overlay left as is"),
        RenderOutcome::SurfaceUnavailable => warn!("Overlay surface unavailable"),
    }
}

/// What the user sees: the composite scaled to displayed size times the pixel ratio
fn displayed_view<H: host::SurfaceProvider>(composite: &RgbaImage, session: &OverlaySession<H>) -> RgbaImage {
    let (width, height) = session.host().displayed_size();
    let ratio = session.host().device_pixel_ratio().max(1.0);
    let target_width = (width * ratio).round().max(1.0) as u32;
    let target_height = (height * ratio).round().max(1.0) as u32;
    imageops::resize(composite, target_width, target_height, FilterType::Triangle)
}
