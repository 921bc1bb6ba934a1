// src/main.rs
use anyhow::{Context, Result};
use image::DynamicImage;
use motion3d::analysis::{analyze_session, LiveMetrics};
use motion3d::capture::{lock_session, shared, CaptureAdapter, CaptureClock, CaptureLoop, VideoFrame};
use motion3d::export::Exporter;
use motion3d::simulation::SimulatedPose;
use motion3d::{MotionSession, Settings};
use std::time::Duration;
use tracing::info;

const DEMO_FPS: f64 = 30.0;
const DEMO_SECONDS: f64 = 4.0;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    let settings = Settings::from_env().context("loading settings")?;
    info!("Output directory: {}", settings.output_directory.display());

    let session = shared(MotionSession::from_settings(&settings));
    let capture = CaptureLoop::start(
        CaptureAdapter::new(SimulatedPose::default()),
        session.clone(),
        CaptureClock::MediaPosition,
    )
    .await
    .context("starting capture")?;

    lock_session(&session).start_recording();

    // Feed a synthetic camera at the nominal rate.
    let blank = DynamicImage::new_rgb8(64, 48);
    let frame_count = (DEMO_FPS * DEMO_SECONDS) as u64;
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / DEMO_FPS));
    for sequence in 0..frame_count {
        ticker.tick().await;
        capture.submit(VideoFrame::new(sequence, sequence as f64 / DEMO_FPS, blank.clone()));

        if sequence % DEMO_FPS as u64 == 0 {
            let metrics = LiveMetrics::from_session(&lock_session(&session), settings.recent_velocity_frames);
            info!(
                "t={:.1}s wrists L {:.2} R {:.2} u/s, symmetry {:.0}% ({:?})",
                sequence as f64 / DEMO_FPS,
                metrics.left_wrist_speed,
                metrics.right_wrist_speed,
                metrics.symmetry_score,
                metrics.symmetry_status,
            );
        }
    }

    // Let the last frame reach the session before stopping.
    tokio::time::sleep(Duration::from_millis(50)).await;
    lock_session(&session).stop_recording();
    let adapter = capture.stop().await.context("stopping capture")?;
    info!("Capture stats: {:?}", adapter.stats());

    let session = lock_session(&session);
    let report = analyze_session(&session, settings.smoothing_window);
    info!(
        "Analysed {} frames over {:.0}ms ({:.1} fps), symmetry {:?}",
        report.frame_count, report.duration, report.fps, report.metrics.symmetry_score
    );
    for (joint, rom) in &report.metrics.range_of_motion {
        info!("  {:<15} {:6.1} - {:6.1} deg", joint, rom.min, rom.max);
    }

    let exporter = Exporter::new(&settings.output_directory);
    let json = exporter.export_json(&session).context("exporting frames")?;
    let csv = exporter.export_angle_csv(&session).context("exporting angle table")?;
    println!("Frames: {}", json.display());
    println!("Angles: {}", csv.display());

    Ok(())
}
