use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use crate::{camera::Camera, cascade::HaarCascade, cli::Args, display::Window, session::Session};

pub fn run() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    let args: Args = argh::from_env();

    let config = args.session_config();
    config.validate().context("invalid session settings")?;

    // The classifier has to be usable before the camera is touched.
    let cascade = HaarCascade::load(&args.cascade, args.detect_params())
        .context("failed to load cascade classifier")?;
    let params = cascade.params();
    tracing::info!(
        "Detecting with {}: scale factor {}, min neighbors {}, min size {}x{}",
        cascade.path().display(),
        params.scale_factor,
        params.min_neighbors,
        params.min_size.width,
        params.min_size.height
    );

    let mut camera = Camera::open(args.camera).context("failed to open camera")?;
    camera.request_resolution(args.width, args.height);
    let (width, height) = camera.resolution()?;
    tracing::info!("Camera {}: {}x{}", camera.index(), width, height);

    let window = Window::open(&args.window)?;

    tracing::info!("Controls: ESC/Q quit");

    let report = Session::new(camera, cascade, window, config).run();
    println!("{}", report.summary);
    report.into_result().map(|_| ())
}
