//! Headless avatar face capture: tracks the webcam and drives an in-memory rig.

use anyhow::{Context, Result};
use avatar_face_capture::{
    app::AvatarApp,
    config::Config,
    cursor_control::X11Pointer,
    rig::StandaloneRig,
};
use clap::Parser;
use log::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Camera index to use
    #[arg(long)]
    cam: Option<i32>,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<String>,

    /// Render loop frame rate cap
    #[arg(long)]
    fps: Option<u32>,

    /// Smooth each eye independently
    #[arg(long)]
    no_equalize_eyes: bool,

    /// Keep the eyeballs centred instead of following the pointer
    #[arg(long)]
    no_eyeball_cursor: bool,

    /// Extra wait after each tracked frame, in milliseconds
    #[arg(long)]
    capture_delay_ms: Option<u64>,

    /// Stop after this many render frames
    #[arg(long)]
    frames: Option<u64>,

    /// Print the example configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if args.print_config {
        print!("{}", avatar_face_capture::config::EXAMPLE_CONFIG);
        return Ok(());
    }

    info!("Avatar Face Capture");

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {path}");
            Config::from_file(path).unwrap_or_else(|e| {
                warn!("Failed to load config file: {e}. Using defaults.");
                Config::default()
            })
        }
        None => Config::default(),
    };

    if let Some(cam) = args.cam {
        config.camera.device = cam;
    }
    if let Some(fps) = args.fps {
        config.render.target_fps = fps;
    }
    if let Some(delay) = args.capture_delay_ms {
        config.camera.capture_delay_ms = delay;
    }
    if args.no_equalize_eyes {
        config.smoothing.equalize_eyes = false;
    }
    if args.no_eyeball_cursor {
        config.smoothing.eyeball_follow_cursor = false;
    }
    config.validate().context("Invalid configuration")?;

    let mut app = AvatarApp::new(config.clone());
    if config.smoothing.eyeball_follow_cursor {
        match X11Pointer::new() {
            Ok(pointer) => app = app.with_pointer(Box::new(pointer)),
            Err(e) => warn!("Eyeballs will not follow the pointer: {e}"),
        }
    }

    app.load_model(Box::new(StandaloneRig::with_default_parameters()));

    if let Err(e) = config.check_model_files() {
        warn!("{e}");
    }
    match app.open_camera() {
        Ok(()) => info!("Successfully opened the camera"),
        Err(e) => warn!("Can't open the camera: {e}. Running with manual parameters."),
    }

    app.run(args.frames).context("Render loop failed")?;
    info!("Application shutting down");
    Ok(())
}
