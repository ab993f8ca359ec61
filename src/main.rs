use std::path::PathBuf;
use std::thread;

use anyhow::Context;
use clap::Parser;

use eye_recolor::app::EyeRecolorApp;
use eye_recolor::config::AppConfig;
use eye_recolor::landmarks::mediapipe::MediapipeFaceMesh;
use eye_recolor::landmarks::ThreadedLandmarkSource;
use eye_recolor::scheduler::{control_channel, Scheduler, SchedulerControl, SchedulerOptions};
use eye_recolor::state::{self, ModelStatus, SharedState};
use eye_recolor::surface::ImageSurface;
use eye_recolor::ticker::RefreshTicker;
use eye_recolor::webcam::{self, Webcam};

/// Live webcam view that recolors the irises of every detected face.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON configuration file
    #[arg(short, long, default_value = "eye-recolor.json")]
    config: PathBuf,

    /// Camera index, overrides the configuration
    #[arg(short, long)]
    device: Option<u32>,

    /// Path to the face mesh ONNX model, overrides the configuration
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Start with the debug overlay enabled
    #[arg(long)]
    debug: bool,

    /// List cameras and exit
    #[arg(long)]
    list: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.list {
        for (i, name) in webcam::list_devices()?.iter().enumerate() {
            println!("{i}: {name}");
        }
        return Ok(());
    }

    let mut config = AppConfig::load(Some(&args.config))
        .with_context(|| format!("reading {}", args.config.display()))?;
    if let Some(device) = args.device {
        config.camera.device = device;
    }
    if let Some(model) = args.model {
        config.model.path = model;
    }
    config.display.debug_on_start |= args.debug;
    config.validate()?;

    let shared_state = state::new_shared();
    let (handle, control) = control_channel();

    let thread_data = shared_state.clone();
    let pipeline = thread::Builder::new()
        .name("pipeline".into())
        .spawn(move || pipeline_thread(config, thread_data, control))
        .context("spawning the pipeline thread")?;

    let native_options = eframe::NativeOptions::default();
    let gui_handle = handle.clone();
    eframe::run_native(
        "Eye Recolor",
        native_options,
        Box::new(move |cc| Box::new(EyeRecolorApp::new(cc, shared_state, gui_handle))),
    )
    .map_err(|err| anyhow::anyhow!("{err}"))?;

    handle.stop();
    if pipeline.join().is_err() {
        log::error!("pipeline thread panicked");
    }
    Ok(())
}

fn pipeline_thread(config: AppConfig, shared_state: SharedState, control: SchedulerControl) {
    state::lock(&shared_state).model = ModelStatus::Loading;

    let model = config.model.clone();
    let source = match ThreadedLandmarkSource::spawn("inference", move || {
        MediapipeFaceMesh::load(&model.path, model.intra_threads, model.face_threshold)
    }) {
        Ok(source) => source,
        Err(err) => {
            state::lock(&shared_state).model = ModelStatus::Failed(err.to_string());
            state::notify(&shared_state, format!("Failed to load model. {err}"));
            return;
        }
    };
    state::lock(&shared_state).model = ModelStatus::Loaded;

    let text_style = match config.text_style() {
        Ok(style) => style,
        Err(err) => {
            state::notify(&shared_state, err.to_string());
            return;
        }
    };

    let camera = config.camera.clone();
    let mut surface =
        ImageSurface::new(camera.width, camera.height).with_sink(shared_state.clone());
    if let Some(path) = &config.display.font_path {
        match ImageSurface::load_font(path) {
            Ok(font) => surface = surface.with_font(font),
            Err(err) => log::warn!("keeping the bundled font: {err}"),
        }
    }

    let options = SchedulerOptions {
        text_style,
        debug: config.display.debug_on_start,
    };
    let ticker = RefreshTicker::new(config.display.refresh_rate);
    let mut scheduler =
        Scheduler::new(source, surface, ticker, control, options).with_shared(shared_state);

    if scheduler
        .acquire(|| Webcam::open(camera.device, camera.width, camera.height))
        .is_err()
    {
        return;
    }

    pollster::block_on(scheduler.run());
}
