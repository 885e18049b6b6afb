// Photo kiosk.
// • Live (mirrored) camera preview fills the window.
// • SPACE or R starts a countdown; at zero a photo is taken, stamped with the
//   branding overlay and saved. The photo stays on screen for review.
// • P prints the reviewed photo (sketch on the diploma template by default).
// • R again retakes. ESC quits.

mod anim;
mod camera;
mod composite;
mod config;
mod diploma;
mod draw;
mod error;
mod layout;
mod overlay;
mod pipeline;
mod printer;
mod scaler;
mod session;
mod sketch;
mod store;
mod types;
mod worker;

use anim::Pulse;
use camera::CameraCapture;
use chrono::Local;
use clap::Parser;
use config::{Cli, KioskConfig};
use draw::{Drawer, draw_status_banner, draw_text_centered};
use error::Error;
use image::RgbImage;
use image::RgbaImage;
use image::buffer::ConvertBuffer;
use overlay::Overlay;
use pipeline::PrintPipeline;
use printer::{DryRunPrinter, LpPrinter, Printer};
use scaler::{fit_image, scale_frame};
use session::{Input, Session, SessionContext, SessionEvent, SessionState};
use std::sync::Arc;
use std::time::Instant;
use store::FsStore;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;
use types::FrameBuffer;
use worker::PipelineWorker;

const BACKDROP: u32 = 0x0010_1010;
const COUNTDOWN_COLOR: u32 = 0x00FF_D84A;

/// Countdown digit currently on screen, pulsing while it is shown.
struct CountdownHud {
    value: Option<u32>,
    pulse: Pulse,
}

impl CountdownHud {
    fn new() -> Self {
        Self { value: None, pulse: Pulse::new(16, 24, 1) }
    }

    fn on_event(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::Countdown(n) => {
                self.value = Some(*n);
                self.pulse.reset();
            }
            SessionEvent::StateChanged(SessionState::CountingDown(_)) => {}
            SessionEvent::StateChanged(_) => self.value = None,
            SessionEvent::CaptureComplete { path } => debug!(path = %path.display(), "showing new photo"),
            SessionEvent::PrintStatus(text) => debug!(%text, "status"),
        }
    }
}

/// The reviewed photo fitted to the window, rebuilt only when the photo or
/// the window size changes.
struct ReviewView {
    photo: Option<Arc<RgbaImage>>,
    viewport: Option<(u32, u32)>,
    buffer: FrameBuffer,
}

impl ReviewView {
    fn new() -> Self {
        Self { photo: None, viewport: None, buffer: FrameBuffer::filled(0, 0, 0) }
    }

    fn get(&mut self, photo: &Arc<RgbaImage>, viewport: Option<(u32, u32)>) -> &FrameBuffer {
        let same_photo = self.photo.as_ref().is_some_and(|p| Arc::ptr_eq(p, photo));
        if !same_photo || self.viewport != viewport {
            let rgb: RgbImage = photo.convert();
            self.buffer = fit_image(&rgb, viewport);
            self.photo = Some(Arc::clone(photo));
            self.viewport = viewport;
        }
        &self.buffer
    }
}

fn hint(state: SessionState) -> &'static str {
    match state {
        SessionState::Idle => "Press SPACE to start",
        SessionState::CountingDown(_) => "Smile!",
        SessionState::Capturing => "Hold still...",
        SessionState::Reviewing => "R: retake | P: print",
        SessionState::Printing => "Printing...",
        SessionState::Error => "Something went wrong",
    }
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("photo_kiosk=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = KioskConfig::from_cli(&cli)?;
    if cli.print_config {
        println!("{}", config.to_json()?);
        return Ok(());
    }

    /* --- Camera, assets, storage, printer ---
       The overlay is decided here once; a missing file means no overlay
       for the whole session. */
    let camera = CameraCapture::new(
        config.camera.index,
        config.camera.width,
        config.camera.height,
        config.camera.fps,
    )?;
    let (cw, ch) = camera.resolution();
    let overlay = Overlay::load_for_session(&config.assets.overlay);
    let store = FsStore::create(&config.storage.output_dir, Local::now())?;
    let session_dir = store.session_dir().to_path_buf();

    let printer: Box<dyn Printer> = if config.dry_run() {
        info!("no printer in use, print jobs are simulated");
        Box::new(DryRunPrinter)
    } else {
        Box::new(LpPrinter::new(config.print.printer.clone()))
    };

    /* --- Pipeline worker + session --- */
    let pipeline = PrintPipeline::new(Box::new(store), printer, config.print_settings());
    let worker = PipelineWorker::spawn(pipeline)?;
    let mut session = Session::new(camera, worker, SessionContext::new(overlay), config.session_timing());

    let mut drawer = Drawer::new(
        &config.window.title,
        config.window.width,
        config.window.height,
        config.window.target_fps,
    )?;
    info!(
        camera_width = cw,
        camera_height = ch,
        style = ?config.print.style,
        photos = %session_dir.display(),
        "kiosk ready"
    );

    let mut countdown = CountdownHud::new();
    let mut review = ReviewView::new();
    let mut preview: Option<FrameBuffer> = None;

    /* ------------------------------ Main loop ------------------------------ */
    while drawer.is_open() && !drawer.esc_pressed() {
        let now = Instant::now();

        /* 1) Inputs */
        if drawer.trigger_pressed_once() {
            session.handle_input(Input::Trigger, now);
        }
        if drawer.print_pressed_once() {
            session.handle_input(Input::PrintRequest, now);
        }

        /* 2) Session tick: worker outcomes, timers, one camera read */
        let viewport = drawer.viewport();
        if let Some(frame) = session.tick(now) {
            preview = Some(scale_frame(&frame, viewport));
        }
        for event in session.drain_events() {
            countdown.on_event(&event);
        }
        countdown.pulse.advance();

        /* 3) Compose the screen */
        let (sw, sh) = viewport
            .map(|(w, h)| (w as usize, h as usize))
            .unwrap_or((config.window.width, config.window.height));
        let mut screen = FrameBuffer::filled(sw, sh, BACKDROP);

        let state = session.state();
        let reviewing = matches!(
            state,
            SessionState::Reviewing | SessionState::Printing | SessionState::Error
        );
        match session.photo() {
            Some(photo) if reviewing => screen.blit_centered(review.get(&photo.image, viewport)),
            _ => {
                if let Some(p) = &preview {
                    screen.blit_centered(p);
                }
            }
        }

        if let Some(n) = countdown.value {
            let scale = countdown.pulse.size() as i32;
            draw_text_centered(&mut screen, sh as i32 / 2, &n.to_string(), scale, COUNTDOWN_COLOR);
        }
        let status = session.status_text().unwrap_or(hint(state));
        draw_status_banner(&mut screen, status, 3);

        /* 4) Present */
        drawer.present(&screen)?;
    }

    info!("kiosk closing");
    Ok(())
}
