// Capture session state machine.
//
// Everything is driven by `tick(now)` from the one cooperative loop: worker
// outcomes are drained, due timers fire, then exactly one camera read is made.
// Encoding and printing happen on the pipeline worker, so a tick never blocks
// on disk or on the spooler.

use crate::camera::FrameSource;
use crate::error::Error;
use crate::overlay::{Overlay, apply_overlay};
use crate::printer::JobStatus;
use crate::types::{CapturedPhoto, Frame};
use crate::worker::{Job, Outcome, PipelineWorker};
use chrono::Local;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    CountingDown(u32),
    Capturing,
    Reviewing,
    Printing,
    Error,
}

impl SessionState {
    /// Start and retake are only possible from here.
    pub fn accepts_trigger(self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Reviewing)
    }
}

/// The two things the presentation layer can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// Start a capture, or retake while reviewing.
    Trigger,
    PrintRequest,
}

/// What the presentation layer gets told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    Countdown(u32),
    CaptureComplete { path: std::path::PathBuf },
    PrintStatus(String),
}

#[derive(Debug, Clone, Copy)]
pub struct SessionTiming {
    pub countdown_from: u32,
    pub countdown_interval: Duration,
    pub result_delay: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            countdown_from: 5,
            countdown_interval: Duration::from_millis(1000),
            result_delay: Duration::from_millis(3000),
        }
    }
}

/// Per-session data every capture and print goes through.
pub struct SessionContext {
    /// Decided once at session start; `None` means no overlay for good.
    pub overlay: Option<Overlay>,
    /// The reviewed photo. A retake replaces it, nothing edits it.
    pub photo: Option<CapturedPhoto>,
}

impl SessionContext {
    pub fn new(overlay: Option<Overlay>) -> Self {
        Self { overlay, photo: None }
    }
}

pub struct Session<C: FrameSource> {
    camera: C,
    worker: PipelineWorker,
    ctx: SessionContext,
    timing: SessionTiming,
    state: SessionState,
    next_countdown: Option<Instant>,
    /// Delayed transition after a print result has been on screen long enough.
    resume: Option<(Instant, SessionState)>,
    /// Photo handed to the worker, waiting for its path.
    saving: Option<CapturedPhoto>,
    status: Option<String>,
    events: Vec<SessionEvent>,
}

impl<C: FrameSource> Session<C> {
    pub fn new(camera: C, worker: PipelineWorker, ctx: SessionContext, timing: SessionTiming) -> Self {
        Self {
            camera,
            worker,
            ctx,
            timing,
            state: SessionState::Idle,
            next_countdown: None,
            resume: None,
            saving: None,
            status: None,
            events: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Last user-facing status line, if any.
    pub fn status_text(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn photo(&self) -> Option<&CapturedPhoto> {
        self.ctx.photo.as_ref()
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn handle_input(&mut self, input: Input, now: Instant) {
        match input {
            Input::Trigger => self.trigger(now),
            Input::PrintRequest => self.request_print(),
        }
    }

    fn trigger(&mut self, now: Instant) {
        if !self.state.accepts_trigger() {
            debug!(state = ?self.state, "trigger ignored");
            return;
        }
        self.set_status(None);
        self.start_countdown(self.timing.countdown_from, now);
    }

    fn start_countdown(&mut self, from: u32, now: Instant) {
        if from == 0 {
            self.next_countdown = None;
            self.set_state(SessionState::Capturing);
            return;
        }
        info!(remaining = from, "countdown started");
        self.set_state(SessionState::CountingDown(from));
        self.events.push(SessionEvent::Countdown(from));
        self.next_countdown = Some(now + self.timing.countdown_interval);
    }

    fn request_print(&mut self) {
        if self.state != SessionState::Reviewing {
            debug!(state = ?self.state, "print request ignored");
            return;
        }
        let Some(photo) = &self.ctx.photo else {
            return;
        };
        let Some(path) = photo.path.clone() else {
            return;
        };
        let job = Job::Print { photo: Arc::clone(&photo.image), photo_path: path };
        match self.worker.submit(job) {
            Ok(()) => {
                self.set_state(SessionState::Printing);
                self.set_status(Some("Printing...".to_string()));
            }
            Err(error) => {
                warn!(%error, "could not queue print job");
                self.set_status(Some(error.user_message()));
            }
        }
    }

    /// Advance the session by one scheduler tick. Returns the frame read this
    /// tick (if any) for the preview.
    pub fn tick(&mut self, now: Instant) -> Option<Frame> {
        loop {
            match self.worker.try_recv() {
                Ok(Some(outcome)) => self.on_outcome(outcome, now),
                Ok(None) => break,
                Err(error) => {
                    self.on_worker_lost(error);
                    break;
                }
            }
        }
        self.fire_timers(now);

        let read = self.camera.read();
        if self.state == SessionState::Capturing && self.saving.is_none() {
            return self.capture(read);
        }
        match read {
            Ok(frame) if frame.is_well_formed() => Some(frame),
            Ok(frame) => {
                debug!(width = frame.width, height = frame.height, "malformed frame skipped");
                None
            }
            Err(e) => {
                debug!(error = %e, "camera read skipped");
                None
            }
        }
    }

    fn fire_timers(&mut self, now: Instant) {
        if let (SessionState::CountingDown(n), Some(due)) = (self.state, self.next_countdown) {
            if now >= due {
                let remaining = n.saturating_sub(1);
                info!(remaining, "countdown tick");
                if remaining == 0 {
                    self.next_countdown = None;
                    self.set_state(SessionState::Capturing);
                } else {
                    self.set_state(SessionState::CountingDown(remaining));
                    self.events.push(SessionEvent::Countdown(remaining));
                    self.next_countdown = Some(due + self.timing.countdown_interval);
                }
            }
        }
        if let Some((due, next)) = self.resume {
            if now >= due {
                self.resume = None;
                if next == SessionState::Idle {
                    self.set_status(None);
                }
                self.set_state(next);
            }
        }
    }

    /// The capture read: stamp the overlay and hand the photo to the worker.
    fn capture(&mut self, read: Result<Frame, Error>) -> Option<Frame> {
        let frame = match read {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "capture read failed, back to idle");
                self.set_state(SessionState::Idle);
                return None;
            }
        };
        if !frame.is_well_formed() {
            debug!(
                width = frame.width,
                height = frame.height,
                len = frame.data.len(),
                "malformed capture frame, back to idle"
            );
            self.set_state(SessionState::Idle);
            return None;
        }

        debug!(
            width = frame.width,
            height = frame.height,
            age_ms = frame.captured_at.elapsed().as_millis() as u64,
            "capture frame"
        );
        let image = Arc::new(apply_overlay(frame.to_rgba(), self.ctx.overlay.as_ref()));
        let photo = CapturedPhoto { image: Arc::clone(&image), created_at: Local::now(), path: None };
        let job = Job::SavePhoto { photo: image, taken_at: photo.created_at };
        match self.worker.submit(job) {
            Ok(()) => self.saving = Some(photo),
            Err(error) => {
                warn!(%error, "could not queue photo for saving");
                self.set_status(Some(error.user_message()));
                self.set_state(SessionState::Idle);
            }
        }
        Some(frame)
    }

    fn on_outcome(&mut self, outcome: Outcome, now: Instant) {
        let resume_at = now + self.timing.result_delay;
        match outcome {
            Outcome::PhotoSaved { path } => {
                let Some(mut photo) = self.saving.take() else {
                    return;
                };
                info!(path = %path.display(), "capture complete");
                photo.path = Some(path.clone());
                self.ctx.photo = Some(photo);
                self.events.push(SessionEvent::CaptureComplete { path });
                self.set_state(SessionState::Reviewing);
            }
            Outcome::SaveFailed { error } => {
                self.saving = None;
                self.set_status(Some(error.user_message()));
                self.set_state(SessionState::Idle);
            }
            Outcome::Printed(receipt) => match receipt.status {
                JobStatus::Accepted { job_id } => {
                    info!(job = ?job_id, artifact = %receipt.artifact.display(), "print sent");
                    self.set_status(Some("Print sent".to_string()));
                    self.resume = Some((resume_at, SessionState::Idle));
                }
                JobStatus::Rejected { reason } => {
                    let error = Error::Print(reason);
                    warn!(%error, "printer rejected the job");
                    self.set_status(Some(error.user_message()));
                    self.resume = Some((resume_at, SessionState::Reviewing));
                }
            },
            Outcome::PrintFailed { error } => {
                self.set_status(Some(error.user_message()));
                if matches!(error, Error::TemplateMissing(_)) {
                    self.set_state(SessionState::Error);
                }
                self.resume = Some((resume_at, SessionState::Reviewing));
            }
        }
    }

    /// The worker thread is gone: nothing in flight will ever be answered.
    /// Whatever was waiting on it is released so the kiosk stays usable.
    fn on_worker_lost(&mut self, error: Error) {
        let waiting = self.saving.is_some()
            || (self.state == SessionState::Printing && self.resume.is_none());
        if !waiting {
            return;
        }
        warn!(%error, state = ?self.state, "pipeline worker lost");
        self.saving = None;
        self.set_status(Some(error.user_message()));
        let next = if self.ctx.photo.is_some() { SessionState::Reviewing } else { SessionState::Idle };
        self.set_state(next);
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "session state");
            self.state = state;
            self.events.push(SessionEvent::StateChanged(state));
        }
    }

    fn set_status(&mut self, status: Option<String>) {
        if let Some(text) = &status {
            self.events.push(SessionEvent::PrintStatus(text.clone()));
        }
        self.status = status;
    }
}
