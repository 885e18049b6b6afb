// Background pipeline worker. Encoding and print dispatch block, so they run
// on their own thread; the session loop feeds jobs in and drains outcomes
// once per tick without ever waiting.

use crate::error::{Error, Result};
use crate::pipeline::{PrintPipeline, PrintReceipt};
use chrono::{DateTime, Local};
use image::RgbaImage;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

pub enum Job {
    SavePhoto { photo: Arc<RgbaImage>, taken_at: DateTime<Local> },
    Print { photo: Arc<RgbaImage>, photo_path: PathBuf },
}

#[derive(Debug)]
pub enum Outcome {
    PhotoSaved { path: PathBuf },
    SaveFailed { error: Error },
    Printed(PrintReceipt),
    PrintFailed { error: Error },
}

pub struct PipelineWorker {
    jobs: Option<Sender<Job>>,
    outcomes: Receiver<Outcome>,
    handle: Option<JoinHandle<()>>,
}

impl PipelineWorker {
    pub fn spawn(pipeline: PrintPipeline) -> Result<Self> {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (out_tx, out_rx) = mpsc::channel::<Outcome>();
        let handle = thread::Builder::new()
            .name("kiosk-pipeline".into())
            .spawn(move || run(pipeline, job_rx, out_tx))
            .map_err(|e| Error::Worker(format!("spawn pipeline thread: {e}")))?;
        Ok(Self { jobs: Some(job_tx), outcomes: out_rx, handle: Some(handle) })
    }

    pub fn submit(&self, job: Job) -> Result<()> {
        let Some(tx) = &self.jobs else {
            return Err(Error::Worker("pipeline worker is shut down".into()));
        };
        tx.send(job).map_err(|_| Error::Worker("pipeline worker has stopped".into()))
    }

    /// Next finished outcome, if any. Never blocks.
    /// Errors once the worker thread is gone and nothing more will arrive.
    pub fn try_recv(&self) -> Result<Option<Outcome>> {
        match self.outcomes.try_recv() {
            Ok(outcome) => Ok(Some(outcome)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                Err(Error::Worker("pipeline worker has stopped".into()))
            }
        }
    }
}

impl Drop for PipelineWorker {
    fn drop(&mut self) {
        // closing the job channel ends the worker loop
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("pipeline worker panicked");
            }
        }
    }
}

fn run(mut pipeline: PrintPipeline, jobs: Receiver<Job>, outcomes: Sender<Outcome>) {
    for job in jobs {
        let outcome = match job {
            Job::SavePhoto { photo, taken_at } => match pipeline.save_photo(&photo, taken_at) {
                Ok(path) => Outcome::PhotoSaved { path },
                Err(error) => {
                    warn!(%error, "saving photo failed");
                    Outcome::SaveFailed { error }
                }
            },
            Job::Print { photo, photo_path } => match pipeline.print(&photo, &photo_path) {
                Ok(receipt) => {
                    debug!(accepted = receipt.status.is_accepted(), "print job handed off");
                    Outcome::Printed(receipt)
                }
                Err(error) => {
                    warn!(%error, photo = %photo_path.display(), "print attempt aborted");
                    Outcome::PrintFailed { error }
                }
            },
        };
        if outcomes.send(outcome).is_err() {
            break;
        }
    }
    debug!("pipeline worker exiting");
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::pipeline::PrintStyle;
    use crate::pipeline::tests::settings;
    use crate::printer::mock::{MockPrinter, PanickingPrinter};
    use crate::store::memory::MemoryStore;
    use image::Rgba;
    use std::time::{Duration, Instant};

    pub fn wait_for(worker: &PipelineWorker) -> Outcome {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if let Some(outcome) = worker.try_recv().unwrap() {
                return outcome;
            }
            assert!(Instant::now() < deadline, "worker produced no outcome");
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn worker(store: MemoryStore, printer: MockPrinter, style: PrintStyle) -> PipelineWorker {
        let pipeline = PrintPipeline::new(
            Box::new(store),
            Box::new(printer),
            settings(style, PathBuf::from("/missing/diploma.png")),
        );
        PipelineWorker::spawn(pipeline).unwrap()
    }

    fn photo() -> Arc<RgbaImage> {
        Arc::new(RgbaImage::from_pixel(16, 12, Rgba([90, 120, 150, 255])))
    }

    #[test]
    fn empty_outcome_queue_does_not_block() {
        let w = worker(MemoryStore::default(), MockPrinter::accepting(), PrintStyle::Photo);
        assert!(w.try_recv().unwrap().is_none());
    }

    #[test]
    fn dead_worker_is_reported() {
        let w = PipelineWorker::spawn(PrintPipeline::new(
            Box::new(MemoryStore::default()),
            Box::new(PanickingPrinter),
            settings(PrintStyle::Photo, PathBuf::from("/missing/diploma.png")),
        ))
        .unwrap();
        w.submit(Job::Print { photo: photo(), photo_path: PathBuf::from("/mem/photo.png") }).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let err = loop {
            match w.try_recv() {
                Ok(None) => {
                    assert!(Instant::now() < deadline, "worker never went away");
                    thread::sleep(Duration::from_millis(5));
                }
                Ok(Some(other)) => panic!("unexpected outcome {other:?}"),
                Err(err) => break err,
            }
        };
        assert!(matches!(err, Error::Worker(_)));
        assert!(w.submit(Job::SavePhoto { photo: photo(), taken_at: Local::now() }).is_err());
    }

    #[test]
    fn save_then_print_round_trip() {
        let store = MemoryStore::default();
        let printer = MockPrinter::accepting();
        let w = worker(store.clone(), printer.clone(), PrintStyle::Photo);

        let photo = photo();
        w.submit(Job::SavePhoto { photo: photo.clone(), taken_at: Local::now() }).unwrap();
        let Outcome::PhotoSaved { path } = wait_for(&w) else { panic!("expected a saved photo") };
        assert_eq!(store.get(&path).unwrap().to_rgba8().as_raw(), photo.as_raw());

        w.submit(Job::Print { photo, photo_path: path }).unwrap();
        match wait_for(&w) {
            Outcome::Printed(receipt) => assert!(receipt.status.is_accepted()),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(printer.submitted().len(), 1);
    }

    #[test]
    fn failures_come_back_as_outcomes() {
        let store = MemoryStore { fail_saves: true, ..MemoryStore::default() };
        let w = worker(store, MockPrinter::accepting(), PrintStyle::Diploma);

        w.submit(Job::SavePhoto { photo: photo(), taken_at: Local::now() }).unwrap();
        assert!(matches!(wait_for(&w), Outcome::SaveFailed { .. }));

        w.submit(Job::Print { photo: photo(), photo_path: PathBuf::from("/mem/photo.png") }).unwrap();
        match wait_for(&w) {
            Outcome::PrintFailed { error } => assert!(matches!(error, Error::TemplateMissing(_))),
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
