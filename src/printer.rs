// Print dispatch boundary. The kiosk only learns whether the spooler took
// the job; physical completion is never observed.

use crate::layout::MediaSize;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PrintQuality {
    Draft,
    Normal,
    #[default]
    High,
}

/// Named options passed along with every job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintOptions {
    pub media: MediaSize,
    pub fit_to_page: bool,
    pub orientation: Orientation,
    pub quality: PrintQuality,
}

impl PrintOptions {
    /// `-o key=value` pairs in CUPS spelling.
    pub fn cups_args(&self) -> Vec<String> {
        let mut args = vec![format!("media={}", self.media.cups_name())];
        if self.fit_to_page {
            args.push("fit-to-page".to_string());
        }
        let orientation = match self.orientation {
            Orientation::Portrait => 3,
            Orientation::Landscape => 4,
        };
        args.push(format!("orientation-requested={orientation}"));
        let quality = match self.quality {
            PrintQuality::Draft => 3,
            PrintQuality::Normal => 4,
            PrintQuality::High => 5,
        };
        args.push(format!("print-quality={quality}"));
        args
    }
}

/// What the spooler said about a submitted job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Accepted { job_id: Option<String> },
    Rejected { reason: String },
}

impl JobStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(self, JobStatus::Accepted { .. })
    }
}

/// Anything that can take a finished page artifact.
pub trait Printer: Send {
    fn submit(&mut self, artifact: &Path, options: &PrintOptions) -> JobStatus;
}

/// CUPS `lp` front end.
pub struct LpPrinter {
    destination: Option<String>,
}

impl LpPrinter {
    /// `destination` of `None` prints to the system default printer.
    pub fn new(destination: Option<String>) -> Self {
        Self { destination }
    }

    fn command(&self, artifact: &Path, options: &PrintOptions) -> Command {
        let mut cmd = Command::new("lp");
        if let Some(dest) = &self.destination {
            cmd.arg("-d").arg(dest);
        }
        for opt in options.cups_args() {
            cmd.arg("-o").arg(opt);
        }
        cmd.arg(artifact);
        cmd
    }
}

impl Printer for LpPrinter {
    fn submit(&mut self, artifact: &Path, options: &PrintOptions) -> JobStatus {
        let output = match self.command(artifact, options).output() {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "could not run lp");
                return JobStatus::Rejected { reason: format!("could not run lp: {e}") };
            }
        };
        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let job_id = parse_request_id(&stdout);
            info!(artifact = %artifact.display(), job = ?job_id, "print job accepted");
            JobStatus::Accepted { job_id }
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr.trim().to_string();
            warn!(status = %output.status, %reason, "print job rejected");
            JobStatus::Rejected {
                reason: if reason.is_empty() { output.status.to_string() } else { reason },
            }
        }
    }
}

/// `lp` prints "request id is <queue>-<n> (1 file(s))".
fn parse_request_id(stdout: &str) -> Option<String> {
    let rest = stdout.split("request id is ").nth(1)?;
    rest.split_whitespace().next().map(str::to_string)
}

/// Accepts every job without touching a printer.
pub struct DryRunPrinter;

impl Printer for DryRunPrinter {
    fn submit(&mut self, artifact: &Path, options: &PrintOptions) -> JobStatus {
        info!(artifact = %artifact.display(), options = ?options.cups_args(), "Simulating print");
        JobStatus::Accepted { job_id: None }
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    /// Records submissions and answers with a fixed status.
    #[derive(Clone)]
    pub struct MockPrinter {
        pub jobs: Arc<Mutex<Vec<(PathBuf, PrintOptions)>>>,
        pub answer: JobStatus,
    }

    impl MockPrinter {
        pub fn accepting() -> Self {
            Self {
                jobs: Arc::default(),
                answer: JobStatus::Accepted { job_id: Some("kiosk-1".into()) },
            }
        }

        pub fn rejecting(reason: &str) -> Self {
            Self { jobs: Arc::default(), answer: JobStatus::Rejected { reason: reason.into() } }
        }

        pub fn submitted(&self) -> Vec<(PathBuf, PrintOptions)> {
            self.jobs.lock().unwrap().clone()
        }
    }

    impl Printer for MockPrinter {
        fn submit(&mut self, artifact: &Path, options: &PrintOptions) -> JobStatus {
            self.jobs.lock().unwrap().push((artifact.to_path_buf(), options.clone()));
            self.answer.clone()
        }
    }

    /// Takes the worker thread down with it.
    pub struct PanickingPrinter;

    impl Printer for PanickingPrinter {
        fn submit(&mut self, _artifact: &Path, _options: &PrintOptions) -> JobStatus {
            panic!("printer driver crashed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> PrintOptions {
        PrintOptions {
            media: MediaSize::A4,
            fit_to_page: true,
            orientation: Orientation::Portrait,
            quality: PrintQuality::High,
        }
    }

    #[test]
    fn cups_options_are_spelled_for_lp() {
        assert_eq!(
            options().cups_args(),
            vec!["media=A4", "fit-to-page", "orientation-requested=3", "print-quality=5"]
        );
    }

    #[test]
    fn lp_command_targets_the_named_printer() {
        let printer = LpPrinter::new(Some("Canon_SELPHY".into()));
        let cmd = printer.command(Path::new("/tmp/page.png"), &options());
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(cmd.get_program(), "lp");
        assert_eq!(&args[..2], ["-d", "Canon_SELPHY"]);
        assert_eq!(args.last().map(String::as_str), Some("/tmp/page.png"));
        assert_eq!(args.iter().filter(|a| *a == "-o").count(), 4);
    }

    #[test]
    fn default_printer_has_no_destination_flag() {
        let printer = LpPrinter::new(None);
        let cmd = printer.command(Path::new("/tmp/page.png"), &options());
        assert!(cmd.get_args().all(|a| a != "-d"));
    }

    #[test]
    fn request_id_is_parsed_from_lp_output() {
        assert_eq!(
            parse_request_id("request id is Canon_SELPHY-42 (1 file(s))\n"),
            Some("Canon_SELPHY-42".to_string())
        );
        assert_eq!(parse_request_id(""), None);
    }

    #[test]
    fn dry_run_accepts() {
        assert!(DryRunPrinter.submit(Path::new("/tmp/x.png"), &options()).is_accepted());
    }
}
