// Kiosk configuration: JSON file (every field optional) plus command-line
// overrides. Everything here is read once at startup.

use crate::diploma::DiplomaMargins;
use crate::error::{Error, Result};
use crate::layout::{MediaSize, PageSpec};
use crate::pipeline::{PrintSettings, PrintStyle};
use crate::printer::{Orientation, PrintOptions, PrintQuality};
use crate::session::SessionTiming;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug, Default)]
#[command(name = "photo-kiosk", version, about = "Unattended photo kiosk: preview, countdown, capture, print")]
pub struct Cli {
    /// JSON configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Camera index.
    #[arg(long)]
    pub camera: Option<u32>,

    /// CUPS printer name (default: dry run).
    #[arg(long)]
    pub printer: Option<String>,

    /// Simulate printing even when a printer is configured.
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, value_enum)]
    pub style: Option<PrintStyle>,

    #[arg(long, value_enum)]
    pub media: Option<MediaSize>,

    /// Root directory for session folders.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Branding overlay image.
    #[arg(long)]
    pub overlay: Option<PathBuf>,

    /// Diploma template image.
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    pub print_config: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    pub camera: CameraConfig,
    pub window: WindowConfig,
    pub assets: AssetsConfig,
    pub storage: StorageConfig,
    pub print: PrintConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self { index: 0, width: 1920, height: 1080, fps: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: usize,
    pub height: usize,
    pub target_fps: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { title: "Photo Kiosk".to_string(), width: 1280, height: 720, target_fps: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub overlay: PathBuf,
    pub diploma_template: PathBuf,
    pub diploma_margins: DiplomaMargins,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        let pictures = pictures_dir();
        Self {
            overlay: pictures.join("overlay.png"),
            diploma_template: pictures.join("diploma_template.png"),
            diploma_margins: DiplomaMargins::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { output_dir: pictures_dir().join("kiosk") }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintConfig {
    /// CUPS destination; `None` means simulate.
    pub printer: Option<String>,
    pub dry_run: bool,
    pub style: PrintStyle,
    pub media: MediaSize,
    pub dpi: u32,
    /// Share of the page width/height the picture may take.
    pub fill_fraction: f64,
    pub orientation: Orientation,
    pub quality: PrintQuality,
}

impl Default for PrintConfig {
    fn default() -> Self {
        Self {
            printer: None,
            dry_run: false,
            style: PrintStyle::default(),
            media: MediaSize::default(),
            dpi: 300,
            fill_fraction: 0.8,
            orientation: Orientation::default(),
            quality: PrintQuality::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub countdown_from: u32,
    pub countdown_interval_ms: u64,
    pub result_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { countdown_from: 5, countdown_interval_ms: 1000, result_delay_ms: 3000 }
    }
}

/// `~/Pictures`, or the working directory when there is no home.
fn pictures_dir() -> PathBuf {
    dirs::picture_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Pictures")))
        .unwrap_or_else(|| PathBuf::from("."))
}

impl KioskConfig {
    /// Defaults, or the given JSON file layered over them.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("read {}: {e}", path.display())))?;
        serde_json::from_str(&text).map_err(|e| Error::config(format!("parse {}: {e}", path.display())))
    }

    /// Load the file named on the command line, then apply the flag overrides.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut config = Self::load(cli.config.as_deref())?;
        config.apply_overrides(cli);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, cli: &Cli) {
        if let Some(index) = cli.camera {
            self.camera.index = index;
        }
        if let Some(printer) = &cli.printer {
            self.print.printer = Some(printer.clone());
        }
        if cli.dry_run {
            self.print.dry_run = true;
        }
        if let Some(style) = cli.style {
            self.print.style = style;
        }
        if let Some(media) = cli.media {
            self.print.media = media;
        }
        if let Some(dir) = &cli.output_dir {
            self.storage.output_dir = dir.clone();
        }
        if let Some(path) = &cli.overlay {
            self.assets.overlay = path.clone();
        }
        if let Some(path) = &cli.template {
            self.assets.diploma_template = path.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.print.dpi == 0 {
            return Err(Error::config("print.dpi must be at least 1"));
        }
        if !(self.print.fill_fraction > 0.0 && self.print.fill_fraction <= 1.0) {
            return Err(Error::config(format!(
                "print.fill_fraction {} is outside (0, 1]",
                self.print.fill_fraction
            )));
        }
        if self.session.countdown_interval_ms == 0 {
            return Err(Error::config("session.countdown_interval_ms must be positive"));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(Error::config("window size must be positive"));
        }
        self.assets
            .diploma_margins
            .validate()
            .map_err(|e| Error::config(format!("assets.diploma_margins: {e}")))
    }

    /// True when jobs should only be logged.
    pub fn dry_run(&self) -> bool {
        self.print.dry_run || self.print.printer.is_none()
    }

    pub fn session_timing(&self) -> SessionTiming {
        SessionTiming {
            countdown_from: self.session.countdown_from,
            countdown_interval: Duration::from_millis(self.session.countdown_interval_ms),
            result_delay: Duration::from_millis(self.session.result_delay_ms),
        }
    }

    pub fn print_settings(&self) -> PrintSettings {
        PrintSettings {
            style: self.print.style,
            page: PageSpec::new(self.print.media, self.print.dpi),
            fill: self.print.fill_fraction,
            options: PrintOptions {
                media: self.print.media,
                fit_to_page: true,
                orientation: self.print.orientation,
                quality: self.print.quality,
            },
            template_path: self.assets.diploma_template.clone(),
            margins: self.assets.diploma_margins,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::config(e.to_string()))
    }
}
