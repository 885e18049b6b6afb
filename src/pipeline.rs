// Print pipeline: stored photo -> (sketch -> diploma) -> page -> printer.
// Runs on the worker thread; everything here may block.

use crate::diploma::{DiplomaMargins, DiplomaTemplate, compose_diploma};
use crate::error::{Error, Result};
use crate::layout::{PageSpec, layout_page};
use crate::printer::{JobStatus, Orientation, PrintOptions, Printer};
use crate::sketch::pencil_sketch_rgba;
use crate::store::{ArtifactStore, Variant};
use image::{DynamicImage, RgbaImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// What ends up on paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PrintStyle {
    /// The captured photo as-is.
    Photo,
    /// Pencil sketch of the photo.
    Sketch,
    /// Pencil sketch placed on the diploma template.
    #[default]
    Diploma,
}

#[derive(Debug, Clone)]
pub struct PrintSettings {
    pub style: PrintStyle,
    pub page: PageSpec,
    pub fill: f64,
    pub options: PrintOptions,
    pub template_path: PathBuf,
    pub margins: DiplomaMargins,
}

impl PrintSettings {
    /// Page in the orientation the job will be printed in.
    fn oriented_page(&self) -> PageSpec {
        match self.options.orientation {
            Orientation::Portrait => self.page,
            Orientation::Landscape => self.page.landscape(),
        }
    }
}

/// A finished print attempt.
#[derive(Debug, Clone)]
pub struct PrintReceipt {
    pub artifact: PathBuf,
    pub status: JobStatus,
}

pub struct PrintPipeline {
    store: Box<dyn ArtifactStore>,
    printer: Box<dyn Printer>,
    settings: PrintSettings,
    template: Option<DiplomaTemplate>,
}

impl PrintPipeline {
    pub fn new(store: Box<dyn ArtifactStore>, printer: Box<dyn Printer>, settings: PrintSettings) -> Self {
        Self { store, printer, settings, template: None }
    }

    pub fn save_photo(&mut self, photo: &RgbaImage, taken_at: chrono::DateTime<chrono::Local>) -> Result<PathBuf> {
        self.store.save_photo(&DynamicImage::ImageRgba8(photo.clone()), taken_at)
    }

    /// Loaded on first use and kept once found; a missing file is re-checked
    /// on the next attempt.
    fn template(&mut self) -> Result<&DiplomaTemplate> {
        if self.template.is_none() {
            let t = DiplomaTemplate::load(&self.settings.template_path, self.settings.margins)?;
            info!(path = %self.settings.template_path.display(), "diploma template loaded");
            self.template = Some(t);
        }
        self.template
            .as_ref()
            .ok_or_else(|| Error::TemplateMissing(self.settings.template_path.clone()))
    }

    /// Build the final picture for the configured style, saving intermediates.
    fn render_final(&mut self, photo: &RgbaImage, photo_path: &Path) -> Result<DynamicImage> {
        match self.settings.style {
            PrintStyle::Photo => Ok(DynamicImage::ImageRgba8(photo.clone())),
            PrintStyle::Sketch => {
                let sketch = DynamicImage::ImageRgba8(pencil_sketch_rgba(photo));
                self.store.save_variant(photo_path, Variant::Sketch, &sketch)?;
                Ok(sketch)
            }
            PrintStyle::Diploma => {
                // template first: no point sketching if there is nowhere to put it
                self.template()?;
                let sketch = pencil_sketch_rgba(photo);
                self.store
                    .save_variant(photo_path, Variant::Sketch, &DynamicImage::ImageRgba8(sketch.clone()))?;
                let template = self.template()?;
                let diploma = DynamicImage::ImageRgb8(compose_diploma(&sketch, template));
                self.store.save_variant(photo_path, Variant::Diploma, &diploma)?;
                Ok(diploma)
            }
        }
    }

    /// Lay the picture out on the page, store the artifact and submit it.
    pub fn print(&mut self, photo: &RgbaImage, photo_path: &Path) -> Result<PrintReceipt> {
        let finished = self.render_final(photo, photo_path)?;
        let page = self.settings.oriented_page();
        let canvas = layout_page(&finished, &page, self.settings.fill)?;
        debug!(
            width_in = page.width_in(),
            height_in = page.height_in(),
            dpi = page.dpi,
            width = canvas.width(),
            height = canvas.height(),
            "page laid out"
        );

        let artifact = self
            .store
            .save_variant(photo_path, Variant::Print, &DynamicImage::ImageRgb8(canvas))?;
        let status = self.printer.submit(&artifact, &self.settings.options);
        Ok(PrintReceipt { artifact, status })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::layout::MediaSize;
    use crate::printer::PrintQuality;
    use crate::printer::mock::MockPrinter;
    use crate::store::memory::MemoryStore;
    use crate::store::variant_path;
    use image::Rgba;

    pub fn settings(style: PrintStyle, template_path: PathBuf) -> PrintSettings {
        PrintSettings {
            style,
            page: PageSpec::new(MediaSize::Photo4x6, 40),
            fill: 0.8,
            options: PrintOptions {
                media: MediaSize::Photo4x6,
                fit_to_page: true,
                orientation: Orientation::Portrait,
                quality: PrintQuality::High,
            },
            template_path,
            margins: DiplomaMargins::default(),
        }
    }

    fn photo() -> RgbaImage {
        RgbaImage::from_fn(40, 30, |x, y| Rgba([(x * 6) as u8, (y * 8) as u8, 90, 255]))
    }

    fn saved(store: &mut MemoryStore) -> PathBuf {
        store
            .save_photo(&DynamicImage::ImageRgba8(photo()), chrono::Local::now())
            .unwrap()
    }

    #[test]
    fn photo_style_prints_a_full_page() {
        let mut store = MemoryStore::default();
        let printer = MockPrinter::accepting();
        let path = saved(&mut store);
        let mut pipeline = PrintPipeline::new(
            Box::new(store.clone()),
            Box::new(printer.clone()),
            settings(PrintStyle::Photo, PathBuf::from("/nowhere.png")),
        );
        let receipt = pipeline.print(&photo(), &path).unwrap();
        assert!(receipt.status.is_accepted());
        assert_eq!(receipt.artifact, variant_path(&path, Variant::Print));

        let page = store.get(&receipt.artifact).unwrap();
        assert_eq!((page.width(), page.height()), (160, 240));
        assert!(!page.color().has_alpha());
        assert_eq!(printer.submitted().len(), 1);
    }

    #[test]
    fn diploma_style_without_template_aborts_before_printing() {
        let mut store = MemoryStore::default();
        let printer = MockPrinter::accepting();
        let path = saved(&mut store);
        let before = store.get(&path).unwrap().to_rgba8();
        let mut pipeline = PrintPipeline::new(
            Box::new(store.clone()),
            Box::new(printer.clone()),
            settings(PrintStyle::Diploma, PathBuf::from("/definitely/missing/diploma.png")),
        );
        let err = pipeline.print(&photo(), &path).unwrap_err();
        assert!(matches!(err, Error::TemplateMissing(_)));
        assert!(printer.submitted().is_empty());
        assert_eq!(store.paths(), vec![path.clone()]);
        assert_eq!(store.get(&path).unwrap().to_rgba8().as_raw(), before.as_raw());
    }

    #[test]
    fn diploma_style_saves_every_stage() {
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("diploma.png");
        RgbaImage::from_pixel(120, 90, Rgba([240, 230, 200, 255])).save(&template_path).unwrap();

        let mut store = MemoryStore::default();
        let printer = MockPrinter::accepting();
        let path = saved(&mut store);
        let mut pipeline = PrintPipeline::new(
            Box::new(store.clone()),
            Box::new(printer.clone()),
            settings(PrintStyle::Diploma, template_path),
        );
        pipeline.print(&photo(), &path).unwrap();

        for variant in [Variant::Sketch, Variant::Diploma, Variant::Print] {
            assert!(store.get(&variant_path(&path, variant)).is_some(), "{variant:?}");
        }
        let diploma = store.get(&variant_path(&path, Variant::Diploma)).unwrap();
        assert_eq!((diploma.width(), diploma.height()), (120, 90));
    }

    #[test]
    fn spooler_rejection_is_reported_not_raised() {
        let mut store = MemoryStore::default();
        let printer = MockPrinter::rejecting("printer offline");
        let path = saved(&mut store);
        let mut pipeline = PrintPipeline::new(
            Box::new(store),
            Box::new(printer),
            settings(PrintStyle::Sketch, PathBuf::from("/nowhere.png")),
        );
        let receipt = pipeline.print(&photo(), &path).unwrap();
        assert_eq!(receipt.status, JobStatus::Rejected { reason: "printer offline".into() });
    }

    #[test]
    fn landscape_orientation_turns_the_page() {
        let mut store = MemoryStore::default();
        let path = saved(&mut store);
        let mut s = settings(PrintStyle::Photo, PathBuf::from("/nowhere.png"));
        s.options.orientation = Orientation::Landscape;
        let mut pipeline = PrintPipeline::new(Box::new(store.clone()), Box::new(MockPrinter::accepting()), s);
        let receipt = pipeline.print(&photo(), &path).unwrap();
        let page = store.get(&receipt.artifact).unwrap();
        assert_eq!((page.width(), page.height()), (240, 160));
    }
}
