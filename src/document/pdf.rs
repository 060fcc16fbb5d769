//! PDF serialization of a laid-out document.
//!
//! Runs are drawn with the three standard Helvetica faces, so no fonts are
//! embedded. Layout coordinates are millimetres from the top-left corner;
//! the writer takes points from the bottom-left.

use pdf_oxide::writer::{PdfWriter, PdfWriterConfig};

use super::layout::Document;
use super::metrics::{drawable, MM_PER_PT};
use super::PageLayout;
use crate::error::{CatalogError, Result};

/// Document information dictionary entries.
#[derive(Debug, Clone)]
pub struct PdfInfo {
    pub title: String,
    pub subject: String,
    pub creator: String,
}

fn to_points(mm: f64) -> f32 {
    (mm / MM_PER_PT) as f32
}

/// Serialize a laid-out document.
pub fn write_pdf(document: &Document, layout: &PageLayout, info: &PdfInfo) -> Result<Vec<u8>> {
    let mut config = PdfWriterConfig::default()
        .with_title(drawable(&info.title))
        .with_subject(drawable(&info.subject));
    config.creator = Some(info.creator.clone());

    let mut writer = PdfWriter::with_config(config);
    let width = to_points(layout.page_width);
    let height = to_points(layout.page_height);
    for page in &document.pages {
        let mut builder = writer.add_page(width, height);
        for run in &page.runs {
            builder.add_text(
                &drawable(&run.text),
                to_points(run.x),
                to_points(layout.page_height - run.y),
                run.font.base_font(),
                run.size as f32,
            );
        }
        builder.finish();
    }

    writer
        .finish()
        .map_err(|e| CatalogError::GenerationFailure(format!("PDF serialization failed: {}", e)))
}
