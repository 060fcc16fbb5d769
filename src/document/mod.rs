//! Printable hymnal documents: a title page, a table of contents and one
//! section per hymn, serialized as PDF.

pub mod layout;
pub mod metrics;
pub mod pdf;

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;

pub use layout::{Document, Page, Section, SectionSpan, TextRun, TocEntry};
pub use metrics::Font;

use crate::catalog::Catalog;
use crate::error::{CatalogError, Result};
use crate::models::{Hymn, HymnalReference};

// ============================================================================
// Configuration
// ============================================================================

/// Page geometry in millimetres, font sizes in points. The default is A4.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub page_width: f64,
    pub page_height: f64,
    pub margin: f64,
    pub line_height: f64,
    /// Hymnal name on the title page.
    pub cover_title_size: f64,
    /// Hymn headings and the contents heading.
    pub title_size: f64,
    pub header_size: f64,
    pub body_size: f64,
    /// Trailing hymn metadata and page numbers.
    pub metadata_size: f64,
    /// Verse text offset from its label.
    pub verse_indent: f64,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            page_width: 210.0,
            page_height: 297.0,
            margin: 20.0,
            line_height: 6.0,
            cover_title_size: 24.0,
            title_size: 16.0,
            header_size: 12.0,
            body_size: 10.0,
            metadata_size: 8.0,
            verse_indent: 15.0,
        }
    }
}

impl PageLayout {
    /// Cursor position at the top of every page after a break.
    pub fn content_top(&self) -> f64 {
        self.margin + 20.0
    }

    pub fn content_width(&self) -> f64 {
        self.page_width - 2.0 * self.margin
    }

    pub fn verse_wrap_width(&self) -> f64 {
        self.content_width() - 20.0
    }

    /// Body lines start a new page once the cursor is past this.
    pub fn body_limit(&self) -> f64 {
        self.page_height - 30.0
    }

    /// Same for the small trailing metadata lines.
    pub fn trailer_limit(&self) -> f64 {
        self.page_height - 20.0
    }

    pub fn footer_y(&self) -> f64 {
        self.page_height - 10.0
    }
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub layout: PageLayout,
    /// Printed on the title page and recorded in the document info.
    pub generated_on: NaiveDate,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            layout: PageLayout::default(),
            generated_on: chrono::Local::now().date_naive(),
        }
    }
}

impl GenerateOptions {
    fn date_label(&self) -> String {
        self.generated_on.format("%-m/%-d/%Y").to_string()
    }
}

// ============================================================================
// Generation
// ============================================================================

#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub toc: Vec<TocEntry>,
}

/// `{abbreviation}_{year}.pdf`, with `Hymnal` standing in for a missing year.
pub fn document_filename(reference: &HymnalReference) -> String {
    let abbreviation = if reference.abbreviation.trim().is_empty() {
        reference.id.as_str()
    } else {
        reference.abbreviation.trim()
    };
    let year = reference
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "Hymnal".to_string());
    format!("{}_{}.pdf", abbreviation, year)
}

/// Lay out a document for an already-resolved hymn list.
pub fn build_document(
    reference: &HymnalReference,
    hymns: &[Arc<Hymn>],
    options: &GenerateOptions,
) -> Result<Document> {
    if hymns.is_empty() {
        return Err(CatalogError::GenerationFailure(format!(
            "hymnal {} has no resolvable hymns",
            reference.id
        )));
    }
    layout::build_document(&options.layout, reference, hymns, &options.date_label())
}

/// Render one hymnal, in table-of-contents order, to PDF.
///
/// An unknown hymnal is NotFound; a hymnal whose entries all fail to resolve
/// is a GenerationFailure.
pub fn generate_hymnal_pdf(
    catalog: &Catalog,
    hymnal_id: &str,
    options: &GenerateOptions,
) -> Result<RenderedDocument> {
    let reference = catalog.hymnal_reference(hymnal_id)?;
    let listing = catalog.hymnal_hymns(&reference.id, 1, usize::MAX)?;
    if listing.hymns.len() < listing.total {
        tracing::warn!(
            hymnal = %reference.id,
            skipped = listing.total - listing.hymns.len(),
            "document omits unresolvable hymns"
        );
    }

    let document = build_document(&reference, &listing.hymns, options)?;
    let pdf_info = pdf::PdfInfo {
        title: reference.name.clone(),
        subject: format!("Generated {}", options.date_label()),
        creator: concat!("hymnal-catalog ", env!("CARGO_PKG_VERSION")).to_string(),
    };
    let bytes = pdf::write_pdf(&document, &options.layout, &pdf_info)?;

    info!(
        hymnal = %reference.id,
        hymns = listing.hymns.len(),
        pages = document.page_count(),
        bytes = bytes.len(),
        "generated document"
    );
    Ok(RenderedDocument {
        filename: document_filename(&reference),
        bytes,
        page_count: document.page_count(),
        toc: document.toc,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{sample_corpus, CorpusBuilder, HymnSpec};

    fn options() -> GenerateOptions {
        GenerateOptions {
            layout: PageLayout::default(),
            generated_on: NaiveDate::from_ymd_opt(2026, 1, 2).unwrap(),
        }
    }

    #[test]
    fn test_generate_sample_hymnal() {
        let catalog = sample_corpus().catalog();
        let rendered = generate_hymnal_pdf(&catalog, "SDAH", &options()).unwrap();
        assert_eq!(rendered.filename, "SDAH_1985.pdf");
        assert_eq!(rendered.page_count, 6);
        assert!(rendered.bytes.starts_with(b"%PDF-"));
        let pages: Vec<usize> = rendered.toc.iter().map(|e| e.page).collect();
        assert_eq!(pages, vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_unresolvable_entries_are_left_out() {
        let catalog = sample_corpus().catalog();
        let rendered = generate_hymnal_pdf(&catalog, "CH", &options()).unwrap();
        let numbers: Vec<u32> = rendered.toc.iter().map(|e| e.number).collect();
        assert_eq!(numbers, vec![5, 12]);
        assert_eq!(rendered.page_count, 4);
    }

    #[test]
    fn test_generation_errors() {
        let catalog = CorpusBuilder::new()
            .hymnal("EMPTY", "Empty Hymnal", 2000)
            .hymnal("GONE", "Gone Hymnal", 2001)
            .missing_entry("GONE", 1)
            .malformed_entry("GONE", 2)
            .hymnal("OK", "Fine Hymnal", 2002)
            .hymn("OK", HymnSpec::new(1, "Only"))
            .catalog();
        assert!(matches!(
            generate_hymnal_pdf(&catalog, "NOPE", &options()),
            Err(CatalogError::NotFound { .. })
        ));
        assert!(matches!(
            generate_hymnal_pdf(&catalog, "EMPTY", &options()),
            Err(CatalogError::GenerationFailure(_))
        ));
        assert!(matches!(
            generate_hymnal_pdf(&catalog, "GONE", &options()),
            Err(CatalogError::GenerationFailure(_))
        ));
        assert!(generate_hymnal_pdf(&catalog, "OK", &options()).is_ok());
    }

    #[test]
    fn test_date_label() {
        let opts = options();
        assert_eq!(opts.date_label(), "1/2/2026");
    }

    #[test]
    fn test_document_filename() {
        let mut reference = HymnalReference {
            id: "CH".into(),
            abbreviation: "CH".into(),
            year: Some(1908),
            ..HymnalReference::default()
        };
        assert_eq!(document_filename(&reference), "CH_1908.pdf");
        reference.year = None;
        reference.abbreviation = String::new();
        assert_eq!(document_filename(&reference), "CH_Hymnal.pdf");
    }

    #[test]
    fn test_layout_limits() {
        let layout = PageLayout::default();
        assert_eq!(layout.content_top(), 40.0);
        assert_eq!(layout.content_width(), 170.0);
        assert_eq!(layout.verse_wrap_width(), 150.0);
        assert_eq!(layout.body_limit(), 267.0);
        assert_eq!(layout.trailer_limit(), 277.0);
        assert_eq!(layout.footer_y(), 287.0);
    }
}
