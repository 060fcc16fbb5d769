//! Paged layout for a hymnal document.
//!
//! The document is a sequence of sections: the title page, the table of
//! contents, then one section per hymn. Each section starts on a fresh page
//! and is laid out by a [`PageWriter`] that tracks the vertical cursor and
//! breaks pages when the cursor passes the printable area.
//!
//! Table of contents page numbers come from the real pagination: hymn
//! sections are laid out first, the contents length is measured with
//! provisional numbers, and only then are start pages assigned.

use serde::Serialize;
use std::mem;
use std::sync::Arc;

use super::metrics::{text_width, truncate_to_width, wrap_text, Font};
use super::PageLayout;
use crate::error::{CatalogError, Result};
use crate::models::{non_empty, Hymn, HymnalReference};

/// Cover: vertical position of the hymnal name.
const COVER_TOP: f64 = 60.0;
const COVER_NAME_LINE: f64 = 10.0;
const COVER_YEAR_GAP: f64 = 20.0;
const COVER_DETAILS_GAP: f64 = 40.0;
const COVER_DATE_GAP: f64 = 40.0;

const TOC_HEADING_GAP: f64 = 20.0;
/// Minimum space between the leader dots and the page number.
const TOC_LEADER_GAP: f64 = 10.0;

const HEADING_LINE: f64 = 7.0;
const HEADING_GAP: f64 = 15.0;
const CREDITS_GAP: f64 = 10.0;
const BLOCK_GAP: f64 = 5.0;
const VERSE_GAP: f64 = 3.0;
const TRAILER_GAP: f64 = 10.0;

// ============================================================================
// Document Model
// ============================================================================

/// One positioned text run. `x`/`y` are millimetres from the top-left corner
/// of the page; `y` is the baseline.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub font: Font,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub runs: Vec<TextRun>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    TitlePage,
    TableOfContents,
    /// Index into the hymn list.
    Hymn(usize),
}

/// Where a section landed. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SectionSpan {
    pub section: Section,
    pub first_page: usize,
    pub page_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    pub number: u32,
    pub title: String,
    pub page: usize,
}

#[derive(Debug, Clone)]
pub struct Document {
    pub title: String,
    pub pages: Vec<Page>,
    pub toc: Vec<TocEntry>,
    pub sections: Vec<SectionSpan>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

// ============================================================================
// Page Writer
// ============================================================================

/// Cursor state for one section.
struct PageWriter<'a> {
    layout: &'a PageLayout,
    done: Vec<Page>,
    current: Page,
    y: f64,
}

impl<'a> PageWriter<'a> {
    fn new(layout: &'a PageLayout) -> Self {
        Self {
            layout,
            done: Vec::new(),
            current: Page::default(),
            y: layout.content_top(),
        }
    }

    fn break_page(&mut self) {
        self.done.push(mem::take(&mut self.current));
        self.y = self.layout.content_top();
    }

    fn break_if_past(&mut self, limit: f64) {
        if self.y > limit {
            self.break_page();
        }
    }

    fn advance(&mut self, dy: f64) {
        self.y += dy;
    }

    fn put(&mut self, x: f64, size: f64, font: Font, text: impl Into<String>) {
        let text = text.into();
        if text.trim().is_empty() {
            return;
        }
        self.current.runs.push(TextRun {
            x,
            y: self.y,
            size,
            font,
            text,
        });
    }

    fn put_centered(&mut self, size: f64, font: Font, text: impl Into<String>) {
        self.break_if_past(self.layout.body_limit());
        let text = text.into();
        let x = (self.layout.page_width - text_width(&text, font, size)) / 2.0;
        self.put(x, size, font, text);
    }

    /// Wrapped lines at the left margin, `step` apart.
    fn put_wrapped(&mut self, size: f64, font: Font, text: &str, step: f64) {
        let lines = wrap_text(text, font, size, self.layout.content_width());
        let lines = lines.into_iter().filter(|l| !l.trim().is_empty());
        for (i, line) in lines.enumerate() {
            if i > 0 {
                self.advance(step);
            }
            self.break_if_past(self.layout.body_limit());
            self.put(self.layout.margin, size, font, line);
        }
    }

    /// Verse or chorus: label at the margin, text indented and wrapped,
    /// breaking pages between lines. Blank lines only separate stanzas.
    fn labeled_block(&mut self, label: &str, text: &str) {
        let layout = self.layout;
        let size = layout.body_size;
        let lines = stanza_lines(wrap_text(text, Font::Regular, size, layout.verse_wrap_width()));
        if lines.is_empty() {
            self.break_if_past(layout.body_limit());
            self.put(layout.margin, size, Font::Regular, label);
            self.advance(layout.line_height);
        }
        for (i, line) in lines.into_iter().enumerate() {
            if line.is_empty() {
                self.advance(layout.line_height);
                continue;
            }
            self.break_if_past(layout.body_limit());
            if i == 0 {
                self.put(layout.margin, size, Font::Regular, label);
            }
            self.put(layout.margin + layout.verse_indent, size, Font::Regular, line);
            self.advance(layout.line_height);
        }
        self.advance(VERSE_GAP);
    }

    fn finish(mut self) -> Vec<Page> {
        self.done.push(self.current);
        self.done
    }
}

/// Drop leading and trailing blank lines and collapse inner runs of them to
/// a single empty spacer.
fn stanza_lines(lines: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        if !line.trim().is_empty() {
            out.push(line);
        } else if out.last().is_some_and(|last| !last.is_empty()) {
            out.push(String::new());
        }
    }
    if out.last().is_some_and(|last| last.is_empty()) {
        out.pop();
    }
    out
}

// ============================================================================
// Sections
// ============================================================================

pub fn layout_title_page(
    layout: &PageLayout,
    reference: &HymnalReference,
    generated_on: &str,
) -> Vec<Page> {
    let mut w = PageWriter::new(layout);
    w.y = COVER_TOP;

    let name_lines = wrap_text(
        &reference.name,
        Font::Bold,
        layout.cover_title_size,
        layout.content_width(),
    );
    for (i, line) in name_lines.into_iter().enumerate() {
        if i > 0 {
            w.advance(COVER_NAME_LINE);
        }
        w.put_centered(layout.cover_title_size, Font::Bold, line);
    }

    if let Some(year) = reference.year {
        w.advance(COVER_YEAR_GAP);
        w.put_centered(layout.title_size, Font::Regular, year.to_string());
    }

    w.advance(COVER_DETAILS_GAP);
    let details = [
        ("Compiled by", &reference.compiler),
        ("Published by", &reference.publisher),
    ];
    for (label, value) in details {
        if let Some(value) = non_empty(value) {
            w.put_centered(layout.header_size, Font::Regular, format!("{}: {}", label, value));
            w.advance(layout.line_height * 2.0);
        }
    }
    w.put_centered(
        layout.header_size,
        Font::Regular,
        format!("{} Hymns", reference.total_songs),
    );

    w.advance(COVER_DATE_GAP);
    w.put_centered(
        layout.body_size,
        Font::Regular,
        format!("Generated on {}", generated_on),
    );
    w.finish()
}

/// Table of contents. Its length depends only on the number of entries, not
/// on the page numbers they carry.
pub fn layout_toc(layout: &PageLayout, entries: &[TocEntry]) -> Vec<Page> {
    let mut w = PageWriter::new(layout);
    let size = layout.body_size;
    let font = Font::Regular;

    w.put(layout.margin, layout.title_size, Font::Bold, "Table of Contents");
    w.advance(TOC_HEADING_GAP);

    let dot_width = text_width(".", font, size);
    for entry in entries {
        w.break_if_past(layout.body_limit());

        let page = entry.page.to_string();
        let page_width = text_width(&page, font, size);
        let room = layout.content_width() - page_width - TOC_LEADER_GAP;
        let line = truncate_to_width(
            &format!("{}. {}", entry.number, entry.title),
            font,
            size,
            room,
        );
        let line_width = text_width(&line, font, size);
        let dots = ((room - line_width) / dot_width).floor().max(0.0) as usize;

        w.put(layout.margin, size, font, line);
        w.put(layout.margin + line_width, size, font, ".".repeat(dots));
        w.put(layout.page_width - layout.margin - page_width, size, font, page);
        w.advance(layout.line_height);
    }
    w.finish()
}

fn credits_line(hymn: &Hymn) -> String {
    let credits = [
        ("Author", &hymn.author),
        ("Composer", &hymn.composer),
        ("Tune", &hymn.tune),
        ("Meter", &hymn.meter),
    ];
    credits
        .iter()
        .filter_map(|(label, value)| non_empty(value).map(|v| format!("{}: {}", label, v)))
        .collect::<Vec<_>>()
        .join(" \u{2022} ")
}

fn trailer_lines(hymn: &Hymn) -> Vec<String> {
    let meta = &hymn.metadata;
    let mut lines = Vec::new();
    if let Some(copyright) = non_empty(&meta.copyright) {
        lines.push(format!("Copyright: {}", copyright));
    }
    if let Some(year) = meta.year {
        lines.push(format!("Year: {}", year));
    }
    if !meta.scripture_references.is_empty() {
        lines.push(format!("Scripture: {}", meta.scripture_references.join(", ")));
    }
    if !meta.themes.is_empty() {
        lines.push(format!("Themes: {}", meta.themes.join(", ")));
    }
    lines
}

pub fn layout_hymn(layout: &PageLayout, hymn: &Hymn) -> Vec<Page> {
    let mut w = PageWriter::new(layout);

    let heading = format!("{}. {}", hymn.number, hymn.title);
    w.put_wrapped(layout.title_size, Font::Bold, &heading, HEADING_LINE);
    w.advance(HEADING_GAP);

    let credits = credits_line(hymn);
    if !credits.is_empty() {
        w.put_wrapped(layout.body_size, Font::Regular, &credits, layout.line_height);
        w.advance(CREDITS_GAP);
    }

    if !hymn.verses.is_empty() {
        w.advance(BLOCK_GAP);
        for verse in &hymn.verses {
            w.labeled_block(&format!("{}.", verse.number), &verse.text);
        }
    }

    if let Some(chorus) = &hymn.chorus {
        w.advance(BLOCK_GAP);
        w.labeled_block("Chorus:", &chorus.text);
    }

    let trailer = trailer_lines(hymn);
    if !trailer.is_empty() {
        w.advance(TRAILER_GAP);
        for line in &trailer {
            for part in wrap_text(line, Font::Italic, layout.metadata_size, layout.content_width()) {
                w.break_if_past(layout.trailer_limit());
                w.put(layout.margin, layout.metadata_size, Font::Italic, part);
                w.advance(layout.line_height);
            }
        }
    }

    w.finish()
}

// ============================================================================
// Assembly
// ============================================================================

fn stamp_page_numbers(layout: &PageLayout, pages: &mut [Page]) {
    for (index, page) in pages.iter_mut().enumerate().skip(1) {
        let label = (index + 1).to_string();
        let x = (layout.page_width - text_width(&label, Font::Regular, layout.metadata_size)) / 2.0;
        page.runs.push(TextRun {
            x,
            y: layout.footer_y(),
            size: layout.metadata_size,
            font: Font::Regular,
            text: label,
        });
    }
}

/// Lay out the whole document with table of contents numbers taken from the
/// actual hymn pagination.
pub fn build_document(
    layout: &PageLayout,
    reference: &HymnalReference,
    hymns: &[Arc<Hymn>],
    generated_on: &str,
) -> Result<Document> {
    let title_pages = layout_title_page(layout, reference, generated_on);
    let hymn_pages: Vec<Vec<Page>> = hymns.iter().map(|h| layout_hymn(layout, h)).collect();

    // First pass: contents length with provisional numbers.
    let mut toc: Vec<TocEntry> = hymns
        .iter()
        .map(|h| TocEntry {
            number: h.number,
            title: h.title.clone(),
            page: 0,
        })
        .collect();
    let toc_len = layout_toc(layout, &toc).len();

    // Second pass: real start pages, then the contents that print them.
    let mut next_page = title_pages.len() + toc_len + 1;
    for (entry, pages) in toc.iter_mut().zip(&hymn_pages) {
        entry.page = next_page;
        next_page += pages.len();
    }
    let toc_pages = layout_toc(layout, &toc);
    if toc_pages.len() != toc_len {
        return Err(CatalogError::GenerationFailure(format!(
            "table of contents changed length between passes ({} vs {})",
            toc_len,
            toc_pages.len()
        )));
    }

    let mut sections = Vec::with_capacity(hymns.len() + 2);
    let mut pages = Vec::with_capacity(next_page - 1);
    let mut push = |section: Section, mut chunk: Vec<Page>, pages: &mut Vec<Page>| {
        sections.push(SectionSpan {
            section,
            first_page: pages.len() + 1,
            page_count: chunk.len(),
        });
        pages.append(&mut chunk);
    };
    push(Section::TitlePage, title_pages, &mut pages);
    push(Section::TableOfContents, toc_pages, &mut pages);
    for (index, chunk) in hymn_pages.into_iter().enumerate() {
        push(Section::Hymn(index), chunk, &mut pages);
    }

    stamp_page_numbers(layout, &mut pages);

    Ok(Document {
        title: reference.name.clone(),
        pages,
        toc,
        sections,
    })
}
