//! Extraction rules over rendered HTML.
//!
//! Both extractors are pure: they take the serialized DOM returned by a page
//! context and never touch the browser.

use scrapegate_core::error::AppError;
use scrapegate_core::models::JobGroup;
use scrapegate_core::traits::Extractor;
use scraper::{ElementRef, Html, Selector};

fn parse_selector(raw: &str) -> Result<Selector, AppError> {
    Selector::parse(raw).map_err(|e| AppError::Extraction(format!("Invalid selector '{raw}': {e}")))
}

/// `textContent`, trimmed.
fn trimmed_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

// ---------------------------------------------------------------------------
// Trace numbers
// ---------------------------------------------------------------------------

/// Reads the KPI values drawn on the dashboard graph.
///
/// Returns the trimmed text of every element matching the marker selector,
/// in document order.
#[derive(Debug, Clone)]
pub struct TraceNumberExtractor {
    marker: String,
}

impl TraceNumberExtractor {
    pub fn new() -> Self {
        Self::with_marker(".text.number")
    }

    pub fn with_marker(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }
}

impl Default for TraceNumberExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for TraceNumberExtractor {
    type Output = Vec<String>;

    fn extract(&self, html: &str) -> Result<Vec<String>, AppError> {
        let marker = parse_selector(&self.marker)?;
        let document = Html::parse_document(html);

        Ok(document.select(&marker).map(trimmed_text).collect())
    }
}

// ---------------------------------------------------------------------------
// Job table
// ---------------------------------------------------------------------------

/// Groups a device's job table into [`JobGroup`]s.
///
/// A row whose cells contain an emphasized element ending in `.pdf` opens a
/// new group keyed by the row's first cell; following rows are collected
/// into that group until the next PDF row. Rows before the first PDF row are
/// dropped. A row without cells inside a group is kept as an empty row.
#[derive(Debug, Clone)]
pub struct JobTableExtractor {
    emphasis: String,
    suffix: String,
}

impl JobTableExtractor {
    pub fn new() -> Self {
        Self {
            emphasis: "em, strong, b, i".to_string(),
            suffix: ".pdf".to_string(),
        }
    }

    /// The suffix match is case-sensitive.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    fn is_pdf_row(&self, cells: &[ElementRef<'_>], emphasis: &Selector) -> bool {
        cells.iter().any(|cell| {
            cell.select(emphasis)
                .any(|em| trimmed_text(em).ends_with(self.suffix.as_str()))
        })
    }
}

impl Default for JobTableExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor for JobTableExtractor {
    type Output = Vec<JobGroup>;

    fn extract(&self, html: &str) -> Result<Vec<JobGroup>, AppError> {
        let rows = parse_selector("tr")?;
        let emphasis = parse_selector(&self.emphasis)?;
        let document = Html::parse_document(html);

        let mut groups = Vec::new();
        let mut current: Option<JobGroup> = None;

        for row in document.select(&rows) {
            // Direct cells only; a nested table's cells belong to its own rows.
            let cells: Vec<ElementRef<'_>> = row
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|el| matches!(el.value().name(), "td" | "th"))
                .collect();

            if self.is_pdf_row(&cells, &emphasis) {
                if let Some(done) = current.take() {
                    groups.push(done);
                }
                current = Some(JobGroup::new(trimmed_text(cells[0])));
            } else if let Some(group) = current.as_mut() {
                group
                    .data_rows
                    .push(cells.into_iter().map(trimmed_text).collect());
            }
        }

        if let Some(done) = current {
            groups.push(done);
        }

        tracing::debug!("Extracted {} job groups", groups.len());
        Ok(groups)
    }
}
