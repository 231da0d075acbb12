//! Report rendering: numbered status lines encoded as a PDF document.
//!
//! The document carries a bold title followed by one line per entry, moving to
//! a fresh A4 page when the current one is full. Page layout beyond that line
//! order is not part of the report's contract.

use crate::{Error, ReportArtifact, Result, StatusMap};
use chrono::Utc;
use printpdf::{BuiltinFont, Mm, PdfDocument};

/// Title line at the top of every non-empty report
pub const REPORT_TITLE: &str = "Links Status Report";

/// Description carried by an empty report
pub const NO_DATA_DESCRIPTION: &str = "no data found for the provided numbers";

/// Description carried by a rendered report
pub const GENERATED_DESCRIPTION: &str = "report generated successfully";

const PAGE_WIDTH: Mm = Mm(210.0);
const PAGE_HEIGHT: Mm = Mm(297.0);
const MARGIN_MM: f32 = 10.0;
const TITLE_SIZE: f32 = 16.0;
const BODY_SIZE: f32 = 12.0;
const TITLE_ADVANCE_MM: f32 = 12.0;
const LINE_ADVANCE_MM: f32 = 7.0;
const LAYER: &str = "report";

/// Renders status maps into a [`ReportArtifact`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportGenerator;

impl ReportGenerator {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Render `maps` in order.
    ///
    /// Entries are numbered from 1 across all maps, one line per URL, as
    /// `"{n}. {url} - {Status}"`. An empty input, or one whose maps are all
    /// empty, produces an empty artifact with [`NO_DATA_DESCRIPTION`].
    ///
    /// Fails with [`Error::Report`] only if the PDF cannot be encoded.
    pub fn render(&self, maps: &[StatusMap]) -> Result<ReportArtifact> {
        let lines: Vec<String> = maps
            .iter()
            .flat_map(StatusMap::iter)
            .enumerate()
            .map(|(n, (url, status))| format!("{}. {url} - {}", n + 1, status.label()))
            .collect();
        if lines.is_empty() {
            return Ok(ReportArtifact::placeholder(NO_DATA_DESCRIPTION));
        }

        let pdf = encode_pdf(&lines)?;
        Ok(ReportArtifact {
            description: GENERATED_DESCRIPTION.to_string(),
            lines,
            pdf,
            generated_at: Utc::now(),
        })
    }
}

fn encode_pdf(lines: &[String]) -> Result<Vec<u8>> {
    let (doc, page, layer) = PdfDocument::new(REPORT_TITLE, PAGE_WIDTH, PAGE_HEIGHT, LAYER);
    let title_font = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| Error::Report(format!("failed to load title font: {e:?}")))?;
    let body_font = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| Error::Report(format!("failed to load body font: {e:?}")))?;

    let top = PAGE_HEIGHT.0 - MARGIN_MM;
    let mut current = doc.get_page(page).get_layer(layer);
    current.use_text(REPORT_TITLE, TITLE_SIZE, Mm(MARGIN_MM), Mm(top), &title_font);
    let mut y = top - TITLE_ADVANCE_MM;

    for line in lines {
        if y < MARGIN_MM {
            let (next_page, next_layer) = doc.add_page(PAGE_WIDTH, PAGE_HEIGHT, LAYER);
            current = doc.get_page(next_page).get_layer(next_layer);
            y = top;
        }
        current.use_text(line.as_str(), BODY_SIZE, Mm(MARGIN_MM), Mm(y), &body_font);
        y -= LINE_ADVANCE_MM;
    }

    doc.save_to_bytes()
        .map_err(|e| Error::Report(format!("failed to encode PDF: {e:?}")))
}
