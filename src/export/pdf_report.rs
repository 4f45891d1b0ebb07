use chrono::NaiveDateTime;
use printpdf::path::PaintMode;
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
    Rect, Rgb,
};

use super::Table;
use crate::error::{AppError, AppResult};

// A4 portrait
const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN: f32 = 14.0;
const ROW_HEIGHT: f32 = 7.0;
const CELL_PADDING: f32 = 1.5;
const BODY_PT: f32 = 8.5;
const PT_TO_MM: f32 = 0.3528;

/// Header fill per logical table section.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HeaderColor {
    /// Current period
    Blue,
    /// Comparison period
    Purple,
    Green,
    Red,
    Slate,
}

impl HeaderColor {
    fn rgb(self) -> (f32, f32, f32) {
        match self {
            HeaderColor::Blue => (0.17, 0.37, 0.54),
            HeaderColor::Purple => (0.45, 0.27, 0.62),
            HeaderColor::Green => (0.16, 0.50, 0.32),
            HeaderColor::Red => (0.70, 0.20, 0.20),
            HeaderColor::Slate => (0.35, 0.38, 0.42),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableSection {
    pub heading: String,
    pub table: Table,
    pub color: HeaderColor,
}

impl TableSection {
    pub fn new(heading: impl Into<String>, table: Table, color: HeaderColor) -> Self {
        TableSection {
            heading: heading.into(),
            table,
            color,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PdfReport {
    pub title: String,
    pub generated_at: NaiveDateTime,
    /// Free text lines printed under the title (period, employee, totals).
    pub subtitle: Vec<String>,
    pub sections: Vec<TableSection>,
}

struct Cursor {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
    pages: usize,
}

impl Cursor {
    fn new(title: &str) -> AppResult<Self> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(pdf_err)?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Cursor {
            doc,
            layer,
            regular,
            bold,
            y: PAGE_HEIGHT - MARGIN,
            pages: 1,
        })
    }

    fn new_page(&mut self) {
        let (page, layer) = self
            .doc
            .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), format!("Layer {}", self.pages + 1));
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = PAGE_HEIGHT - MARGIN;
        self.pages += 1;
    }

    /// Starts a new page when fewer than `needed` millimetres remain.
    fn reserve(&mut self, needed: f32) -> bool {
        if self.y - needed < MARGIN {
            self.new_page();
            return true;
        }
        false
    }

    fn text(&self, text: &str, pt: f32, x: f32, bold: bool) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.use_text(text, pt, Mm(x), Mm(self.y), font);
    }

    fn fill(&self, (r, g, b): (f32, f32, f32)) {
        self.layer.set_fill_color(Color::Rgb(Rgb::new(r, g, b, None)));
    }

    fn band(&self, color: (f32, f32, f32)) {
        self.fill(color);
        let rect = Rect::new(
            Mm(MARGIN),
            Mm(self.y - ROW_HEIGHT),
            Mm(PAGE_WIDTH - MARGIN),
            Mm(self.y),
        )
        .with_mode(PaintMode::Fill);
        self.layer.add_rect(rect);
    }

    fn row(&mut self, cells: &[String], widths: &[f32], fill: Option<(f32, f32, f32)>, header: bool) {
        if let Some(color) = fill {
            self.band(color);
        }
        self.fill(if header { (1.0, 1.0, 1.0) } else { (0.1, 0.1, 0.1) });

        let baseline = self.y - ROW_HEIGHT + 2.2;
        let mut x = MARGIN;
        for (cell, width) in cells.iter().zip(widths) {
            let fitted = fit_cell(cell, *width);
            let font = if header { &self.bold } else { &self.regular };
            self.layer
                .use_text(fitted, BODY_PT, Mm(x + CELL_PADDING), Mm(baseline), font);
            x += width;
        }
        self.y -= ROW_HEIGHT;
    }

    fn section(&mut self, section: &TableSection) {
        let columns = section.table.columns.len().max(1);
        let widths = page_column_widths(&section.table);
        let header_fill = section.color.rgb();

        self.reserve(8.0 + 2.0 * ROW_HEIGHT);
        self.fill((0.1, 0.1, 0.1));
        self.text(&section.heading, 11.0, MARGIN, true);
        self.y -= 3.0;

        self.row(&section.table.columns, &widths, Some(header_fill), true);
        for (i, cells) in section.table.rows.iter().enumerate() {
            if self.reserve(ROW_HEIGHT) {
                self.row(&section.table.columns, &widths, Some(header_fill), true);
            }
            let stripe = (i % 2 == 1).then_some((0.94, 0.95, 0.97));
            let mut padded = cells.clone();
            padded.resize(columns, String::new());
            self.row(&padded, &widths, stripe, false);
        }
        self.y -= 6.0;
    }
}

fn pdf_err(e: printpdf::Error) -> AppError {
    AppError::Export(e.to_string())
}

/// Approximate Helvetica advance width of `text` in millimetres.
fn text_width(text: &str, pt: f32) -> f32 {
    text.chars().count() as f32 * pt * 0.5 * PT_TO_MM
}

/// Truncates `text` with ".." so it fits `width` millimetres.
pub(crate) fn fit_to_width(text: &str, width: f32, pt: f32) -> String {
    if text_width(text, pt) <= width {
        return text.to_string();
    }
    let per_char = pt * 0.5 * PT_TO_MM;
    let keep = ((width / per_char).floor() as usize).saturating_sub(2);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("..");
    out
}

/// Cell text as it is drawn into a column of `width` millimetres.
pub(crate) fn fit_cell(cell: &str, width: f32) -> String {
    fit_to_width(cell, width - 2.0 * CELL_PADDING, BODY_PT)
}

/// Column widths of `table` across the printable page width.
pub(crate) fn page_column_widths(table: &Table) -> Vec<f32> {
    column_widths(table, PAGE_WIDTH - 2.0 * MARGIN)
}

/// Splits `total` across columns in proportion to their longest cell,
/// with every column getting at least an even share's third.
pub(crate) fn column_widths(table: &Table, total: f32) -> Vec<f32> {
    let n = table.columns.len().max(1);
    let longest: Vec<f32> = (0..n)
        .map(|i| {
            let header = table.columns.get(i).map(|c| c.chars().count()).unwrap_or(0);
            let cells = table
                .rows
                .iter()
                .filter_map(|r| r.get(i))
                .map(|c| c.chars().count())
                .max()
                .unwrap_or(0);
            header.max(cells).clamp(3, 40) as f32
        })
        .collect();

    let floor = total / n as f32 / 3.0;
    let flexible = total - floor * n as f32;
    let weight: f32 = longest.iter().sum();
    longest
        .iter()
        .map(|l| floor + flexible * l / weight)
        .collect()
}

/// Renders the report; fails with [`AppError::NoData`] if every section is empty.
pub fn render_pdf(report: &PdfReport) -> AppResult<Vec<u8>> {
    if report.sections.iter().all(|s| s.table.is_empty()) {
        return Err(AppError::NoData);
    }

    let mut cursor = Cursor::new(&report.title)?;

    cursor.y -= 4.0;
    cursor.fill((0.1, 0.1, 0.1));
    cursor.text(&report.title, 16.0, MARGIN, true);
    cursor.y -= 6.0;
    cursor.fill((0.4, 0.4, 0.4));
    cursor.text(
        &format!("Generated {}", report.generated_at.format("%Y-%m-%d %H:%M UTC")),
        9.0,
        MARGIN,
        false,
    );
    cursor.y -= 5.0;
    for line in &report.subtitle {
        cursor.text(line, 9.0, MARGIN, false);
        cursor.y -= 5.0;
    }
    cursor.y -= 4.0;

    for section in report.sections.iter().filter(|s| !s.table.is_empty()) {
        cursor.section(section);
    }

    tracing::debug!(title = %report.title, pages = cursor.pages, "Rendered PDF report");
    cursor.doc.save_to_bytes().map_err(pdf_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn table(rows: usize) -> Table {
        Table {
            columns: vec!["period".into(), "completed".into(), "pending".into()],
            rows: (0..rows)
                .map(|i| vec![format!("2024-05-{:02}", i % 28 + 1), i.to_string(), "0".into()])
                .collect(),
        }
    }

    fn report(sections: Vec<TableSection>) -> PdfReport {
        PdfReport {
            title: "Task report".into(),
            generated_at: NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            subtitle: vec!["Period: 2024-05-01 to 2024-05-31".into()],
            sections,
        }
    }

    #[test]
    fn renders_a_pdf_document() {
        let bytes = render_pdf(&report(vec![
            TableSection::new("Current period", table(3), HeaderColor::Blue),
            TableSection::new("Comparison period", table(2), HeaderColor::Purple),
        ]))
        .unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn long_tables_continue_on_new_pages() {
        let short = render_pdf(&report(vec![TableSection::new(
            "Current period",
            table(5),
            HeaderColor::Blue,
        )]))
        .unwrap();
        let long = render_pdf(&report(vec![TableSection::new(
            "Current period",
            table(120),
            HeaderColor::Blue,
        )]))
        .unwrap();
        assert!(long.len() > short.len());
    }

    #[test]
    fn all_empty_sections_is_no_data() {
        let result = render_pdf(&report(vec![TableSection::new(
            "Current period",
            table(0),
            HeaderColor::Blue,
        )]));
        assert!(matches!(result, Err(AppError::NoData)));
    }

    #[test]
    fn widths_fill_the_page() {
        let widths = column_widths(&table(4), 182.0);
        assert_eq!(widths.len(), 3);
        assert!((widths.iter().sum::<f32>() - 182.0).abs() < 0.01);
        assert!(widths.iter().all(|w| *w >= 182.0 / 3.0 / 3.0));
    }

    #[test]
    fn long_cells_are_truncated() {
        let fitted = fit_to_width(&"x".repeat(200), 20.0, BODY_PT);
        assert!(fitted.ends_with(".."));
        assert!(text_width(&fitted, BODY_PT) <= 20.0);
        assert_eq!(fit_to_width("short", 20.0, BODY_PT), "short");
    }
}
