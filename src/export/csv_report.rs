use csv::{QuoteStyle, WriterBuilder};

use super::Table;
use crate::error::{AppError, AppResult};

/// Header row plus one line per row. Fields holding a comma, quote or
/// newline are quoted with inner quotes doubled.
pub fn render_csv(table: &Table) -> AppResult<Vec<u8>> {
    if table.is_empty() {
        return Err(AppError::NoData);
    }

    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .from_writer(Vec::new());

    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Export(e.to_string()))
}
