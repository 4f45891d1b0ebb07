pub mod csv_report;
pub mod pdf_report;

use actix_web::HttpResponse;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, ToSchema, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Pdf,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Pdf => "application/pdf",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Pdf => "pdf",
        }
    }
}

/// Uniform rows of text cells under a fixed column ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Flattens serializable records into a table.
    ///
    /// Without an explicit ordering the columns are the keys of the first
    /// record, in field order. Zero records is a [`AppError::NoData`].
    pub fn from_records<T: Serialize>(records: &[T], columns: Option<&[&str]>) -> AppResult<Self> {
        let objects = records
            .iter()
            .map(|r| match serde_json::to_value(r) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(_) => Err(AppError::Export("rows must serialize to objects".into())),
                Err(e) => Err(AppError::Export(e.to_string())),
            })
            .collect::<AppResult<Vec<_>>>()?;

        let first = objects.first().ok_or(AppError::NoData)?;
        let columns: Vec<String> = match columns {
            Some(cols) => cols.iter().map(|c| c.to_string()).collect(),
            None => first.keys().cloned().collect(),
        };

        let rows = objects
            .iter()
            .map(|obj| {
                columns
                    .iter()
                    .map(|c| obj.get(c).map(cell_text).unwrap_or_default())
                    .collect()
            })
            .collect();

        Ok(Table { columns, rows })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// `<kind>[_<employee>]_<period>.<ext>`, restricted to filename-safe characters.
pub fn export_filename(
    kind: &str,
    employee_code: Option<&str>,
    period: &str,
    format: ExportFormat,
) -> String {
    let mut parts = vec![kind];
    if let Some(code) = employee_code {
        parts.push(code);
    }
    parts.push(period);

    let stem: String = parts
        .join("_")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("{stem}.{}", format.extension())
}

/// Wraps rendered bytes as a file download.
pub fn attachment(bytes: Vec<u8>, filename: String, format: ExportFormat) -> HttpResponse {
    HttpResponse::Ok()
        .content_type(format.content_type())
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(filename)],
        })
        .body(bytes)
}
