use std::path::PathBuf;

use async_trait::async_trait;
use calamine::{Data, Reader, Xlsx, open_workbook};
use tracing::{debug, info};

use crate::error::{ErrorKind, LoaderResult};
use crate::source::RecordSource;
use crate::bail;
use crate::types::{RawRecord, RawValue};

/// A spreadsheet extract on disk.
///
/// The first row of the selected sheet is the header row; every following row
/// becomes one [`RawRecord`] keyed by those headers. Typed cells keep their
/// type: numbers arrive as [`RawValue::Number`] and date-formatted cells as
/// [`RawValue::DateTime`], so normalization does not have to re-parse what the
/// workbook already knows.
#[derive(Debug, Clone)]
pub struct XlsxSource {
    path: PathBuf,
    sheet: Option<String>,
}

impl XlsxSource {
    /// Creates a source for the given workbook path.
    ///
    /// When `sheet` is [`None`] the first sheet of the workbook is read.
    pub fn new(path: impl Into<PathBuf>, sheet: Option<String>) -> Self {
        Self {
            path: path.into(),
            sheet,
        }
    }

    fn read_sync(&self) -> LoaderResult<Vec<RawRecord>> {
        if !self.path.exists() {
            bail!(
                ErrorKind::SourceMissing,
                "source file not found",
                self.path.display()
            );
        }

        let mut workbook: Xlsx<_> = open_workbook(&self.path)?;
        let sheet_name = match &self.sheet {
            Some(name) => name.clone(),
            None => match workbook.sheet_names().first() {
                Some(name) => name.clone(),
                None => bail!(
                    ErrorKind::SourceEmpty,
                    "workbook has no sheets",
                    self.path.display()
                ),
            },
        };

        let range = workbook.worksheet_range(&sheet_name)?;
        let mut rows = range.rows();

        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row
                .iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect(),
            None => return Ok(Vec::new()),
        };

        let mut records = Vec::new();
        for row in rows {
            let mut fields = Vec::with_capacity(headers.len());
            let mut has_content = false;
            for (header, cell) in headers.iter().zip(row) {
                if header.is_empty() {
                    continue;
                }

                let value = raw_value(cell);
                if value != RawValue::Empty {
                    has_content = true;
                }
                fields.push((header.clone(), value));
            }

            // Trailing formatting-only rows come back as all-empty; skip them.
            if has_content {
                records.push(RawRecord::new(fields));
            }
        }

        info!(
            path = %self.path.display(),
            sheet = %sheet_name,
            records = records.len(),
            "read spreadsheet extract"
        );

        Ok(records)
    }
}

/// Maps one spreadsheet cell to a raw value.
fn raw_value(cell: &Data) -> RawValue {
    match cell {
        Data::Empty => RawValue::Empty,
        Data::String(text) => RawValue::Text(text.clone()),
        Data::Float(number) => RawValue::Number(*number),
        Data::Int(number) => RawValue::Number(*number as f64),
        Data::Bool(value) => RawValue::Bool(*value),
        Data::DateTime(datetime) => match datetime.as_datetime() {
            Some(parsed) => RawValue::DateTime(parsed),
            None => RawValue::Empty,
        },
        // ISO-formatted cells go through the text parsers like any other
        // string value.
        Data::DateTimeIso(text) | Data::DurationIso(text) => RawValue::Text(text.clone()),
        Data::Error(error) => {
            debug!(?error, "treating spreadsheet error cell as empty");
            RawValue::Empty
        }
    }
}

#[async_trait]
impl RecordSource for XlsxSource {
    fn describe(&self) -> String {
        match &self.sheet {
            Some(sheet) => format!("{} (sheet {sheet})", self.path.display()),
            None => self.path.display().to_string(),
        }
    }

    async fn read(&self) -> LoaderResult<Vec<RawRecord>> {
        self.read_sync()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_a_source_missing_error() {
        let source = XlsxSource::new("/nonexistent/extract.xlsx", None);
        let error = source.read().await.unwrap_err();

        assert_eq!(error.kind(), ErrorKind::SourceMissing);
    }
}
