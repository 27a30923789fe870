use std::{collections::HashMap, io::Cursor, str::FromStr};

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use log::*;
use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::records::PaymentRecord;

pub const EXPORT_COLUMNS: [&str; 8] =
    ["Transaction ID", "Order ID", "Customer(s)", "Amount", "Status", "Method", "Merchant Email", "Date"];

const REQUIRED_COLUMNS: [&str; 4] = ["Transaction ID", "Order ID", "Amount", "Status"];

#[derive(Debug, Clone, Error)]
pub enum ExportError {
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),
    #[error("The export file has no header row")]
    Empty,
    #[error("The export file is missing the '{0}' column")]
    MissingColumn(String),
    #[error("Could not read CSV export: {0}")]
    Csv(String),
    #[error("Could not read spreadsheet export: {0}")]
    Spreadsheet(String),
    #[error("Could not write the recovery file: {0}")]
    Write(String),
}

impl From<csv::Error> for ExportError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e.to_string())
    }
}

impl From<calamine::XlsxError> for ExportError {
    fn from(e: calamine::XlsxError) -> Self {
        Self::Spreadsheet(e.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for ExportError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        Self::Write(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" | "excel" => Ok(Self::Xlsx),
            other => Err(ExportError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// One data row of a gateway transaction export, with cells picked out by column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportRow {
    /// 1-based data row number.
    pub row: usize,
    pub transaction_id: Option<String>,
    pub order_id: Option<String>,
    pub customers: Option<String>,
    pub amount: Option<String>,
    pub status: Option<String>,
    pub method: Option<String>,
    pub merchant_email: Option<String>,
    pub date: Option<String>,
}

struct ColumnMap(HashMap<&'static str, usize>);

impl ColumnMap {
    fn from_headers<'a, I: IntoIterator<Item = &'a str>>(headers: I) -> Result<Self, ExportError> {
        let positions = headers
            .into_iter()
            .enumerate()
            .map(|(i, h)| (h.trim().to_ascii_lowercase(), i))
            .collect::<HashMap<String, usize>>();
        let map = EXPORT_COLUMNS
            .iter()
            .filter_map(|col| positions.get(&col.to_ascii_lowercase()).map(|i| (*col, *i)))
            .collect::<HashMap<_, _>>();
        if let Some(missing) = REQUIRED_COLUMNS.iter().find(|c| !map.contains_key(*c)) {
            return Err(ExportError::MissingColumn(missing.to_string()));
        }
        Ok(Self(map))
    }

    fn row<F: Fn(usize) -> Option<String>>(&self, row: usize, cell: F) -> ExportRow {
        let get = |col: &str| self.0.get(col).and_then(|i| cell(*i)).filter(|s| !s.trim().is_empty());
        ExportRow {
            row,
            transaction_id: get("Transaction ID"),
            order_id: get("Order ID"),
            customers: get("Customer(s)"),
            amount: get("Amount"),
            status: get("Status"),
            method: get("Method"),
            merchant_email: get("Merchant Email"),
            date: get("Date"),
        }
    }
}

/// Reads a gateway transaction export. The first row must be the header; column order does not matter.
pub fn parse_export(data: &[u8], format: ExportFormat) -> Result<Vec<ExportRow>, ExportError> {
    let rows = match format {
        ExportFormat::Csv => parse_csv(data)?,
        ExportFormat::Xlsx => parse_xlsx(data)?,
    };
    debug!("♻️ Read {} rows from {format:?} export", rows.len());
    Ok(rows)
}

fn parse_csv(data: &[u8]) -> Result<Vec<ExportRow>, ExportError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).trim(csv::Trim::All).from_reader(data);
    let headers = reader.headers()?.clone();
    if headers.is_empty() {
        return Err(ExportError::Empty);
    }
    let columns = ColumnMap::from_headers(headers.iter())?;
    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        if record.iter().all(|c| c.is_empty()) {
            continue;
        }
        rows.push(columns.row(i + 1, |c| record.get(c).map(String::from)));
    }
    Ok(rows)
}

fn parse_xlsx(data: &[u8]) -> Result<Vec<ExportRow>, ExportError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(data))?;
    let range = workbook.worksheet_range_at(0).ok_or(ExportError::Empty)??;
    let mut sheet_rows = range.rows();
    let header = sheet_rows.next().ok_or(ExportError::Empty)?.iter().map(cell_to_string).collect::<Vec<_>>();
    let columns = ColumnMap::from_headers(header.iter().map(String::as_str))?;
    let rows = sheet_rows
        .enumerate()
        .filter(|(_, cells)| cells.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|(i, cells)| {
            let cells = cells.iter().map(cell_to_string).collect::<Vec<_>>();
            columns.row(i + 1, |c| cells.get(c).cloned())
        })
        .collect();
    Ok(rows)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => {
            dt.as_datetime().map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string()).unwrap_or_else(|| dt.as_f64().to_string())
        },
        Data::Error(_) | Data::Empty => String::new(),
    }
}

fn record_cells(record: &PaymentRecord) -> [String; 8] {
    let customers = match record.customer_name.is_empty() {
        true => record.customer_email.clone(),
        false => format!("{} ({})", record.customer_name, record.customer_email),
    };
    [
        record.transaction_id.clone(),
        record.order_id.clone(),
        customers,
        record.amount.to_string(),
        record.status.to_string(),
        record.payment_method.clone().unwrap_or_default(),
        record.merchant_email.clone().unwrap_or_default(),
        record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    ]
}

/// Writes records in the gateway export layout, so that a recovery file can be reviewed and fed back in.
pub fn write_export(records: &[PaymentRecord], format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            writer.write_record(EXPORT_COLUMNS)?;
            for record in records {
                writer.write_record(record_cells(record))?;
            }
            writer.into_inner().map_err(|e| ExportError::Write(e.to_string()))
        },
        ExportFormat::Xlsx => {
            let mut workbook = Workbook::new();
            let sheet = workbook.add_worksheet();
            for (col, name) in EXPORT_COLUMNS.iter().enumerate() {
                sheet.write_string(0, col as u16, *name)?;
            }
            for (row, record) in records.iter().enumerate() {
                for (col, value) in record_cells(record).iter().enumerate() {
                    sheet.write_string(row as u32 + 1, col as u16, value)?;
                }
            }
            Ok(workbook.save_to_buffer()?)
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const CSV: &str = "\
Order ID,Transaction ID,Customer(s),Amount,Status,Method,Merchant Email,Date
EVENT_5_1000,T1,Alice (alice@example.com),100.00,Success,TNG,shop@example.com,15/01/2024 10:00
Weekend_in_Taipei,T2,Bob bob@example.com,80.00,Success,FPX,,2024-01-15 11:00:00
,,,,,,,
N/A,T3,carol@example.com,\"1,200.50\",Failed,Card,,15/01/2024 12:00:00
";

    #[test]
    fn csv_by_column_name() {
        let rows = parse_export(CSV.as_bytes(), ExportFormat::Csv).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].row, 1);
        assert_eq!(rows[0].transaction_id.as_deref(), Some("T1"));
        assert_eq!(rows[0].order_id.as_deref(), Some("EVENT_5_1000"));
        assert_eq!(rows[1].merchant_email, None);
        assert_eq!(rows[2].row, 4);
        assert_eq!(rows[2].amount.as_deref(), Some("1,200.50"));
    }

    #[test]
    fn missing_required_column() {
        let err = parse_export(b"Order ID,Amount,Status\nEVENT_1_1,1.00,Success\n", ExportFormat::Csv).unwrap_err();
        assert!(matches!(err, ExportError::MissingColumn(c) if c == "Transaction ID"));
    }

    #[test]
    fn formats() {
        assert_eq!("XLSX".parse::<ExportFormat>().unwrap(), ExportFormat::Xlsx);
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!("pdf".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn recovery_file_can_be_read_back() {
        let rows = parse_export(CSV.as_bytes(), ExportFormat::Csv).unwrap();
        let record = PaymentRecord::try_from_export_row(&rows[0]).unwrap();
        for format in [ExportFormat::Csv, ExportFormat::Xlsx] {
            let bytes = write_export(&[record.clone()], format).unwrap();
            let rows = parse_export(&bytes, format).unwrap();
            assert_eq!(rows.len(), 1);
            assert_eq!(PaymentRecord::try_from_export_row(&rows[0]).unwrap(), record);
        }
    }
}
