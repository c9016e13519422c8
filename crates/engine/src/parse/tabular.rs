//! Parser for tabular payment-platform exports (Alipay / WeChat Pay CSV).
//!
//! Each platform is described by a declarative [`ColumnLayout`]; adding a
//! new export format is a data change, not a code change. Row filtering is
//! deliberately silent: exports are full of summary lines, refunds in
//! flight and `不计收支` rows, and the parser's contract is "surviving rows
//! are valid", not "every line is accounted for".

use super::{BillInput, BillSource, RawRecord, REMARK_MAX_CHARS, truncate_chars};
use crate::{
    EngineError, classify,
    categories::RecordKind,
    normalize::{self, RawDateValue},
};

/// Fixed column geometry of one platform's export.
#[derive(Clone, Copy, Debug)]
pub struct ColumnLayout {
    /// Platform name, used in error messages.
    pub platform: &'static str,
    /// Title/metadata rows before the first data row.
    pub header_rows: usize,
    /// Rows with fewer cells than this are skipped without error.
    pub min_columns: usize,
    /// `(row, column, literal)` probed to recognize the format.
    pub header_probe: Option<(usize, usize, &'static str)>,
    pub date: usize,
    pub counterparty: usize,
    pub product: usize,
    pub amount: usize,
    pub direction: usize,
    /// Transaction-status cell and the success literal required in it.
    /// `None` for platforms whose status column is not a single literal.
    pub status: Option<(usize, &'static str)>,
    pub remark: Option<usize>,
}

/// Alipay CSV export: five metadata rows, header `交易号 …` on row 5.
pub const ALIPAY: ColumnLayout = ColumnLayout {
    platform: "alipay",
    header_rows: 5,
    min_columns: 11,
    header_probe: Some((4, 0, "交易号")),
    date: 3,
    counterparty: 7,
    product: 8,
    amount: 9,
    direction: 10,
    status: Some((11, "交易成功")),
    remark: Some(14),
};

/// WeChat Pay export: the status column mixes `支付成功` / `已存入零钱` per
/// direction, so only the direction tokens filter rows.
pub const WECHAT: ColumnLayout = ColumnLayout {
    platform: "wechat",
    header_rows: 5,
    min_columns: 6,
    header_probe: None,
    date: 0,
    counterparty: 2,
    product: 3,
    amount: 5,
    direction: 4,
    status: None,
    remark: Some(10),
};

/// A tabular bill source bound to one platform layout.
#[derive(Clone, Copy, Debug)]
pub struct TabularBill {
    layout: &'static ColumnLayout,
}

impl TabularBill {
    #[must_use]
    pub fn new(layout: &'static ColumnLayout) -> Self {
        Self { layout }
    }

    /// Parse decoded CSV text into a cell grid and extract records.
    pub fn parse_text(&self, text: &str) -> Result<Vec<RawRecord>, EngineError> {
        if text.trim().is_empty() {
            return Err(EngineError::Extraction("empty input".to_string()));
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut grid: Vec<Vec<String>> = Vec::new();
        for row in reader.records() {
            let row = row.map_err(|err| {
                EngineError::Extraction(format!("unreadable csv row: {err}"))
            })?;
            grid.push(row.iter().map(|cell| cell.trim().to_string()).collect());
        }

        self.parse_grid(&grid)
    }

    /// Extract records from a 2-D cell grid.
    pub fn parse_grid(&self, grid: &[Vec<String>]) -> Result<Vec<RawRecord>, EngineError> {
        let layout = self.layout;

        if grid.len() <= layout.header_rows {
            return Err(EngineError::Extraction(format!(
                "{} export has no data rows",
                layout.platform
            )));
        }
        if let Some((row, col, literal)) = layout.header_probe
            && cell(grid, row, col) != literal
        {
            return Err(EngineError::UnsupportedFormat(format!(
                "unrecognized {} export header",
                layout.platform
            )));
        }

        let mut records = Vec::new();
        for row in &grid[layout.header_rows..] {
            // Partial-row tolerance: summary and blank lines just drop out.
            if row.len() < layout.min_columns {
                continue;
            }
            if let Some((idx, ok_literal)) = layout.status
                && row_cell(row, idx) != ok_literal
            {
                continue;
            }

            // A third token such as 不计收支 is skipped, never coerced.
            let kind = match RecordKind::try_from(row_cell(row, layout.direction)) {
                Ok(kind) => kind,
                Err(_) => continue,
            };

            let Ok(amount_cents) = normalize::normalize_amount(row_cell(row, layout.amount))
            else {
                continue;
            };
            let Ok(date) = normalize::normalize_date(&raw_date(row_cell(row, layout.date)))
            else {
                continue;
            };

            let counterparty = row_cell(row, layout.counterparty);
            let product = row_cell(row, layout.product);
            let category = classify::classify(kind, counterparty, product);

            let remark = layout
                .remark
                .map(|idx| row_cell(row, idx))
                .filter(|cell| !cell.is_empty() && *cell != "/")
                .map(|cell| truncate_chars(cell, REMARK_MAX_CHARS))
                .unwrap_or_else(|| {
                    truncate_chars(&format!("{counterparty} - {product}"), REMARK_MAX_CHARS)
                });

            records.push(RawRecord {
                kind,
                category: category.to_string(),
                amount_cents,
                date,
                remark,
            });
        }

        if records.is_empty() {
            return Err(EngineError::NoValidRows(format!(
                "every {} row was filtered out",
                layout.platform
            )));
        }
        Ok(records)
    }
}

impl BillSource for TabularBill {
    async fn parse(&self, input: BillInput<'_>) -> Result<Vec<RawRecord>, EngineError> {
        match input {
            BillInput::Text(text) => self.parse_text(text),
            BillInput::Bytes(bytes) => {
                let text = String::from_utf8_lossy(bytes);
                self.parse_text(&text)
            }
        }
    }
}

fn cell<'a>(grid: &'a [Vec<String>], row: usize, col: usize) -> &'a str {
    grid.get(row).map(|r| row_cell(r, col)).unwrap_or("")
}

fn row_cell(row: &[String], col: usize) -> &str {
    row.get(col).map(String::as_str).unwrap_or("")
}

/// A cell that is all digits (with an optional fraction) is a spreadsheet
/// serial; anything else is treated as date text.
fn raw_date(cell: &str) -> RawDateValue {
    let numeric = !cell.is_empty()
        && cell.chars().all(|c| c.is_ascii_digit() || c == '.')
        && cell.chars().filter(|c| *c == '.').count() <= 1;
    if numeric && let Ok(serial) = cell.parse::<f64>() {
        return RawDateValue::Serial(serial);
    }
    RawDateValue::Text(cell.to_string())
}
