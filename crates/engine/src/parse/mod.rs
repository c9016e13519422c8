//! Raw bill sources and their parsers.
//!
//! Three variants produce the same output contract, [`RawRecord`]: tabular
//! platform exports ([`tabular`]), heuristic PDF text scraping ([`pdf`])
//! and free-form pasted text ([`freeform`]). The caller declares the input
//! format up front; nothing sniffs content types at runtime.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::{
    EngineError,
    categories::{self, RecordKind},
    normalize::{self, RawDateValue},
};

pub mod freeform;
pub mod pdf;
pub mod tabular;

/// Longest remark kept on a parsed row, in characters.
pub(crate) const REMARK_MAX_CHARS: usize = 50;

/// A candidate transaction extracted from a bill source.
///
/// Ephemeral: rows only exist between parsing and the batch-import
/// endpoint, they are never persisted in this shape.
#[derive(Clone, Debug, PartialEq)]
pub struct RawRecord {
    pub kind: RecordKind,
    /// Always a taxonomy label valid for `kind` by the time a parser
    /// returns it (keyword classification or AI-guess normalization).
    pub category: String,
    pub amount_cents: i64,
    pub date: NaiveDate,
    pub remark: String,
}

/// Declared format of an uploaded bill.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BillFormat {
    AlipayCsv,
    WechatCsv,
    Pdf,
    FreeText,
}

impl TryFrom<&str> for BillFormat {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "alipay" => Ok(Self::AlipayCsv),
            "wechat" => Ok(Self::WechatCsv),
            "pdf" => Ok(Self::Pdf),
            "text" => Ok(Self::FreeText),
            other => Err(EngineError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Input handed to a parser: decoded text or raw bytes.
#[derive(Clone, Copy, Debug)]
pub enum BillInput<'a> {
    Text(&'a str),
    Bytes(&'a [u8]),
}

/// A source of candidate transactions.
///
/// One implementation per bill format; the caller picks the implementation
/// from the declared [`BillFormat`].
pub trait BillSource {
    fn parse(
        &self,
        input: BillInput<'_>,
    ) -> impl Future<Output = Result<Vec<RawRecord>, EngineError>> + Send;
}

/// Truncate to at most `max` characters (not bytes; remarks are CJK).
pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[derive(Deserialize)]
struct AiReply {
    transactions: Vec<AiRow>,
}

/// One row of the completion reply, decoded permissively: a malformed row
/// is dropped, it never fails the whole reply.
#[derive(Deserialize)]
struct AiRow {
    #[serde(rename = "type")]
    kind: Option<String>,
    amount: Option<f64>,
    date: Option<String>,
    remark: Option<String>,
    category: Option<String>,
}

/// Decode a completion reply into validated candidate rows.
///
/// The reply is untrusted: rows must carry direction, numeric amount and a
/// parseable date or they are dropped; repayment rows (`还款`) are dropped;
/// remarks are truncated; every category guess goes through the
/// synonym-then-membership normalization before acceptance.
pub(crate) fn decode_ai_reply(content: &str) -> Result<Vec<RawRecord>, EngineError> {
    let trimmed = content.trim();
    // Some models wrap JSON-mode output in a markdown fence anyway.
    let json = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);

    let reply: AiReply = serde_json::from_str(json)
        .map_err(|err| EngineError::Upstream(format!("malformed extraction reply: {err}")))?;

    let mut records = Vec::with_capacity(reply.transactions.len());
    for row in reply.transactions {
        let Some(kind) = row.kind.as_deref().and_then(|k| RecordKind::try_from(k).ok()) else {
            continue;
        };
        let Some(amount_cents) = row.amount.and_then(|a| normalize::cents_from_yuan(a).ok())
        else {
            continue;
        };
        let Some(date) = row
            .date
            .map(RawDateValue::Text)
            .and_then(|d| normalize::normalize_date(&d).ok())
        else {
            continue;
        };
        let Some(remark) = row.remark else {
            continue;
        };

        let category = categories::normalize_ai_category(kind, row.category.as_deref());
        records.push(RawRecord {
            kind,
            category: category.to_string(),
            amount_cents,
            date,
            remark: truncate_chars(remark.trim(), REMARK_MAX_CHARS),
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ai_reply_rows_are_validated_and_normalized() {
        let content = r#"{"transactions": [
            {"type": "支出", "amount": 45.8, "date": "2025-12-15", "remark": "美团外卖", "category": "餐饮"},
            {"type": "收入", "amount": -200.0, "date": "2025-12-16", "remark": "退款", "category": null},
            {"type": "还款", "amount": 100.0, "date": "2025-12-17", "remark": "信用卡还款"},
            {"type": "支出", "date": "2025-12-18", "remark": "no amount"},
            {"type": "支出", "amount": 10.0, "remark": "no date"}
        ]}"#;

        let records = decode_ai_reply(content).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].kind, RecordKind::Expense);
        assert_eq!(records[0].category, "饮食");
        assert_eq!(records[0].amount_cents, 45_80);
        assert_eq!(records[0].remark, "美团外卖");

        // Sign discarded, missing guess falls back to the income default.
        assert_eq!(records[1].kind, RecordKind::Income);
        assert_eq!(records[1].amount_cents, 200_00);
        assert_eq!(records[1].category, "其他");
    }

    #[test]
    fn fenced_reply_is_unwrapped() {
        let content = "```json\n{\"transactions\": []}\n```";
        assert_eq!(decode_ai_reply(content).unwrap(), Vec::new());
    }

    #[test]
    fn malformed_reply_is_an_upstream_error() {
        assert!(matches!(
            decode_ai_reply("not json at all"),
            Err(EngineError::Upstream(_))
        ));
    }

    #[test]
    fn long_remarks_are_truncated() {
        let long = "字".repeat(120);
        let content = format!(
            r#"{{"transactions": [{{"type": "支出", "amount": 1.0, "date": "2025-01-01", "remark": "{long}"}}]}}"#
        );
        let records = decode_ai_reply(&content).unwrap();
        assert_eq!(records[0].remark.chars().count(), REMARK_MAX_CHARS);
    }
}
