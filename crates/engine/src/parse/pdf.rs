//! Heuristic text extraction from PDF byte streams.
//!
//! This is best-effort regex scraping of the raw stream, not a structural
//! PDF parser: it reads uncompressed text objects, hex-encoded runs and
//! loose printable runs, and gives up with a sparse-text error on
//! compressed-stream or scanned documents. That limitation is part of the
//! contract; callers surface the error instead of guessing.

use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use super::{BillInput, BillSource, RawRecord, decode_ai_reply};
use crate::{EngineError, ai::Completions};

/// Cleaned text shorter than this means a scanned or encrypted PDF.
const MIN_TEXT_CHARS: usize = 50;

/// Longest extracted text forwarded to the completion service, in chars.
const PROMPT_TEXT_CAP: usize = 8000;

static TEXT_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"(?s)BT\s+(.*?)\s+ET").unwrap()
});
static PAREN_RUN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"\(([^)]*)\)").unwrap()
});
static HEX_RUN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"<([0-9A-Fa-f\s]+)>").unwrap()
});
static PRINTABLE_RUN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"[\x20-\x7E\x{4e00}-\x{9fa5}]{3,}").unwrap()
});

const SYSTEM_PROMPT: &str = "你是一个专业的账单解析助手，擅长从文本中提\
取结构化的交易数据。请严格按照JSON格式输出，不要添加任何解释性文字。";

fn user_prompt(text: &str) -> String {
    format!(
        "请从以下PDF账单文本中提取所有交易记录。\n\n\
要求：\n\
1. 忽略“还款”类型的记录。\n\
2. 遇到“退款”交易，将其视为“收入”。\n\
3. 金额为正数，单位为元；日期格式 YYYY-MM-DD。\n\
4. 交易说明保留关键信息，不超过50字。\n\
5. 忽略账单摘要、总额等非交易信息。\n\
6. 如果无法确定分类，category 留空。\n\n\
PDF文本内容：\n{text}\n\n\
输出格式（JSON），不要添加任何其他内容：\n\
{{\"transactions\": [{{\"type\": \"支出\", \"amount\": 45.80, \
\"date\": \"2025-12-15\", \"remark\": \"美团外卖\", \"category\": \"餐饮\"}}]}}"
    )
}

/// Best-effort text extraction from a PDF byte stream.
///
/// Decoding never fails: invalid UTF-8 falls back to a Latin-1 byte map so
/// the ASCII operators the heuristics look for stay intact. The three
/// heuristics' findings are merged in order, deduplicated, joined with
/// single spaces and cleaned down to printable ASCII + CJK.
pub fn extract_text(bytes: &[u8]) -> Result<String, EngineError> {
    let decoded: Cow<'_, str> = match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    };

    let mut fragments: Vec<String> = Vec::new();

    // (a) parenthesized runs inside BT..ET text objects.
    for object in TEXT_OBJECT.captures_iter(&decoded) {
        for run in PAREN_RUN.captures_iter(&object[1]) {
            let text = unescape_literal(&run[1]);
            if !text.trim().is_empty() {
                fragments.push(text.trim().to_string());
            }
        }
    }

    // (b) hex-encoded runs, kept only where each byte is printable ASCII.
    for run in HEX_RUN.captures_iter(&decoded) {
        let hex: String = run[1].chars().filter(|c| !c.is_whitespace()).collect();
        let mut text = String::new();
        for pair in hex.as_bytes().chunks_exact(2) {
            let Ok(byte) = u8::from_str_radix(std::str::from_utf8(pair).unwrap_or(""), 16)
            else {
                text.clear();
                break;
            };
            if (0x20..=0x7e).contains(&byte) {
                text.push(byte as char);
            }
        }
        if !text.trim().is_empty() {
            fragments.push(text.trim().to_string());
        }
    }

    // (c) any printable-ASCII/CJK run of three or more characters.
    for run in PRINTABLE_RUN.find_iter(&decoded) {
        let text = run.as_str().trim();
        if text.chars().count() > 2 {
            fragments.push(text.to_string());
        }
    }

    let mut seen = HashSet::new();
    let merged = fragments
        .into_iter()
        .filter(|fragment| seen.insert(fragment.clone()))
        .collect::<Vec<_>>()
        .join(" ");

    let cleaned: String = merged
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|&c| c == ' ' || ('\x20'..='\x7e').contains(&c) || is_cjk(c))
        .collect();

    if cleaned.chars().count() < MIN_TEXT_CHARS {
        return Err(EngineError::Extraction(
            "extracted text too sparse; likely a scanned or encrypted PDF".to_string(),
        ));
    }
    Ok(cleaned)
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

/// Undo PDF string-literal escapes: `\(`, `\)`, `\\`, and `\r`/`\n`.
fn unescape_literal(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('r') | Some('n') => out.push('\n'),
            Some('(') => out.push('('),
            Some(')') => out.push(')'),
            Some('\\') => out.push('\\'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// PDF bill source: heuristic scraping plus AI structured extraction.
#[derive(Debug)]
pub struct PdfBill<'a, C> {
    ai: &'a C,
}

impl<'a, C: Completions> PdfBill<'a, C> {
    pub fn new(ai: &'a C) -> Self {
        Self { ai }
    }
}

impl<C: Completions> BillSource for PdfBill<'_, C> {
    async fn parse(&self, input: BillInput<'_>) -> Result<Vec<RawRecord>, EngineError> {
        let BillInput::Bytes(bytes) = input else {
            return Err(EngineError::UnsupportedFormat(
                "pdf source expects raw bytes".to_string(),
            ));
        };

        let text = extract_text(bytes)?;
        let capped: String = text.chars().take(PROMPT_TEXT_CAP).collect();
        tracing::debug!(chars = capped.len(), "sending extracted pdf text");

        let reply = self.ai.complete(SYSTEM_PROMPT, &user_prompt(&capped)).await?;
        let records = decode_ai_reply(&reply)?;
        if records.is_empty() {
            return Err(EngineError::NoValidRows(
                "no transactions recognized in pdf text".to_string(),
            ));
        }
        Ok(records)
    }
}
