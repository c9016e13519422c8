//! Free-text bill source: extraction is delegated wholesale to the AI
//! completion collaborator; locally we only cap the input and normalize
//! whatever comes back.

use super::{BillInput, BillSource, RawRecord, decode_ai_reply};
use crate::{EngineError, ai::Completions};

/// Longest pasted text forwarded to the completion service, in chars.
const INPUT_CAP: usize = 10_000;

const SYSTEM_PROMPT: &str = "你是一个专业的财务账单助手。请帮我分析下面的账单文本，\
提取出每一笔交易记录。\n\n\
要求：\n\
1. 忽略“还款”类型的记录。\n\
2. 遇到“退款”交易，将其视为“收入”。\n\
3. 只提取有效的交易记录，忽略无关的文本行。\n\
4. type 必须是“支出”或“收入”；amount 为正数（元）；date 格式 YYYY-MM-DD。\n\
5. 如果无法确定分类，category 留空或填“其他”。\n\n\
严格按照JSON格式输出：\n\
{\"transactions\": [{\"type\": \"支出\", \"amount\": 45.80, \
\"date\": \"2025-12-15\", \"remark\": \"美团外卖\", \"category\": \"餐饮\"}]}";

/// Pasted-text bill source.
#[derive(Debug)]
pub struct FreeTextBill<'a, C> {
    ai: &'a C,
}

impl<'a, C: Completions> FreeTextBill<'a, C> {
    pub fn new(ai: &'a C) -> Self {
        Self { ai }
    }
}

impl<C: Completions> BillSource for FreeTextBill<'_, C> {
    async fn parse(&self, input: BillInput<'_>) -> Result<Vec<RawRecord>, EngineError> {
        let text = match input {
            BillInput::Text(text) => text,
            BillInput::Bytes(_) => {
                return Err(EngineError::UnsupportedFormat(
                    "free-text source expects text".to_string(),
                ));
            }
        };
        if text.trim().is_empty() {
            return Err(EngineError::Extraction("empty bill text".to_string()));
        }

        let capped: String = text.chars().take(INPUT_CAP).collect();
        let user = format!("账单文本内容：\n{capped}");

        let reply = self.ai.complete(SYSTEM_PROMPT, &user).await?;
        let records = decode_ai_reply(&reply)?;
        if records.is_empty() {
            return Err(EngineError::NoValidRows(
                "no transactions recognized in bill text".to_string(),
            ));
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::RecordKind;

    /// Canned collaborator; also records the user payload it was given.
    struct CannedAi {
        reply: &'static str,
        seen: std::sync::Mutex<Vec<String>>,
    }

    impl CannedAi {
        fn new(reply: &'static str) -> Self {
            Self {
                reply,
                seen: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    impl Completions for CannedAi {
        async fn complete(&self, _system: &str, user: &str) -> Result<String, EngineError> {
            self.seen
                .lock()
                .map_err(|_| EngineError::Upstream("poisoned".to_string()))?
                .push(user.to_string());
            Ok(self.reply.to_string())
        }
    }

    #[tokio::test]
    async fn reply_rows_become_normalized_records() {
        let ai = CannedAi::new(
            r#"{"transactions": [
                {"type": "支出", "amount": 33.0, "date": "2026-02-01", "remark": "打车", "category": "出行"}
            ]}"#,
        );
        let source = FreeTextBill::new(&ai);

        let records = source
            .parse(BillInput::Text("2月1日 打车 33元"))
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, RecordKind::Expense);
        assert_eq!(records[0].category, "交通");
    }

    #[tokio::test]
    async fn input_is_capped_before_sending() {
        let ai = CannedAi::new(r#"{"transactions": [{"type": "支出", "amount": 1.0, "date": "2026-01-01", "remark": "x"}]}"#);
        let source = FreeTextBill::new(&ai);
        let huge = "账".repeat(20_000);

        source.parse(BillInput::Text(&huge)).await.unwrap();

        let seen = ai.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].chars().count() < 11_000);
    }

    #[tokio::test]
    async fn empty_input_is_an_extraction_error() {
        let ai = CannedAi::new("{}");
        let source = FreeTextBill::new(&ai);
        assert!(matches!(
            source.parse(BillInput::Text("   ")).await,
            Err(EngineError::Extraction(_))
        ));
    }

    #[tokio::test]
    async fn reply_with_no_usable_rows_is_no_valid_rows() {
        let ai = CannedAi::new(r#"{"transactions": [{"type": "还款", "amount": 1.0, "date": "2026-01-01", "remark": "x"}]}"#);
        let source = FreeTextBill::new(&ai);
        assert!(matches!(
            source.parse(BillInput::Text("还款 1元")).await,
            Err(EngineError::NoValidRows(_))
        ));
    }
}
