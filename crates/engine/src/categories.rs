//! Closed category taxonomy for expense and income records.
//!
//! The two label sets are fixed at build time. Every stored record must
//! carry a label from the set matching its kind; AI-suggested labels go
//! through [`normalize_ai_category`] (synonym mapping, then membership
//! check, then default) before they are accepted.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::EngineError;

/// Expense labels, in report column order.
pub const EXPENSE_CATEGORIES: &[&str] = &[
    "生活费",
    "交通",
    "饮食",
    "日用品",
    "娱乐",
    "学习",
    "电子产品",
    "人情",
    "宠物",
    "饰品",
    "美妆护肤",
    "医疗",
    "通讯",
    "服饰",
    "还贷",
];

/// Income labels, in report column order.
pub const INCOME_CATEGORIES: &[&str] = &["工资", "投资收入", "稿费收入", "其他"];

/// Catch-all used when an expense cannot be classified.
pub const DEFAULT_EXPENSE_CATEGORY: &str = "日用品";

/// Catch-all used when an income cannot be classified.
pub const DEFAULT_INCOME_CATEGORY: &str = "其他";

/// Free-text labels an AI guess commonly uses, mapped onto taxonomy labels.
///
/// Checked before the membership test, so a guess like `餐饮` lands on
/// `饮食` instead of falling back to the default.
const AI_SYNONYMS: &[(&str, &str)] = &[
    ("餐饮", "饮食"),
    ("美食", "饮食"),
    ("食品", "饮食"),
    ("外卖", "饮食"),
    ("出行", "交通"),
    ("交通出行", "交通"),
    ("打车", "交通"),
    ("购物", "日用品"),
    ("日常", "日用品"),
    ("超市", "日用品"),
    ("服装", "服饰"),
    ("衣物", "服饰"),
    ("数码", "电子产品"),
    ("数码产品", "电子产品"),
    ("教育", "学习"),
    ("培训", "学习"),
    ("医疗健康", "医疗"),
    ("健康", "医疗"),
    ("通信", "通讯"),
    ("话费", "通讯"),
    ("还款", "还贷"),
    ("化妆品", "美妆护肤"),
    ("护肤", "美妆护肤"),
    ("美妆", "美妆护肤"),
    ("房租", "生活费"),
    ("水电", "生活费"),
    ("水电煤", "生活费"),
    ("红包", "人情"),
    ("礼金", "人情"),
    ("游戏", "娱乐"),
    ("电影", "娱乐"),
    ("薪资", "工资"),
    ("工资收入", "工资"),
    ("理财", "投资收入"),
    ("投资", "投资收入"),
    ("基金", "投资收入"),
    ("稿费", "稿费收入"),
    ("其他收入", "其他"),
    ("退款", "其他"),
];

/// Direction of a record, serialized with the wire tokens `支出` / `收入`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    #[serde(rename = "支出")]
    Expense,
    #[serde(rename = "收入")]
    Income,
}

impl RecordKind {
    /// Returns the canonical token stored in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expense => "支出",
            Self::Income => "收入",
        }
    }

    /// The catch-all category for this direction.
    #[must_use]
    pub fn default_category(self) -> &'static str {
        match self {
            Self::Expense => DEFAULT_EXPENSE_CATEGORY,
            Self::Income => DEFAULT_INCOME_CATEGORY,
        }
    }
}

impl TryFrom<&str> for RecordKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "支出" => Ok(Self::Expense),
            "收入" => Ok(Self::Income),
            other => Err(EngineError::Validation(format!(
                "invalid record kind: {other}"
            ))),
        }
    }
}

/// The taxonomy half matching the given direction.
#[must_use]
pub fn categories_for(kind: RecordKind) -> &'static [&'static str] {
    match kind {
        RecordKind::Expense => EXPENSE_CATEGORIES,
        RecordKind::Income => INCOME_CATEGORIES,
    }
}

/// All labels, expense first, in the dense report column order.
pub fn all() -> impl Iterator<Item = &'static str> {
    EXPENSE_CATEGORIES
        .iter()
        .chain(INCOME_CATEGORIES.iter())
        .copied()
}

/// Whether `label` belongs to the taxonomy half for `kind`.
#[must_use]
pub fn is_valid(kind: RecordKind, label: &str) -> bool {
    categories_for(kind).contains(&label)
}

/// Canonical form of a taxonomy label matching `label`, if any.
///
/// Labels come back from the database and from clients; this resolves them
/// to the `'static` constant so totals can be keyed without allocation.
#[must_use]
pub fn canonical(label: &str) -> Option<&'static str> {
    all().find(|candidate| *candidate == label)
}

/// Normalize an AI-sourced category guess to a taxonomy label.
///
/// Two stages: map common synonyms onto taxonomy labels, then check
/// membership for the direction. Anything still unrecognized (including a
/// missing guess) becomes the direction's catch-all. Idempotent on labels
/// that are already valid.
#[must_use]
pub fn normalize_ai_category(kind: RecordKind, guess: Option<&str>) -> &'static str {
    let Some(raw) = guess else {
        return kind.default_category();
    };

    let cleaned: String = raw.trim().nfkc().collect();
    let mapped = AI_SYNONYMS
        .iter()
        .find_map(|(from, to)| (*from == cleaned).then_some(*to))
        .unwrap_or(cleaned.as_str());

    match canonical(mapped) {
        Some(label) if is_valid(kind, label) => label,
        _ => kind.default_category(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_halves_are_disjoint() {
        for label in EXPENSE_CATEGORIES {
            assert!(!INCOME_CATEGORIES.contains(label));
        }
    }

    #[test]
    fn kind_round_trips_through_token() {
        assert_eq!(RecordKind::try_from("支出").unwrap(), RecordKind::Expense);
        assert_eq!(RecordKind::try_from("收入").unwrap(), RecordKind::Income);
        assert!(RecordKind::try_from("不计收支").is_err());
    }

    #[test]
    fn synonym_maps_before_membership_check() {
        assert_eq!(
            normalize_ai_category(RecordKind::Expense, Some("餐饮")),
            "饮食"
        );
        assert_eq!(
            normalize_ai_category(RecordKind::Expense, Some("出行")),
            "交通"
        );
        assert_eq!(
            normalize_ai_category(RecordKind::Income, Some("其他收入")),
            "其他"
        );
    }

    #[test]
    fn unknown_guess_falls_back_to_kind_default() {
        assert_eq!(
            normalize_ai_category(RecordKind::Expense, Some("量子对账")),
            DEFAULT_EXPENSE_CATEGORY
        );
        assert_eq!(
            normalize_ai_category(RecordKind::Income, None),
            DEFAULT_INCOME_CATEGORY
        );
        // A label from the wrong half is not valid for the direction.
        assert_eq!(
            normalize_ai_category(RecordKind::Income, Some("饮食")),
            DEFAULT_INCOME_CATEGORY
        );
    }

    #[test]
    fn normalize_is_idempotent_on_valid_labels() {
        for label in all() {
            let kind = if EXPENSE_CATEGORIES.contains(&label) {
                RecordKind::Expense
            } else {
                RecordKind::Income
            };
            let once = normalize_ai_category(kind, Some(label));
            let twice = normalize_ai_category(kind, Some(once));
            assert_eq!(once, label);
            assert_eq!(twice, once);
        }
    }
}
