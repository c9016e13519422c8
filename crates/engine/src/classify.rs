//! Keyword-rule classifier for bill rows without a usable category.
//!
//! The rule list is ordered and evaluated top to bottom; the first rule
//! with any keyword appearing as a substring of the counterparty or the
//! product/description wins. Order is semantically load-bearing (e.g.
//! `拼多多平台商户` must hit the food rule before plain `拼多多` hits the
//! daily-necessities rule), so the tables stay slices, never maps.

use crate::categories::RecordKind;

struct Rule {
    keywords: &'static [&'static str],
    category: &'static str,
}

const EXPENSE_RULES: &[Rule] = &[
    Rule {
        keywords: &["素心微暖", "美妆", "护肤", "化妆品"],
        category: "美妆护肤",
    },
    Rule {
        keywords: &["唯品会", "快乐的鞋子", "衣服", "服饰", "鞋"],
        category: "服饰",
    },
    Rule {
        keywords: &["得到", "知识", "课程", "培训", "书店"],
        category: "学习",
    },
    Rule {
        keywords: &["电影", "游戏", "KTV", "酒吧"],
        category: "娱乐",
    },
    Rule {
        keywords: &["喜乐", "崔小七", "饰品", "首饰", "珠宝"],
        category: "饰品",
    },
    Rule {
        keywords: &[
            "停车",
            "打车",
            "滴滴",
            "公交",
            "地铁",
            "加油",
            "出行",
            "中国铁路",
            "12306",
        ],
        category: "交通",
    },
    Rule {
        keywords: &["医院", "药店", "诊所", "体检", "挂号"],
        category: "医疗",
    },
    Rule {
        keywords: &[
            "美团",
            "饿了么",
            "外卖",
            "餐饮",
            "饭店",
            "食堂",
            "盒马",
            "麻辣",
            "拼多多平台商户",
        ],
        category: "饮食",
    },
    Rule {
        keywords: &["京东", "快团团", "超市", "便利店", "淘宝", "拼多多"],
        category: "日用品",
    },
    Rule {
        keywords: &["话费", "流量", "宽带", "移动", "联通", "电信"],
        category: "通讯",
    },
    Rule {
        keywords: &["宠物", "猫粮", "狗粮", "宠物医院"],
        category: "宠物",
    },
];

const INCOME_RULES: &[Rule] = &[
    Rule {
        keywords: &["工资", "薪资", "薪酬", "公司"],
        category: "工资",
    },
    Rule {
        keywords: &["投资", "理财", "股票", "基金", "分红"],
        category: "投资收入",
    },
    Rule {
        keywords: &["稿费", "写作", "文章", "版税"],
        category: "稿费收入",
    },
    Rule {
        keywords: &["红包", "现金奖励"],
        category: "其他",
    },
];

/// Pick a category for a row from its counterparty and product strings.
///
/// First matching rule wins; no match yields the direction's catch-all.
/// Matching is case-sensitive over the source script, no transliteration.
#[must_use]
pub fn classify(kind: RecordKind, counterparty: &str, product: &str) -> &'static str {
    let rules = match kind {
        RecordKind::Expense => EXPENSE_RULES,
        RecordKind::Income => INCOME_RULES,
    };

    rules
        .iter()
        .find(|rule| {
            rule.keywords
                .iter()
                .any(|kw| counterparty.contains(kw) || product.contains(kw))
        })
        .map(|rule| rule.category)
        .unwrap_or_else(|| kind.default_category())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::{self, RecordKind};

    #[test]
    fn meituan_counterparty_is_food_regardless_of_product() {
        assert_eq!(classify(RecordKind::Expense, "美团外卖", ""), "饮食");
        assert_eq!(
            classify(RecordKind::Expense, "美团", "代驾服务费"),
            "饮食"
        );
    }

    #[test]
    fn keyword_may_match_product_instead_of_counterparty() {
        assert_eq!(
            classify(RecordKind::Expense, "无名商户", "滴滴出行周卡"),
            "交通"
        );
    }

    #[test]
    fn earlier_rule_wins_on_overlap() {
        // 拼多多平台商户 carries both the food keyword (rule 8) and the
        // 拼多多 daily-necessities keyword (rule 9); list order decides.
        assert_eq!(
            classify(RecordKind::Expense, "拼多多平台商户", ""),
            "饮食"
        );
        assert_eq!(classify(RecordKind::Expense, "拼多多", ""), "日用品");
    }

    #[test]
    fn unmatched_rows_get_the_direction_default() {
        assert_eq!(
            classify(RecordKind::Expense, "某某无名小店", "未知商品"),
            categories::DEFAULT_EXPENSE_CATEGORY
        );
        assert_eq!(
            classify(RecordKind::Income, "匿名转账", ""),
            categories::DEFAULT_INCOME_CATEGORY
        );
    }

    #[test]
    fn income_rules_classify_salary_and_royalties() {
        assert_eq!(classify(RecordKind::Income, "某某公司", "工资"), "工资");
        assert_eq!(classify(RecordKind::Income, "杂志社", "稿费"), "稿费收入");
    }

    #[test]
    fn every_rule_category_is_in_the_taxonomy() {
        for rule in EXPENSE_RULES {
            assert!(categories::is_valid(RecordKind::Expense, rule.category));
        }
        for rule in INCOME_RULES {
            assert!(categories::is_valid(RecordKind::Income, rule.category));
        }
    }
}
