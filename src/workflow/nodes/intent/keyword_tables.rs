// src/workflow/nodes/intent/keyword_tables.rs
// Keyword rule tables for IntentRecognitionNode's second classifier layer
// (§4.E.2 step 2). spec.md gives only worked examples per table ("订单",
// "物流","发货",… for OrderQuery); the source's surviving intent_node.py
// copy carries no keyword-table layer at all (cache + LLM only), so these
// tables are authored directly from spec.md's own examples, generalized
// into per-intent substring lists. First matching table wins, in the order
// listed here.

use crate::workflow::state::Intent;

pub struct KeywordTable {
    pub intent: Intent,
    pub keywords: &'static [&'static str],
    pub confidence: f32,
}

/// Checked in order; the first table with a matching substring wins.
/// Ticket is checked before OrderQuery/PurchaseGuide so a complaint about an
/// order ("投诉物流太慢了") still raises a ticket rather than a status lookup.
pub const TABLES: &[KeywordTable] = &[
    KeywordTable {
        intent: Intent::Ticket,
        keywords: &["投诉", "bug", "报错", "故障", "退款", "退货", "质量问题"],
        confidence: 0.9,
    },
    KeywordTable {
        intent: Intent::OrderQuery,
        keywords: &["订单", "物流", "发货", "到哪了", "快递"],
        confidence: 0.92,
    },
    KeywordTable {
        intent: Intent::PurchaseGuide,
        keywords: &["怎么买", "支付", "下单流程", "购买流程", "怎么购买"],
        confidence: 0.88,
    },
    KeywordTable {
        intent: Intent::DocumentAnalysis,
        keywords: &["分析这个文件", "解析文档", "看看这份文档"],
        confidence: 0.9,
    },
];

/// Returns the first matching table's intent and confidence, if any.
pub fn classify(message: &str) -> Option<(Intent, f32)> {
    TABLES
        .iter()
        .find(|table| table.keywords.iter().any(|kw| message.contains(kw)))
        .map(|table| (table.intent, table.confidence))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_query_keyword_matches() {
        let (intent, confidence) = classify("我的订单到哪了").unwrap();
        assert_eq!(intent, Intent::OrderQuery);
        assert!(confidence >= 0.88);
    }

    #[test]
    fn ticket_keyword_wins_over_order_keyword_when_both_present() {
        let (intent, _) = classify("投诉一下，物流太慢了").unwrap();
        assert_eq!(intent, Intent::Ticket);
    }

    #[test]
    fn purchase_guide_keyword_matches() {
        let (intent, _) = classify("怎么买这个项目").unwrap();
        assert_eq!(intent, Intent::PurchaseGuide);
    }

    #[test]
    fn no_match_returns_none() {
        assert!(classify("今天天气不错").is_none());
    }
}
