// src/summarizer/mod.rs
// Conversation Summarizer (§4.C) — compresses old turns into a bounded
// summary once history exceeds trigger_threshold, preserving long-range
// facts (order numbers, product names, conclusions) across many turns.

use std::sync::Arc;

use crate::llm::{LlmProvider, Message};
use crate::session::Turn;

/// `max(1, len(text) / 2)` — matches the original's token-estimate heuristic.
pub fn estimate_tokens(text: &str) -> usize {
    std::cmp::max(1, text.len() / 2)
}

pub fn estimate_history_tokens(history: &[Turn]) -> usize {
    history
        .iter()
        .map(|t| estimate_tokens(&t.user) + estimate_tokens(&t.assistant))
        .sum()
}

fn format_history_for_summary(history: &[Turn]) -> String {
    let mut lines = Vec::new();
    for turn in history {
        if !turn.user.is_empty() {
            lines.push(format!("用户: {}", turn.user));
        }
        if !turn.assistant.is_empty() {
            lines.push(format!("助手: {}", turn.assistant));
        }
    }
    lines.join("\n")
}

pub struct SummaryResult {
    pub summary: String,
    pub remaining_history: Vec<Turn>,
}

pub struct ConversationSummarizer {
    llm: Arc<dyn LlmProvider>,
    pub trigger_threshold: usize,
    pub max_context_tokens: usize,
}

impl ConversationSummarizer {
    pub fn new(llm: Arc<dyn LlmProvider>, trigger_threshold: usize, max_context_tokens: usize) -> Self {
        Self {
            llm,
            trigger_threshold,
            max_context_tokens,
        }
    }

    pub fn should_summarize(&self, history: &[Turn]) -> bool {
        history.len() > self.trigger_threshold
    }

    /// Splits history at `trigger_threshold`: everything before is compressed
    /// into a summary, the rest is kept. If there is nothing to compress,
    /// returns the existing summary unchanged with no LLM call.
    pub async fn summarize(&self, history: &[Turn], existing_summary: &str) -> anyhow::Result<SummaryResult> {
        let (compress, keep): (&[Turn], &[Turn]) = if history.len() > self.trigger_threshold {
            let split_at = history.len() - self.trigger_threshold;
            (&history[..split_at], &history[split_at..])
        } else {
            (&[], history)
        };

        if compress.is_empty() {
            return Ok(SummaryResult {
                summary: existing_summary.to_string(),
                remaining_history: keep.to_vec(),
            });
        }

        let history_text = format_history_for_summary(compress);
        let system = format!(
            "请将以下对话历史压缩为一段简洁的摘要。\n\
             保留以下关键信息：\n\
             - 用户的主要意图和需求\n\
             - 提及的具体商品名称、订单号\n\
             - 已解决的问题和结论\n\
             - 用户的偏好信息\n\n\
             已有摘要：\n{}\n\n\
             请输出更新后的摘要，不超过 500 字。",
            if existing_summary.is_empty() { "（无）" } else { existing_summary }
        );

        let messages = vec![Message::user(format!("对话历史：\n{history_text}"))];
        let response = self.llm.invoke(messages, &system).await?;
        let summary = response.content.trim().to_string();

        let remaining_history = self.enforce_token_limit(&summary, keep.to_vec());
        crate::metrics::record_summarization();

        Ok(SummaryResult {
            summary,
            remaining_history,
        })
    }

    fn enforce_token_limit(&self, summary: &str, mut remaining_history: Vec<Turn>) -> Vec<Turn> {
        let summary_tokens = estimate_tokens(summary);

        while !remaining_history.is_empty() {
            let total = summary_tokens + estimate_history_tokens(&remaining_history);
            if total <= self.max_context_tokens {
                break;
            }
            remaining_history.remove(0);
        }

        remaining_history
    }

    /// Fallback strategy invoked when `summarize` fails: keep the most
    /// recent `trigger_threshold` turns, no summary.
    pub fn fallback_truncate(&self, history: &[Turn]) -> SummaryResult {
        let keep = if history.len() > self.trigger_threshold {
            history[history.len() - self.trigger_threshold..].to_vec()
        } else {
            history.to_vec()
        };

        SummaryResult {
            summary: String::new(),
            remaining_history: keep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mock_llm::MockLlmProvider;
    use chrono::Utc;

    fn turn(i: usize) -> Turn {
        Turn {
            user: format!("user message {i}"),
            assistant: format!("assistant reply {i}"),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn estimate_tokens_matches_formula() {
        assert_eq!(estimate_tokens(""), 1);
        assert_eq!(estimate_tokens("ab"), 1);
        assert_eq!(estimate_tokens("abcd"), 2);
    }

    #[test]
    fn should_summarize_is_strict_greater_than() {
        let llm = Arc::new(MockLlmProvider::empty());
        let summarizer = ConversationSummarizer::new(llm, 10, 3000);
        let ten: Vec<Turn> = (0..10).map(turn).collect();
        let eleven: Vec<Turn> = (0..11).map(turn).collect();
        assert!(!summarizer.should_summarize(&ten));
        assert!(summarizer.should_summarize(&eleven));
    }

    #[tokio::test]
    async fn summarize_noop_when_nothing_to_compress() {
        let llm = Arc::new(MockLlmProvider::empty());
        let summarizer = ConversationSummarizer::new(llm, 10, 3000);
        let history: Vec<Turn> = (0..5).map(turn).collect();
        let result = summarizer.summarize(&history, "existing").await.unwrap();
        assert_eq!(result.summary, "existing");
        assert_eq!(result.remaining_history.len(), 5);
    }

    #[tokio::test]
    async fn summarize_compresses_older_turns() {
        let llm = Arc::new(MockLlmProvider::with_response("用户询问了订单问题，已解决。"));
        let summarizer = ConversationSummarizer::new(llm, 10, 3000);
        let history: Vec<Turn> = (0..12).map(turn).collect();
        let result = summarizer.summarize(&history, "").await.unwrap();
        assert!(!result.summary.is_empty());
        assert!(result.remaining_history.len() <= 10);
    }

    #[test]
    fn fallback_truncate_idempotent_under_threshold() {
        let llm = Arc::new(MockLlmProvider::empty());
        let summarizer = ConversationSummarizer::new(llm, 10, 3000);
        let history: Vec<Turn> = (0..5).map(turn).collect();
        let once = summarizer.fallback_truncate(&history);
        let twice = summarizer.fallback_truncate(&once.remaining_history);
        assert_eq!(once.remaining_history.len(), twice.remaining_history.len());
        assert_eq!(once.remaining_history, twice.remaining_history);
    }
}
