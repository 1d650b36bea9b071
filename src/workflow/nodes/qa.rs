// src/workflow/nodes/qa.rs
// QANode (§4.E.5) — short greetings get a minimal prompt with no retrieval;
// everything else goes through the retrieval-augmented path: attachment
// text, top-k knowledge_base passages, running summary, and recent history
// are all folded into one prompt.

use std::sync::Arc;

use regex::Regex;
use tracing::warn;

use crate::facade::AttachmentService;
use crate::llm::{LlmProvider, Message};
use crate::retrieval::{Collection, KnowledgeRetriever};
use crate::workflow::state::ConversationState;

const ATTACHMENT_EXTRACT_CHARS: usize = 5000;

pub struct QaNode {
    llm: Arc<dyn LlmProvider>,
    retriever: Arc<KnowledgeRetriever>,
    attachments: Arc<dyn AttachmentService>,
    greeting_re: Regex,
    top_k: usize,
    use_hybrid: bool,
    use_rerank: bool,
    use_query_rewrite: bool,
}

impl QaNode {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        retriever: Arc<KnowledgeRetriever>,
        attachments: Arc<dyn AttachmentService>,
        top_k: usize,
        use_hybrid: bool,
        use_rerank: bool,
        use_query_rewrite: bool,
    ) -> Self {
        Self {
            llm,
            retriever,
            attachments,
            greeting_re: Regex::new(r"(?i)你好|hello|^hi\b|thanks|谢谢|ok|好的").unwrap(),
            top_k,
            use_hybrid,
            use_rerank,
            use_query_rewrite,
        }
    }

    fn is_short_greeting(&self, message: &str) -> bool {
        message.chars().count() <= 4 || self.greeting_re.is_match(message)
    }

    /// Builds the prompt used for this turn, returning `(user_message,
    /// system_prompt, docs)`. Shared by `execute` and `stream` so the
    /// streaming path answers against exactly the same context.
    async fn build_prompt(&self, state: &ConversationState) -> (String, String, Vec<crate::retrieval::RetrievedDocument>) {
        let message = state.user_message.trim().to_string();

        if self.is_short_greeting(&message) {
            let system = "你是一个友好的电商客服助手，用一两句话简洁回应用户。".to_string();
            return (message, system, Vec::new());
        }

        let mut attachment_blocks = Vec::new();
        for attachment in &state.attachments {
            match self.attachments.extract_text(&attachment.file_path).await {
                Ok(text) => {
                    let truncated: String = text.chars().take(ATTACHMENT_EXTRACT_CHARS).collect();
                    attachment_blocks.push(format!("文件 {}:\n{}", attachment.file_name, truncated));
                }
                Err(e) => warn!("qa: failed to read attachment {}: {}", attachment.file_path, e),
            }
        }

        let docs = self
            .retriever
            .retrieve(&message, Collection::KnowledgeBase, self.top_k, None, self.use_hybrid, self.use_rerank, self.use_query_rewrite)
            .await;

        let docs_block = if docs.is_empty() {
            String::new()
        } else {
            docs.iter()
                .enumerate()
                .map(|(i, d)| format!("[{}] {}", i + 1, d.content))
                .collect::<Vec<_>>()
                .join("\n\n")
        };

        let history_block = state
            .conversation_history
            .iter()
            .rev()
            .take(3)
            .rev()
            .map(|t| format!("用户: {}\n助手: {}", t.user, t.assistant))
            .collect::<Vec<_>>()
            .join("\n");

        let mut prompt_sections = vec!["你是一个电商平台的客服助手，请基于以下资料回答用户问题。".to_string()];
        if !state.conversation_summary.is_empty() {
            prompt_sections.push(format!("对话历史摘要: {}", state.conversation_summary));
        }
        if !docs_block.is_empty() {
            prompt_sections.push(format!("参考资料:\n{docs_block}"));
        }
        if !attachment_blocks.is_empty() {
            prompt_sections.push(format!("附件内容:\n{}", attachment_blocks.join("\n\n")));
        }
        if !history_block.is_empty() {
            prompt_sections.push(format!("最近对话:\n{history_block}"));
        }

        (message, prompt_sections.join("\n\n"), docs)
    }

    /// Streaming variant for process_message_stream: forwards token deltas
    /// as they arrive instead of returning one blocking response.
    pub async fn stream(
        &self,
        state: &mut ConversationState,
    ) -> anyhow::Result<Box<dyn futures::Stream<Item = anyhow::Result<String>> + Send + Unpin>> {
        let (message, system, docs) = self.build_prompt(state).await;
        state.sources = docs.into_iter().map(|d| d.metadata).collect();
        self.llm.invoke_stream(vec![Message::user(message)], &system).await
    }

    pub async fn execute(&self, state: &mut ConversationState) {
        let (message, system, docs) = self.build_prompt(state).await;

        match self.llm.invoke(vec![Message::user(message)], &system).await {
            Ok(response) => state.response = response.content,
            Err(e) => {
                warn!("qa: llm call failed: {}", e);
                state.response = crate::error::APOLOGY.to_string();
            }
        }

        state.sources = docs.into_iter().map(|d| d.metadata).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::memory::FileAttachmentService;
    use crate::llm::EmbeddingClient;
    use crate::testing::mock_llm::MockLlmProvider;

    fn retriever_for_test() -> Arc<KnowledgeRetriever> {
        let embeddings = Arc::new(EmbeddingClient::new(
            "http://localhost:1".to_string(),
            String::new(),
            "embed".to_string(),
        ));
        let llm = Arc::new(MockLlmProvider::empty());
        Arc::new(KnowledgeRetriever::new(
            "http://localhost:1",
            embeddings,
            llm,
            tempfile::tempdir().unwrap().into_path(),
        ))
    }

    #[tokio::test]
    async fn short_greeting_skips_retrieval_and_sets_empty_sources() {
        let node = QaNode::new(
            Arc::new(MockLlmProvider::with_response("你好呀，有什么可以帮您的？")),
            retriever_for_test(),
            Arc::new(FileAttachmentService),
            5,
            true,
            true,
            false,
        );
        let mut state = ConversationState::new("u".into(), "s".into(), "你好".into(), Vec::new());
        node.execute(&mut state).await;
        assert!(!state.response.is_empty());
        assert!(state.sources.is_empty());
    }

    #[tokio::test]
    async fn empty_knowledge_base_still_produces_a_response() {
        let node = QaNode::new(
            Arc::new(MockLlmProvider::with_response("平台支持多种支付方式。")),
            retriever_for_test(),
            Arc::new(FileAttachmentService),
            5,
            true,
            true,
            false,
        );
        let mut state = ConversationState::new("u".into(), "s".into(), "你们平台支持什么支付方式".into(), Vec::new());
        node.execute(&mut state).await;
        assert!(!state.response.is_empty());
    }
}
