// src/workflow/nodes/document.rs
// DocumentNode (§4.E.5) — reads every attachment (up to 8000 chars each)
// and asks the LLM for a structured multi-section analysis of the combined
// text. An apology if nothing could be read.

use std::sync::Arc;

use tracing::warn;

use crate::facade::AttachmentService;
use crate::llm::{LlmProvider, Message};
use crate::workflow::state::ConversationState;

const ATTACHMENT_EXTRACT_CHARS: usize = 8000;

const SYSTEM_PROMPT: &str = "你是一个文档分析助手。请对下列文档内容给出结构化分析，\
包含：概述、关键信息、可能的问题或风险、建议，按小节组织输出。";

pub struct DocumentNode {
    llm: Arc<dyn LlmProvider>,
    attachments: Arc<dyn AttachmentService>,
}

impl DocumentNode {
    pub fn new(llm: Arc<dyn LlmProvider>, attachments: Arc<dyn AttachmentService>) -> Self {
        Self { llm, attachments }
    }

    pub async fn execute(&self, state: &mut ConversationState) {
        let mut files = Vec::new();
        let mut blocks = Vec::new();

        for attachment in &state.attachments {
            match self.attachments.extract_text(&attachment.file_path).await {
                Ok(text) if !text.trim().is_empty() => {
                    let truncated: String = text.chars().take(ATTACHMENT_EXTRACT_CHARS).collect();
                    blocks.push(format!("文件 {}:\n{}", attachment.file_name, truncated));
                    files.push(attachment.file_name.clone());
                }
                Ok(_) => warn!("document: attachment {} extracted empty text", attachment.file_name),
                Err(e) => warn!("document: failed to read attachment {}: {}", attachment.file_path, e),
            }
        }

        if blocks.is_empty() {
            state.response = crate::error::APOLOGY.to_string();
            state.sources = Vec::new();
            return;
        }

        let combined = blocks.join("\n\n");
        match self.llm.invoke(vec![Message::user(combined)], SYSTEM_PROMPT).await {
            Ok(response) => state.response = response.content,
            Err(e) => {
                warn!("document: llm analysis failed: {}", e);
                state.response = crate::error::APOLOGY.to_string();
            }
        }

        state.sources = vec![serde_json::json!({ "type": "attachment", "files": files })];
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::AttachmentService;
    use crate::testing::mock_llm::MockLlmProvider;
    use crate::workflow::state::Attachment;
    use async_trait::async_trait;

    struct FixedAttachments(&'static str);

    #[async_trait]
    impl AttachmentService for FixedAttachments {
        async fn extract_text(&self, _file_path: &str) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn attachment(name: &str) -> Attachment {
        Attachment {
            file_id: "f1".into(),
            file_name: name.into(),
            file_type: "text/plain".into(),
            file_size: 100,
            file_path: format!("/tmp/{name}"),
        }
    }

    #[tokio::test]
    async fn no_readable_attachments_yields_apology() {
        let node = DocumentNode::new(Arc::new(MockLlmProvider::empty()), Arc::new(FixedAttachments("")));
        let mut state = ConversationState::new("u".into(), "s".into(), "分析这个文件".into(), vec![attachment("a.txt")]);
        node.execute(&mut state).await;
        assert_eq!(state.response, crate::error::APOLOGY);
    }

    #[tokio::test]
    async fn readable_attachment_produces_analysis_and_sources() {
        let node = DocumentNode::new(
            Arc::new(MockLlmProvider::with_response("概述：……")),
            Arc::new(FixedAttachments("这是合同正文。")),
        );
        let mut state = ConversationState::new("u".into(), "s".into(), "分析这个文件".into(), vec![attachment("contract.txt")]);
        node.execute(&mut state).await;
        assert!(!state.response.is_empty());
        assert_eq!(state.sources.len(), 1);
        assert_eq!(state.sources[0]["files"][0], "contract.txt");
    }
}
