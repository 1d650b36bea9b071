// src/state.rs
// Application state - wires the ten components of §2's dependency graph
// into one process-wide `AppState` shared by every axum handler. Grounded
// on the teacher's `web::state::AppState`: a `Clone` struct of `Arc`-wrapped
// services built once at startup from `CONFIG`.

use std::sync::Arc;

use crate::cache::IntentCache;
use crate::config::CONFIG;
use crate::facade::memory::{
    FileAttachmentService, InMemoryBrowseService, InMemoryOrderService, InMemoryProductService,
    InMemoryRecommendationService, InMemoryUserService,
};
use crate::llm::{EmbeddingClient, LlmProvider, OpenAiCompatibleProvider};
use crate::retrieval::KnowledgeRetriever;
use crate::session::SessionStore;
use crate::summarizer::ConversationSummarizer;
use crate::testing::fixtures::{sample_order, sample_products};
use crate::tools::ToolRegistry;
use crate::utils::rate_limiter::RateLimiter;
use crate::workflow::nodes::clarify::ClarifyNode;
use crate::workflow::nodes::context::ContextNode;
use crate::workflow::nodes::document::DocumentNode;
use crate::workflow::nodes::function_calling::FunctionCallingNode;
use crate::workflow::nodes::intent::IntentRecognitionNode;
use crate::workflow::nodes::order_query::OrderQueryNode;
use crate::workflow::nodes::personalized_recommend::PersonalizedRecommendNode;
use crate::workflow::nodes::product_inquiry::ProductInquiryNode;
use crate::workflow::nodes::product_recommendation::ProductRecommendationNode;
use crate::workflow::nodes::purchase_guide::PurchaseGuideNode;
use crate::workflow::nodes::qa::QaNode;
use crate::workflow::nodes::save_context::SaveContextNode;
use crate::workflow::nodes::ticket::TicketNode;
use crate::workflow::WorkflowEngine;

/// Shared application state. Cheap to clone: every field is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub session_store: Arc<SessionStore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub started_at: std::time::Instant,
}

impl AppState {
    /// Builds the full dependency graph from `CONFIG`. The external-data
    /// facade (§6) is out of scope to implement for real (cart/order/review
    /// CRUD, SQL models, auth); this wires the in-memory implementations
    /// shipped in `facade::memory` seeded with a couple of sample records so
    /// the service is runnable standalone, matching spec.md §1's framing of
    /// those collaborators as narrow interfaces rather than owned code.
    pub fn new() -> anyhow::Result<Self> {
        let main_llm: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatibleProvider::new(
            CONFIG.llm.main.base_url.clone(),
            CONFIG.llm.main.api_key.clone(),
            CONFIG.llm.main.model.clone(),
            CONFIG.llm.temperature,
            CONFIG.llm.max_tokens,
        ));

        // The intent node gets its own, faster/cheaper provider slot, with a
        // low-temperature, low-token-budget variant per spec.md §4.E.2.
        let intent_llm: Arc<dyn LlmProvider> = Arc::new(OpenAiCompatibleProvider::new(
            CONFIG.llm.intent.base_url.clone(),
            CONFIG.llm.intent.api_key.clone(),
            CONFIG.llm.intent.model.clone(),
            0.0,
            256,
        ));

        let embeddings = Arc::new(EmbeddingClient::new(
            CONFIG.llm.embedding_base_url.clone(),
            CONFIG.llm.embedding_api_key.clone(),
            CONFIG.llm.embedding_model.clone(),
        ));

        let session_store = Arc::new(SessionStore::new());
        let intent_cache = Arc::new(IntentCache::new(CONFIG.memory.intent_cache_max_size));

        let orders: Arc<dyn crate::facade::OrderService> =
            Arc::new(InMemoryOrderService::new(vec![sample_order()]));
        let products: Arc<dyn crate::facade::ProductService> =
            Arc::new(InMemoryProductService::new(sample_products()));
        let users: Arc<dyn crate::facade::UserService> = Arc::new(InMemoryUserService::new(vec![]));
        let recommendations: Arc<dyn crate::facade::RecommendationService> =
            Arc::new(InMemoryRecommendationService::new(sample_products()));
        let browse: Arc<dyn crate::facade::BrowseService> = Arc::new(InMemoryBrowseService::new());
        let attachments: Arc<dyn crate::facade::AttachmentService> = Arc::new(FileAttachmentService);

        let tools = Arc::new(ToolRegistry::new(
            orders.clone(),
            products.clone(),
            users,
            recommendations.clone(),
        ));

        let retriever = Arc::new(KnowledgeRetriever::new(
            &CONFIG.retrieval.qdrant_url,
            embeddings,
            main_llm.clone(),
            CONFIG.retrieval.persist_dir.clone(),
        ));

        let summarizer = Arc::new(ConversationSummarizer::new(
            main_llm.clone(),
            CONFIG.memory.summary_trigger_threshold,
            CONFIG.memory.context_max_tokens,
        ));

        let engine = WorkflowEngine::new(
            ContextNode::new(session_store.clone()),
            IntentRecognitionNode::new(
                intent_llm,
                intent_cache,
                CONFIG.memory.intent_history_size,
                CONFIG.memory.intent_fallback_threshold,
            ),
            FunctionCallingNode::new(main_llm.clone(), tools),
            QaNode::new(
                main_llm.clone(),
                retriever,
                attachments.clone(),
                CONFIG.retrieval.top_k,
                CONFIG.retrieval.use_hybrid_search,
                CONFIG.retrieval.use_rerank,
                CONFIG.retrieval.use_query_rewrite,
            ),
            DocumentNode::new(main_llm.clone(), attachments),
            TicketNode::new(main_llm.clone()),
            ClarifyNode::new(main_llm.clone()),
            ProductRecommendationNode::new(main_llm.clone(), products.clone()),
            ProductInquiryNode::new(main_llm.clone(), products),
            PersonalizedRecommendNode::new(main_llm.clone(), browse, recommendations),
            OrderQueryNode::new(orders),
            PurchaseGuideNode::new(main_llm.clone()),
            SaveContextNode::new(session_store.clone(), summarizer),
        );

        let rate_limiter = Arc::new(RateLimiter::new(CONFIG.server.rate_limit_per_minute)?);

        Ok(Self {
            engine: Arc::new(engine),
            session_store,
            rate_limiter,
            started_at: std::time::Instant::now(),
        })
    }
}
