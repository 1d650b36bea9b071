// src/workflow/mod.rs
// Workflow Engine (§4.G) — the directed graph of nodes (§4.E), the pure
// router (§4.F), and the value threaded through it (§3). This module only
// re-exports; the graph wiring lives in `engine`, node implementations in
// `nodes`.

pub mod engine;
pub mod nodes;
pub mod router;
pub mod state;

pub use engine::{StreamEvent, WorkflowEngine};
pub use router::{route, NodeKey};
pub use state::{Attachment, ConversationState, Intent, QuickAction, RetrievedDoc, ToolOutcome};
