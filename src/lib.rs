// src/lib.rs

// Import the top-level `backlot` module.
pub mod backlot;

// Re-export the commonly used types at the crate root so applications can
// write `backlot::Supervisor` instead of `backlot::backlot::supervisor::Supervisor`.
pub use backlot::client_wrapper::{ClientWrapper, Message, Role};
pub use backlot::config::RuntimeConfig;
pub use backlot::conversation::{Agent, AgentKind};
pub use backlot::identity::{CallerIdentity, DataSensitivity, UserRole};
pub use backlot::router::LLMRouter;
pub use backlot::security::SecurityFilter;
pub use backlot::supervisor::Supervisor;
pub use backlot::{
    agents, client_wrapper, clients, config, conversation, graph, graph_tools, identity, ingress,
    logging, memory, prompts, router, security, session, supervisor, tool_protocol,
};
