//! Workflow node execution.
//!
//! A run takes an ordered list of `WorkflowNode`s and an initial
//! `ExecutionContext`. Every node config is validated into a `NodeSpec`
//! first; the nodes then execute one after another against the shared
//! context, and the run stops at the first node that reports failure.

pub mod executor;
pub mod handlers;
pub mod prompts;
pub mod script;
pub mod spec;

pub use executor::NodeExecutor;
pub use script::create_sandbox;
pub use spec::{NodeKind, NodeSpec};
