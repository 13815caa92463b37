//! Node handlers, one per node kind.
//!
//! A handler reads and writes the shared context and returns a
//! `NodeResult`. Node-local failures are reported through the result's
//! success flag; only `ai_agent` and `rag_knowledge` return `Err`, which
//! aborts the whole run.

mod agent;
mod analyze;
mod knowledge;
mod router;
mod script;
mod stubs;
mod text;

pub use agent::ai_agent;
pub use analyze::{gpt_analyze, sentiment};
pub use knowledge::rag_knowledge;
pub use router::switch_router;
pub use script::python_script;
pub use stubs::{
    book_appointment, cancel_appointment, check_availability, long_term_memory, unknown,
};
pub use text::{interpolate, send_text};
