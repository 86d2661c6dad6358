//! Retrieval-augmented answering.
//!
//! [`AnswerEngine`] runs one question through search, context assembly,
//! prompt rendering and generation.

pub mod answer;
pub mod context;

pub use answer::{AnswerEngine, AnswerSettings, CONFIDENCE_THRESHOLD};
pub use context::{assemble_context, AssembledContext};
