//! Context engine: the agentic query pipeline
//!
//! - Component identifier extraction and cross-reference triggering
//! - Grounding-constrained answer generation
//! - Heuristic groundedness verification
//! - The bounded-retry controller tying them together

mod controller;
mod extractor;
mod generator;
mod state;
mod verifier;

pub use controller::{QueryController, Stage};
pub use extractor::{needs_cross_reference, ComponentIdExtractor};
pub use generator::{cross_reference_summary, AnswerGenerator, NOT_AVAILABLE_ANSWER};
pub use state::PipelineState;
pub use verifier::{GroundednessVerifier, Verdict};
