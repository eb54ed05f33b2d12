//! Interview practice: question generation, answer evaluation and coaching.
//!
//! Flow: generate questions → create a session over them → evaluate each
//! answer and store it as a response → read back session results.

pub mod clarification;
pub mod evaluator;
pub mod generator;
pub mod handlers;
pub mod prompts;
