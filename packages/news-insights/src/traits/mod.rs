//! Core trait abstractions.
//!
//! Storage, queue transport, web access, LLM calls and pacing all sit behind
//! these traits so the stage workers can run against in-memory doubles.

pub mod ai;
pub mod queue;
pub mod rate_limit;
pub mod store;
pub mod web;
