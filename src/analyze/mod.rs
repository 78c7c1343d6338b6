// src/analyze/mod.rs
//! Optional AI-assisted second pass: capability contract and reranker.

pub mod ai_adapter;
pub mod rerank;

pub use crate::analyze::ai_adapter::{
    build_capability, AiCapability, DisabledCapability, DynAiCapability, LexicalCapability,
};
pub use crate::analyze::rerank::RelevanceRanker;
