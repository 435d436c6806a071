//! Retrieval-augmented home assistant chatbot backend.

pub mod cache;
pub mod core;
pub mod embedding;
pub mod llm;
pub mod orchestrator;
pub mod rag;
pub mod server;
pub mod state;
pub mod vector_math;
