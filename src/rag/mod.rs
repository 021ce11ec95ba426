//! Retrieval-augmented generation: crawling web sources into chunks,
//! embedding them into a local LanceDB table, and answering questions
//! grounded in the retrieved chunks.

pub mod chain;
pub mod chunker;
pub mod loader;
pub mod manager;
pub mod sources;
pub mod store;
pub mod types;

pub use chain::RetrievalChain;
pub use manager::RagManager;
