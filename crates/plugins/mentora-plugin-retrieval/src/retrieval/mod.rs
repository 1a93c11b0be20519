/*!
# Hybrid Multi-Signal Retrieval

Fuses the independent semantic (vector) and keyword (full-text) relevance
channels into one ranked result list, with optional graph-neighborhood
augmentation.
*/

pub mod hybrid;

pub use hybrid::{fuse_channels, rank_documents, HybridSearch};
