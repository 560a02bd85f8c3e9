// Resume upload, analysis and retrieval.
// Records live in the KV store; PDFs and preview images in the blob store.

pub mod handlers;
pub mod pipeline;
pub mod store;
