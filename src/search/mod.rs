//! Search & Tool Surface: ranked search, pagination, token chunking, and
//! library resolution shared by the HTTP API and the MCP tool handlers.

mod chunk;
mod pagination;
mod service;

pub use chunk::chunk_markdown;
pub use pagination::Pagination;
pub use service::{LibraryPage, MarkdownChunk, SearchService, SnippetPage};
