//! Ties the storage layer to the `search_libraries` / `get_content` /
//! `get_page_markdown` contracts shared by the HTTP and MCP surfaces.

use crate::config::Config;
use crate::error::{CodeDoxError, Result};
use crate::models::{CodeSnippet, Document, Source};
use crate::repository::{Repositories, SearchFilters};

use super::chunk::{best_matching_chunk, chunk_markdown, highlight_matches};
use super::pagination::Pagination;

#[derive(Clone)]
pub struct SearchService {
    repos: Repositories,
    default_max_results: u32,
    max_results: u32,
    chars_per_token: usize,
}

#[derive(Debug, Clone)]
pub struct LibraryPage {
    pub libraries: Vec<Source>,
    pub total: i64,
    pub page: u32,
    pub pages: u32,
}

#[derive(Debug, Clone)]
pub struct SnippetPage {
    pub snippets: Vec<CodeSnippet>,
    pub total: i64,
    pub page: u32,
    pub pages: u32,
}

#[derive(Debug, Clone)]
pub struct MarkdownChunk {
    pub document: Document,
    pub source: Source,
    pub markdown_content: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

impl SearchService {
    pub fn new(repos: Repositories, config: &Config) -> Self {
        Self {
            repos,
            default_max_results: config.search_default_max_results as u32,
            max_results: config.search_max_results as u32,
            chars_per_token: config.search_chars_per_token.max(1),
        }
    }

    /// Library/source lookup by name (case-insensitive substring + prefix
    /// ranking), or every source, newest first, when `query` is empty.
    pub async fn search_libraries(
        &self,
        query: Option<&str>,
        limit: Option<u32>,
        page: Option<u32>,
    ) -> Result<LibraryPage> {
        let pagination = Pagination::new(page, limit, self.default_max_results, self.max_results);
        let all = match query {
            Some(q) if !q.trim().is_empty() => self.repos.sources.search(q).await?,
            _ => self.repos.sources.list().await?,
        };
        let total = all.len() as i64;
        let offset = pagination.offset().max(0) as usize;
        let libraries = all
            .into_iter()
            .skip(offset)
            .take(pagination.limit as usize)
            .collect();
        Ok(LibraryPage {
            libraries,
            total,
            page: pagination.page,
            pages: pagination.total_pages(total),
        })
    }

    /// Snippets for one resolved library: full-text ranked when `query` is
    /// given, otherwise the most recently updated snippets first.
    pub async fn get_content(
        &self,
        library_id: &str,
        query: Option<&str>,
        limit: Option<u32>,
        page: Option<u32>,
    ) -> Result<SnippetPage> {
        let source = self.repos.sources.resolve_library(library_id).await?;
        let pagination = Pagination::new(page, limit, self.default_max_results, self.max_results);

        let (snippets, total) = match query {
            Some(q) if !q.trim().is_empty() => {
                let filters = SearchFilters {
                    source_id: Some(source.id),
                    language: None,
                    limit: pagination.limit_i64(),
                    offset: pagination.offset(),
                };
                self.repos.snippets.search(q, &filters).await?
            }
            _ => {
                self.repos
                    .snippets
                    .recent_by_source(source.id, pagination.limit_i64(), pagination.offset())
                    .await?
            }
        };

        Ok(SnippetPage {
            snippets,
            total,
            page: pagination.page,
            pages: pagination.total_pages(total),
        })
    }

    /// A page's stored markdown, chunked by `max_tokens` (default 2048)
    /// with ~10% overlap between chunks. When `query` is given and
    /// `chunk_index` is not pinned explicitly, the chunk with the most
    /// matches is selected and its matches are wrapped in `**emphasis**`.
    pub async fn get_page_markdown(
        &self,
        url: &str,
        query: Option<&str>,
        max_tokens: Option<usize>,
        chunk_index: Option<usize>,
    ) -> Result<MarkdownChunk> {
        let document = self.repos.documents.find_by_url(url).await?;
        let (document, markdown) = self.repos.documents.get_markdown(document.id).await?;
        let source = self.repos.sources.get(document.source_id).await?;

        let chunks = chunk_markdown(&markdown, max_tokens.unwrap_or(2048), self.chars_per_token);
        let query = query.filter(|q| !q.trim().is_empty());
        let chunk_index = match chunk_index {
            Some(i) => i,
            None => query.map(|q| best_matching_chunk(&chunks, q)).unwrap_or(0),
        };
        let content = chunks.get(chunk_index).cloned().ok_or_else(|| {
            CodeDoxError::Validation(format!(
                "chunk_index {chunk_index} out of range (document has {} chunks)",
                chunks.len()
            ))
        })?;
        let content = match query {
            Some(q) => highlight_matches(&content, q),
            None => content,
        };

        Ok(MarkdownChunk {
            document,
            source,
            markdown_content: content,
            chunk_index,
            total_chunks: chunks.len(),
        })
    }

    /// Owning source for a snippet, used by HTTP/MCP handlers that attach
    /// a `source_url` to a single search result.
    pub async fn snippet_source(&self, snippet: &CodeSnippet) -> Result<Source> {
        let document = self.repos.documents.get(snippet.document_id).await?;
        self.repos.sources.get(document.source_id).await
    }
}
