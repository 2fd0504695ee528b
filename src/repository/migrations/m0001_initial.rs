//! Initial schema: sources, documents, snippets, crawl_jobs, failed_pages.

use super::Migration;

pub fn migration() -> Migration {
    Migration {
        version: "0001_initial",
        description: "create core tables, FTS vector, and indexes",
        sql: SQL,
    }
}

const SQL: &str = r#"
CREATE EXTENSION IF NOT EXISTS pgcrypto;

CREATE TABLE sources (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name TEXT NOT NULL,
    version TEXT,
    base_url TEXT,
    kind TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT sources_name_version_key UNIQUE (name, version)
);

CREATE TABLE documents (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    source_id UUID NOT NULL REFERENCES sources(id) ON DELETE CASCADE,
    url TEXT NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    crawl_depth INTEGER NOT NULL DEFAULT 0,
    content_hash TEXT NOT NULL,
    markdown TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT documents_source_url_key UNIQUE (source_id, url)
);
CREATE INDEX documents_source_id_idx ON documents(source_id);

CREATE TABLE snippets (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    document_id UUID NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    language TEXT NOT NULL DEFAULT '',
    code TEXT NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    description TEXT NOT NULL DEFAULT '',
    filename_hint TEXT,
    hierarchy TEXT[] NOT NULL DEFAULT '{}',
    line_start INTEGER NOT NULL DEFAULT 0,
    line_end INTEGER NOT NULL DEFAULT 0,
    code_hash TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    search_vector tsvector GENERATED ALWAYS AS (
        setweight(to_tsvector('english', coalesce(title, '')), 'A') ||
        setweight(to_tsvector('english', coalesce(description, '')), 'B') ||
        setweight(to_tsvector('english', coalesce(code, '')), 'C')
    ) STORED,
    CONSTRAINT snippets_document_code_hash_key UNIQUE (document_id, code_hash)
);
CREATE INDEX snippets_language_idx ON snippets(language);
CREATE INDEX snippets_document_id_idx ON snippets(document_id);
CREATE INDEX snippets_search_vector_idx ON snippets USING GIN (search_vector);

CREATE TABLE crawl_jobs (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    source_id UUID REFERENCES sources(id),
    name TEXT NOT NULL,
    start_urls TEXT[] NOT NULL,
    max_depth INTEGER NOT NULL DEFAULT 2,
    include_patterns TEXT[] NOT NULL DEFAULT '{}',
    exclude_patterns TEXT[] NOT NULL DEFAULT '{}',
    domain_filter TEXT,
    max_concurrent_crawls INTEGER NOT NULL DEFAULT 5,
    max_pages INTEGER,
    status TEXT NOT NULL DEFAULT 'pending',
    phase TEXT NOT NULL DEFAULT 'crawling',
    pages_crawled BIGINT NOT NULL DEFAULT 0,
    pages_skipped_unchanged BIGINT NOT NULL DEFAULT 0,
    snippets_extracted BIGINT NOT NULL DEFAULT 0,
    failed_pages BIGINT NOT NULL DEFAULT 0,
    base_snippet_count BIGINT NOT NULL DEFAULT 0,
    retry_generation INTEGER NOT NULL DEFAULT 0,
    version INTEGER NOT NULL DEFAULT 0,
    heartbeat_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    error_message TEXT,
    started_at TIMESTAMPTZ,
    ended_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX crawl_jobs_status_idx ON crawl_jobs(status);

CREATE TABLE failed_pages (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    job_id UUID NOT NULL REFERENCES crawl_jobs(id) ON DELETE CASCADE,
    url TEXT NOT NULL,
    error_message TEXT NOT NULL,
    failed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    retry_generation INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX failed_pages_job_id_idx ON failed_pages(job_id);
"#;
