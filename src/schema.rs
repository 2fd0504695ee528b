// Diesel table definitions for the PostgreSQL schema applied by
// `repository::migrations`. Kept hand-written (not `diesel print-schema`
// generated) so the FTS-vector column can be typed without a custom SQL type.

diesel::table! {
    sources (id) {
        id -> Uuid,
        name -> Text,
        version -> Nullable<Text>,
        base_url -> Nullable<Text>,
        kind -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    documents (id) {
        id -> Uuid,
        source_id -> Uuid,
        url -> Text,
        title -> Text,
        crawl_depth -> Integer,
        content_hash -> Text,
        markdown -> Nullable<Text>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    snippets (id) {
        id -> Uuid,
        document_id -> Uuid,
        language -> Text,
        code -> Text,
        title -> Text,
        description -> Text,
        filename_hint -> Nullable<Text>,
        hierarchy -> Array<Text>,
        line_start -> Integer,
        line_end -> Integer,
        code_hash -> Text,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
        // tsvector generated column; not mapped to a Rust field, only used
        // by hand-written SQL in search queries.
    }
}

diesel::table! {
    crawl_jobs (id) {
        id -> Uuid,
        source_id -> Nullable<Uuid>,
        name -> Text,
        start_urls -> Array<Text>,
        max_depth -> Integer,
        include_patterns -> Array<Text>,
        exclude_patterns -> Array<Text>,
        domain_filter -> Nullable<Text>,
        max_concurrent_crawls -> Integer,
        max_pages -> Nullable<Integer>,
        status -> Text,
        phase -> Text,
        pages_crawled -> BigInt,
        pages_skipped_unchanged -> BigInt,
        snippets_extracted -> BigInt,
        failed_pages -> BigInt,
        base_snippet_count -> BigInt,
        retry_generation -> Integer,
        version -> Integer,
        heartbeat_at -> Timestamptz,
        error_message -> Nullable<Text>,
        started_at -> Nullable<Timestamptz>,
        ended_at -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    failed_pages (id) {
        id -> Uuid,
        job_id -> Uuid,
        url -> Text,
        error_message -> Text,
        failed_at -> Timestamptz,
        retry_generation -> Integer,
    }
}

diesel::table! {
    schema_migrations (version) {
        version -> Text,
        applied_at -> Timestamptz,
        skipped -> Bool,
    }
}

diesel::joinable!(documents -> sources (source_id));
diesel::joinable!(snippets -> documents (document_id));
diesel::joinable!(failed_pages -> crawl_jobs (job_id));

diesel::allow_tables_to_appear_in_same_query!(
    sources,
    documents,
    snippets,
    crawl_jobs,
    failed_pages,
    schema_migrations,
);
