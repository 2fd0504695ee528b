//! Splits a markdown document into token-budgeted chunks for
//! `get_page_markdown`, preferring paragraph and sentence boundaries over a
//! hard cut mid-word.

/// Splits `markdown` into chunks estimated at `max_tokens` tokens apiece
/// (at `chars_per_token` characters per token), with every chunk after the
/// first overlapping its predecessor by about 10% of the chunk size so a
/// boundary doesn't sever a paragraph into two unreadable halves.
pub fn chunk_markdown(markdown: &str, max_tokens: usize, chars_per_token: usize) -> Vec<String> {
    let chunk_chars = max_tokens.max(1) * chars_per_token.max(1);
    let len = markdown.len();
    if len <= chunk_chars {
        return vec![markdown.to_string()];
    }
    let overlap_chars = (chunk_chars / 10).max(1);

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let ideal_end = floor_char_boundary(markdown, (start + chunk_chars).min(len));
        let end = if ideal_end >= len {
            len
        } else {
            find_break(markdown, start, ideal_end)
        };
        chunks.push(markdown[start..end].to_string());
        if end >= len {
            break;
        }
        let next_start = floor_char_boundary(markdown, end.saturating_sub(overlap_chars));
        start = next_start.max(start + 1);
    }
    chunks
}

/// Looks backward from `ideal_end`, within the trailing third of the
/// `[start, ideal_end]` window, for a paragraph break, then a sentence
/// break, falling back to a hard cut at `ideal_end` if neither is found.
fn find_break(text: &str, start: usize, ideal_end: usize) -> usize {
    let window_start = floor_char_boundary(text, start + (ideal_end - start) * 2 / 3);
    let window = &text[window_start..ideal_end];

    if let Some(pos) = window.rfind("\n\n") {
        return window_start + pos + 2;
    }
    for needle in [". ", ".\n", "! ", "? "] {
        if let Some(pos) = window.rfind(needle) {
            return window_start + pos + needle.len();
        }
    }
    ideal_end
}

fn floor_char_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Picks the chunk with the most case-insensitive occurrences of the
/// query's whitespace-separated terms, so a multi-chunk document surfaces
/// the part that actually matched rather than always chunk zero.
pub fn best_matching_chunk(chunks: &[String], query: &str) -> usize {
    let terms: Vec<String> = query.split_whitespace().map(|t| t.to_lowercase()).collect();
    if terms.is_empty() {
        return 0;
    }
    chunks
        .iter()
        .enumerate()
        .max_by_key(|(_, chunk)| {
            let lower = chunk.to_lowercase();
            terms.iter().map(|t| lower.matches(t.as_str()).count()).sum::<usize>()
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Wraps every case-insensitive occurrence of a query term in `**...**`
/// markdown emphasis markers so matches stand out in the returned chunk.
pub fn highlight_matches(text: &str, query: &str) -> String {
    let terms: Vec<&str> = query.split_whitespace().filter(|t| t.len() > 1).collect();
    if terms.is_empty() {
        return text.to_string();
    }

    let lower = text.to_lowercase();
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for term in &terms {
        let needle = term.to_lowercase();
        let mut search_from = 0usize;
        while let Some(pos) = lower[search_from..].find(&needle) {
            let start = search_from + pos;
            let end = start + needle.len();
            ranges.push((start, end));
            search_from = end;
        }
    }
    if ranges.is_empty() {
        return text.to_string();
    }
    ranges.sort_unstable();

    let mut merged: Vec<(usize, usize)> = Vec::new();
    for (start, end) in ranges {
        match merged.last_mut() {
            Some((_, last_end)) if start <= *last_end => *last_end = (*last_end).max(end),
            _ => merged.push((start, end)),
        }
    }

    let mut out = String::with_capacity(text.len() + merged.len() * 4);
    let mut cursor = 0usize;
    for (start, end) in merged {
        out.push_str(&text[cursor..start]);
        out.push_str("**");
        out.push_str(&text[start..end]);
        out.push_str("**");
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod highlight_tests {
    use super::*;

    #[test]
    fn highlights_case_insensitive_matches() {
        let out = highlight_matches("Hello World, hello again", "hello");
        assert_eq!(out, "**Hello** World, **hello** again");
    }

    #[test]
    fn leaves_text_unchanged_when_no_match() {
        let out = highlight_matches("nothing here", "xyz");
        assert_eq!(out, "nothing here");
    }

    #[test]
    fn best_matching_chunk_prefers_the_chunk_with_more_hits() {
        let chunks = vec!["no matches at all".to_string(), "match match match".to_string()];
        assert_eq!(best_matching_chunk(&chunks, "match"), 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_document_is_a_single_chunk() {
        let chunks = chunk_markdown("short text", 2048, 4);
        assert_eq!(chunks, vec!["short text".to_string()]);
    }

    #[test]
    fn long_document_splits_on_paragraph_boundaries() {
        let para = "word ".repeat(20);
        let markdown = format!("{para}\n\n{para}\n\n{para}");
        let chunks = chunk_markdown(&markdown, 10, 4);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(!c.is_empty());
        }
        assert!(chunks.iter().collect::<String>().contains(para.trim()));
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let para = "word ".repeat(40);
        let chunks = chunk_markdown(&para, 10, 4);
        assert!(chunks.len() >= 2);
        let prev_tail = chunks[0][chunks[0].len().saturating_sub(8)..].trim();
        assert!(prev_tail.is_empty() || chunks[1].contains(prev_tail));
    }

    #[test]
    fn never_loops_forever_on_pathological_input() {
        let markdown = "x".repeat(1000);
        let chunks = chunk_markdown(&markdown, 1, 1);
        assert!(chunks.len() >= 100);
        assert!(chunks.iter().all(|c| !c.is_empty()));
    }
}
