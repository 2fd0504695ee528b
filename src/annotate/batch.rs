//! Batching and pipelining on top of a `CodeAnnotator`: groups blocks into
//! requests of up to `batch_size`, then runs up to `num_parallel` of those
//! requests concurrently via a buffered stream, preserving input order in
//! the returned vector regardless of completion order.

use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::annotate::client::CodeAnnotator;
use crate::models::ExtractedCodeBlock;

/// Annotates every block in `blocks`, batching and pipelining per the
/// annotator contract. Order is preserved: `result[i]` corresponds to
/// `blocks[i]`.
pub async fn annotate_all(
    annotator: Arc<dyn CodeAnnotator>,
    blocks: Vec<ExtractedCodeBlock>,
    batch_size: usize,
    num_parallel: usize,
) -> Vec<ExtractedCodeBlock> {
    if blocks.is_empty() {
        return blocks;
    }
    let batch_size = batch_size.max(1);
    let num_parallel = num_parallel.max(1);

    let chunks: Vec<Vec<ExtractedCodeBlock>> = blocks.chunks(batch_size).map(|c| c.to_vec()).collect();

    let annotated_chunks: Vec<Vec<ExtractedCodeBlock>> = stream::iter(chunks.into_iter().map(|chunk| {
        let annotator = Arc::clone(&annotator);
        async move { annotator.annotate(&chunk).await }
    }))
    .buffered(num_parallel)
    .collect()
    .await;

    annotated_chunks.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::client::NullAnnotator;
    use crate::models::ExtractedContext;

    fn block(n: usize) -> ExtractedCodeBlock {
        ExtractedCodeBlock {
            language: None,
            code: format!("code-{n}"),
            context: ExtractedContext::default(),
            line_span: (n, n),
            filename_hint: None,
        }
    }

    #[tokio::test]
    async fn preserves_order_across_batches() {
        let blocks: Vec<_> = (0..11).map(block).collect();
        let result = annotate_all(Arc::new(NullAnnotator), blocks, 5, 2).await;
        assert_eq!(result.len(), 11);
        for (i, b) in result.iter().enumerate() {
            assert_eq!(b.code, format!("code-{i}"));
        }
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let result = annotate_all(Arc::new(NullAnnotator), Vec::new(), 5, 2).await;
        assert!(result.is_empty());
    }
}
