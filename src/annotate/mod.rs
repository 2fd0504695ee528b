//! Annotator client: wraps an external OpenAI-compatible chat endpoint that
//! fills in language/title/description for extracted code blocks the
//! extractor set left incomplete.

pub mod batch;
pub mod client;
pub mod regenerate;

pub use batch::annotate_all;
pub use client::{CodeAnnotator, NullAnnotator, OpenAiAnnotator};
pub use regenerate::{regenerate_source, RegenerateSummary};
