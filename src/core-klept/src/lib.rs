//! # autoklept extraction core
//!
//! Discovers web pages (directly or through XML sitemaps), narrows each page to the
//! HTML subtree that holds its content, asks an LLM to reformat that content, and
//! writes one deterministically named file per page.
//!
//! ## Features
//!
//! - Expand `<urlset>` sitemaps into page URLs
//! - Merge explicit and sitemap URLs into one deduplicated work list
//! - Locate the first element matching a tag and attribute
//! - Assemble prompts from closed input and output tag enumerations
//! - Run extraction jobs on a bounded worker pool with cancellation
//! - Name outputs by URL hash or by front matter title
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use core_klept::{
//!     DEFAULT_FETCH_TIMEOUT, ExtractionRequest, Extractor, HttpFetcher, NamingStrategy, NodeSelector,
//!     OutputConfig, OutputTag, llms::DeepSeek, llms::deepseek::DEFAULT_COMPLETION_TIMEOUT, url_set,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fetcher = Arc::new(HttpFetcher::new(DEFAULT_FETCH_TIMEOUT)?);
//!     let urls = url_set::build(
//!         fetcher.as_ref(),
//!         &[],
//!         &["https://example.com/sitemap.xml".to_string()],
//!         false,
//!     )
//!     .await?;
//!
//!     let extractor = Extractor::new(
//!         fetcher,
//!         Arc::new(DeepSeek::new("sk-...", DEFAULT_COMPLETION_TIMEOUT)),
//!         ExtractionRequest::assemble("blog", "markdown", NodeSelector::new("div", "id", "SITE_CONTAINER"))?,
//!         OutputConfig {
//!             dir: "out".into(),
//!             naming: NamingStrategy::for_output(OutputTag::Markdown, "autoklept"),
//!         },
//!         CancellationToken::new(),
//!     );
//!     let report = extractor.run_batch(urls, 4).await;
//!     println!("{} succeeded, {} failed", report.succeeded(), report.failed());
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod errors;
pub mod extractor;
pub mod fetch;
pub mod html;
pub mod job;
pub mod llms;
pub mod naming;
pub mod prompt;
pub mod sitemap;
pub mod url_set;

pub use batch::BatchReport;
pub use errors::{Error, Result};
pub use extractor::Extractor;
pub use fetch::{DEFAULT_FETCH_TIMEOUT, Fetcher, HttpFetcher};
pub use html::{NodeSelector, locate};
pub use job::{ExtractionJob, JobContext, JobFailure, JobOutcome, JobStage, OutputConfig, WrittenOutput, write_output};
pub use llms::{ChatMessage, CompletionProvider, ExtractionResult, Role};
pub use naming::{FrontMatter, NamingStrategy, hash_prefix, parse_front_matter, slugify_title};
pub use prompt::{ExtractionRequest, InputTag, OutputTag};
pub use sitemap::{SitemapDocument, SitemapEntry, parse_sitemap};
