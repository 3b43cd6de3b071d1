//! Error types for the extraction pipeline.

use thiserror::Error;

/// Main error type for URL discovery, extraction and output operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A source URL, sitemap URL or sitemap `<loc>` is not an absolute URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// HTTP transport failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Non-success status {status} when fetching '{url}'")]
    HttpStatus { url: String, status: u16 },

    /// Sitemap document could not be parsed.
    #[error("Sitemap parsing failed: {0}")]
    SitemapParse(String),

    /// HTML could not be parsed or re-serialized.
    #[error("HTML parsing error: {0}")]
    HtmlParse(String),

    /// No element in the document matched the configured selector.
    #[error("No element matches selector {0}")]
    SelectorNotFound(String),

    /// A prompt tag is not one of the known members of its enumeration.
    #[error("Invalid {kind} \"{value}\": invalid enum member")]
    InvalidEnumMember { kind: &'static str, value: String },

    /// The LLM completion failed or returned nothing usable.
    #[error("Completion failed: {0}")]
    Completion(String),

    /// The LLM completion did not finish within the configured timeout.
    #[error("Completion timed out after {0:?}")]
    CompletionTimeout(std::time::Duration),

    /// Front matter was required for naming but is missing or malformed.
    #[error("Front matter error: {0}")]
    FrontMatter(String),

    /// Writing the output file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The run was cancelled before this operation finished.
    #[error("Cancelled")]
    Cancelled,

    /// The job panicked; carries the panic message when it was a string.
    #[error("Job panicked: {0}")]
    Panicked(String),
}

impl From<async_openai::error::OpenAIError> for Error {
    fn from(err: async_openai::error::OpenAIError) -> Self {
        Error::Completion(err.to_string())
    }
}

/// Type alias for Result with the pipeline's Error.
pub type Result<T> = std::result::Result<T, Error>;
