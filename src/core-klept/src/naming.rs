//! Deterministic output file names.
//!
//! A name is either derived from the page URL (a short SHA-256 prefix) or, for
//! outputs that embed front matter, from the document's title. Names never
//! depend on scheduling, so every run over the same inputs writes the same files.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use url::Url;

use crate::errors::{Error, Result};
use crate::prompt::OutputTag;

/// Marker line that opens and closes a TOML front matter block.
pub const FRONT_MATTER_MARKER: &str = "+++\n";

/// Hex characters kept from the URL hash.
pub const HASH_PREFIX_LEN: usize = 5;

/// File extension of every output.
pub const OUTPUT_EXTENSION: &str = "md";

/// Metadata at the top of a generated blog document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FrontMatter {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    /// Either a quoted string or a bare TOML date.
    #[serde(default)]
    pub date: Option<toml::Value>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl FrontMatter {
    /// The date rendered as text, whichever TOML form it was written in.
    pub fn date_text(&self) -> Option<String> {
        self.date.as_ref().map(|date| match date {
            toml::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// How output files are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamingStrategy {
    /// `<prefix>-<hash>.md`, hashing the page URL.
    UrlHash { prefix: String },
    /// `<slug>.md`, slugifying the front matter title.
    FrontMatterTitle,
}

impl NamingStrategy {
    /// Picks title naming for front-matter outputs and URL hashing for everything else.
    pub fn for_output(output: OutputTag, prefix: &str) -> Self {
        if output.has_front_matter() {
            NamingStrategy::FrontMatterTitle
        } else {
            NamingStrategy::UrlHash {
                prefix: prefix.to_string(),
            }
        }
    }

    /// Derives the file name for one page's output.
    ///
    /// # Errors
    ///
    /// `Error::FrontMatter` when title naming is used and the content has no
    /// usable front matter title.
    pub fn file_name(&self, url: &Url, content: &str) -> Result<String> {
        match self {
            NamingStrategy::UrlHash { prefix } => Ok(format!(
                "{}-{}.{}",
                prefix,
                hash_prefix(url.as_str(), HASH_PREFIX_LEN),
                OUTPUT_EXTENSION
            )),
            NamingStrategy::FrontMatterTitle => {
                let front_matter = parse_front_matter(content)?;
                let title = front_matter
                    .title
                    .as_deref()
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .ok_or_else(|| Error::FrontMatter("front matter has no title".to_string()))?;
                let slug = slugify_title(title);
                if slug.is_empty() {
                    return Err(Error::FrontMatter(format!("title '{}' yields an empty file name", title)));
                }
                Ok(format!("{}.{}", slug, OUTPUT_EXTENSION))
            }
        }
    }
}

/// First `len` hex characters of the SHA-256 of `s`.
pub fn hash_prefix(s: &str, len: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    let mut hex = format!("{:x}", hasher.finalize());
    hex.truncate(len);
    hex
}

/// Lower-cases, turns spaces into hyphens, and drops colons and path separators.
pub fn slugify_title(title: &str) -> String {
    title
        .trim()
        .to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|c| !matches!(c, ':' | '/' | '\\'))
        .collect()
}

/// Parses the TOML block between the opening and closing `+++` markers.
///
/// # Errors
///
/// `Error::FrontMatter` if the content does not start with the marker, the
/// block is not closed, or the block is not valid TOML.
pub fn parse_front_matter(content: &str) -> Result<FrontMatter> {
    let rest = content
        .strip_prefix(FRONT_MATTER_MARKER)
        .ok_or_else(|| Error::FrontMatter("no TOML front matter found".to_string()))?;
    let (block, _body) = rest
        .split_once(FRONT_MATTER_MARKER)
        .ok_or_else(|| Error::FrontMatter("front matter block is not closed".to_string()))?;
    toml::from_str(block).map_err(|e| Error::FrontMatter(format!("invalid TOML front matter: {}", e)))
}
