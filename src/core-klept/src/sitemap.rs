//! XML sitemap parsing and expansion into page URLs.

use quick_xml::Reader;
use quick_xml::events::Event;
use url::Url;

use crate::errors::{Error, Result};
use crate::fetch::Fetcher;

/// A single `<url>` (or, in an index, `<sitemap>`) entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    /// The entry's `<loc>`.
    pub location: Url,
    /// The raw `<lastmod>` text, if present.
    pub last_modified: Option<String>,
}

/// A parsed sitemap document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SitemapDocument {
    /// A leaf sitemap: every entry is a page.
    UrlSet(Vec<SitemapEntry>),
    /// A sitemap index: every entry is another sitemap.
    Index(Vec<SitemapEntry>),
}

impl SitemapDocument {
    /// Page URLs listed by this document, in document order.
    ///
    /// Sitemap indexes are not followed into their child sitemaps, so an index
    /// lists no pages.
    pub fn page_urls(self) -> Vec<Url> {
        match self {
            SitemapDocument::UrlSet(entries) => entries.into_iter().map(|e| e.location).collect(),
            SitemapDocument::Index(_) => Vec::new(),
        }
    }
}

/// Fetches the sitemap at `sitemap_url` and returns the page URLs it lists.
///
/// A `<sitemapindex>` is valid but expands to zero URLs; its child sitemaps are
/// logged and not fetched.
///
/// # Errors
///
/// Returns an error if `sitemap_url` is not an absolute URL, the fetch fails,
/// or the document is not a well-formed sitemap.
pub async fn expand<F: Fetcher + ?Sized>(fetcher: &F, sitemap_url: &str) -> Result<Vec<Url>> {
    let url = Url::parse(sitemap_url)?;
    let raw = fetcher.fetch(&url).await?;
    let document = parse_sitemap(&raw)?;
    if let SitemapDocument::Index(sitemaps) = &document {
        tracing::warn!(
            "Sitemap '{}' is a sitemap index listing {} child sitemaps; indexes are not followed",
            url,
            sitemaps.len()
        );
    }
    let urls = document.page_urls();
    tracing::debug!("Sitemap '{}' expanded to {} URLs", url, urls.len());
    Ok(urls)
}

/// Depth of `<url>` / `<sitemap>` under the root element.
const ENTRY_DEPTH: usize = 2;
/// Depth of an entry's `<loc>` / `<lastmod>`.
const FIELD_DEPTH: usize = 3;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Loc,
    LastMod,
}

/// Parses raw sitemap XML.
///
/// Supports both standard forms:
/// ```xml
/// <urlset>
///   <url>
///     <loc>https://example.com/page</loc>
///     <lastmod>2024-01-01</lastmod>
///   </url>
/// </urlset>
/// ```
/// and `<sitemapindex>` with `<sitemap><loc>..</loc></sitemap>` children.
/// Any other root element is read like a `<urlset>`.
///
/// # Errors
///
/// Returns `Error::SitemapParse` if the XML is malformed, has no root element,
/// or a `<loc>` is not an absolute URL.
pub fn parse_sitemap(raw: &[u8]) -> Result<SitemapDocument> {
    let mut reader = Reader::from_reader(raw);
    reader.config_mut().trim_text(true);

    let mut is_index: Option<bool> = None;
    let mut entries = Vec::new();
    let mut depth: usize = 0;
    let mut field: Option<Field> = None;
    let mut loc: Option<String> = None;
    let mut lastmod: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                depth += 1;
                let name = e.local_name();
                if is_index.is_none() {
                    is_index = Some(name.as_ref() == b"sitemapindex");
                } else {
                    // Only direct children of an entry count; extensions such as
                    // <image:image><image:loc> nest deeper.
                    match (depth, name.as_ref()) {
                        (ENTRY_DEPTH, b"url" | b"sitemap") => {
                            loc = None;
                            lastmod = None;
                        }
                        (FIELD_DEPTH, b"loc") => field = Some(Field::Loc),
                        (FIELD_DEPTH, b"lastmod") => field = Some(Field::LastMod),
                        _ => {}
                    }
                }
            }
            Ok(Event::Empty(ref e)) => {
                if is_index.is_none() {
                    is_index = Some(e.local_name().as_ref() == b"sitemapindex");
                }
            }
            Ok(Event::Text(ref text)) => {
                if let Some(current) = field {
                    let value = text
                        .unescape()
                        .map_err(|e| Error::SitemapParse(format!("Invalid XML text: {}", e)))?;
                    append(current, &value, &mut loc, &mut lastmod);
                }
            }
            Ok(Event::CData(ref data)) => {
                if let Some(current) = field {
                    let value = String::from_utf8_lossy(data);
                    append(current, &value, &mut loc, &mut lastmod);
                }
            }
            Ok(Event::End(ref e)) => {
                let closing = depth;
                depth = depth.saturating_sub(1);
                match (closing, e.local_name().as_ref()) {
                    (FIELD_DEPTH, b"loc" | b"lastmod") => field = None,
                    (ENTRY_DEPTH, b"url" | b"sitemap") => match loc.take() {
                        Some(raw_loc) => {
                            let location = Url::parse(raw_loc.trim()).map_err(|e| {
                                Error::SitemapParse(format!("Invalid sitemap URL '{}': {}", raw_loc, e))
                            })?;
                            entries.push(SitemapEntry {
                                location,
                                last_modified: lastmod.take(),
                            });
                        }
                        None => tracing::warn!("Skipping sitemap entry without a <loc>"),
                    },
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::SitemapParse(format!("XML parsing error: {}", e))),
            _ => {}
        }
        buf.clear();
    }

    if depth != 0 {
        return Err(Error::SitemapParse("Unexpected end of document".to_string()));
    }

    match is_index {
        None => Err(Error::SitemapParse("Document has no root element".to_string())),
        Some(true) => Ok(SitemapDocument::Index(entries)),
        Some(false) => Ok(SitemapDocument::UrlSet(entries)),
    }
}

fn append(field: Field, value: &str, loc: &mut Option<String>, lastmod: &mut Option<String>) {
    let target = match field {
        Field::Loc => loc,
        Field::LastMod => lastmod,
    };
    target.get_or_insert_with(String::new).push_str(value);
}
