//! Merges explicit page URLs and sitemap-discovered URLs into one work list.

use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use url::Url;

use crate::errors::Result;
use crate::fetch::Fetcher;
use crate::sitemap;

/// How many sitemaps are downloaded at the same time.
const SITEMAP_CONCURRENCY: usize = 4;

/// Builds the ordered, deduplicated list of pages to extract.
///
/// Explicit URLs come first in input order, followed by sitemap URLs in sitemap
/// input order and then document order. Duplicates (by normalized URL string)
/// keep their first position.
///
/// # Errors
///
/// Fails if any explicit URL is not an absolute URL. A failing sitemap fails the
/// build only when `abort_on_sitemap_error` is set; otherwise it is logged and
/// skipped.
pub async fn build<F: Fetcher + ?Sized>(
    fetcher: &F,
    explicit_urls: &[String],
    sitemap_urls: &[String],
    abort_on_sitemap_error: bool,
) -> Result<Vec<Url>> {
    let mut urls = explicit_urls
        .iter()
        .map(|raw| Url::parse(raw.trim()))
        .collect::<std::result::Result<Vec<Url>, _>>()?;

    // `buffered` yields in input order, so the merge order does not depend on download timing.
    let mut expansions = stream::iter(sitemap_urls)
        .map(|sitemap_url| async move { (sitemap_url, sitemap::expand(fetcher, sitemap_url).await) })
        .buffered(SITEMAP_CONCURRENCY);

    while let Some((sitemap_url, expanded)) = expansions.next().await {
        match expanded {
            Ok(found) => urls.extend(found),
            Err(error) if abort_on_sitemap_error => {
                tracing::error!("Failed to expand sitemap '{}': {}", sitemap_url, error);
                return Err(error);
            }
            Err(error) => {
                tracing::error!("[SKIP] Failed to expand sitemap '{}'; continuing: {}", sitemap_url, error);
            }
        }
    }

    Ok(dedup_preserving_order(urls))
}

/// Removes repeated URLs, keeping each one at its first position.
pub fn dedup_preserving_order(urls: Vec<Url>) -> Vec<Url> {
    let mut seen = HashSet::new();
    urls.into_iter()
        .filter(|url| seen.insert(url.as_str().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use crate::fetch::mock::MockFetcher;

    fn sitemap_of(locs: &[&str]) -> String {
        let entries: String = locs
            .iter()
            .map(|loc| format!("<url><loc>{}</loc></url>", loc))
            .collect();
        format!("<urlset>{}</urlset>", entries)
    }

    fn strs(urls: &[Url]) -> Vec<&str> {
        urls.iter().map(|u| u.as_str()).collect()
    }

    #[tokio::test]
    async fn test_build_dedups_explicit_urls() {
        let fetcher = MockFetcher::new();
        let explicit = vec![
            "https://example.com/a".to_string(),
            "https://example.com/b".to_string(),
            "https://example.com/a".to_string(),
        ];
        let urls = build(&fetcher, &explicit, &[], false).await.unwrap();
        assert_eq!(strs(&urls), vec!["https://example.com/a", "https://example.com/b"]);
    }

    #[tokio::test]
    async fn test_build_orders_explicit_then_sitemaps() {
        let first = sitemap_of(&["https://example.com/s1", "https://example.com/a"]);
        let second = sitemap_of(&["https://example.com/s2"]);
        let fetcher = MockFetcher::with_pages(vec![
            ("https://example.com/first.xml", first.as_str()),
            ("https://example.com/second.xml", second.as_str()),
        ]);
        let explicit = vec!["https://example.com/a".to_string()];
        let sitemaps = vec![
            "https://example.com/first.xml".to_string(),
            "https://example.com/second.xml".to_string(),
        ];

        let urls = build(&fetcher, &explicit, &sitemaps, false).await.unwrap();
        assert_eq!(
            strs(&urls),
            vec!["https://example.com/a", "https://example.com/s1", "https://example.com/s2"]
        );
    }

    #[tokio::test]
    async fn test_build_rejects_relative_explicit_url() {
        let fetcher = MockFetcher::new();
        let explicit = vec!["https://example.com/a".to_string(), "/relative".to_string()];
        let result = build(&fetcher, &explicit, &[], false).await;
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_build_skips_failing_sitemap() {
        let good = sitemap_of(&["https://example.com/ok"]);
        let fetcher = MockFetcher::with_pages(vec![
            ("https://example.com/good.xml", good.as_str()),
            ("https://example.com/broken.xml", "<urlset><url></urlset>"),
        ]);
        let sitemaps = vec![
            "https://example.com/missing.xml".to_string(),
            "https://example.com/broken.xml".to_string(),
            "not a url".to_string(),
            "https://example.com/good.xml".to_string(),
        ];

        let urls = build(&fetcher, &[], &sitemaps, false).await.unwrap();
        assert_eq!(strs(&urls), vec!["https://example.com/ok"]);
    }

    #[tokio::test]
    async fn test_build_aborts_on_failing_sitemap() {
        let good = sitemap_of(&["https://example.com/ok"]);
        let fetcher = MockFetcher::with_pages(vec![("https://example.com/good.xml", good.as_str())]);
        let sitemaps = vec![
            "https://example.com/good.xml".to_string(),
            "https://example.com/missing.xml".to_string(),
        ];

        let result = build(&fetcher, &[], &sitemaps, true).await;
        assert!(matches!(result, Err(Error::HttpStatus { status: 404, .. })));
    }

    #[test]
    fn test_dedup_uses_normalized_form() {
        let urls = vec![
            Url::parse("https://example.com").unwrap(),
            Url::parse("https://example.com/").unwrap(),
        ];
        assert_eq!(dedup_preserving_order(urls).len(), 1);
    }
}
