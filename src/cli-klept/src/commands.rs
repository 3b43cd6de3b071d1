use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use core_klept::{
    DEFAULT_FETCH_TIMEOUT, ExtractionRequest, Extractor, HttpFetcher, NamingStrategy, OutputConfig, sitemap, url_set,
};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::{BatchArgs, ExtractArgs, SitemapArgs};

/// Extracts every page into the output directory. Fails the process if any page failed.
pub async fn batch(args: BatchArgs, cancel: CancellationToken) -> anyhow::Result<ExitCode> {
    let request = ExtractionRequest::assemble(
        &args.prompt.input_tag,
        &args.prompt.output_tag,
        args.selector.selector(),
    )
    .context("Invalid prompt configuration")?;
    let naming = NamingStrategy::for_output(request.output_tag(), &args.file_prefix);
    let provider = Arc::new(args.deepseek.provider());
    let fetcher = Arc::new(HttpFetcher::new(DEFAULT_FETCH_TIMEOUT).context("Failed to build HTTP client")?);

    let urls = url_set::build(
        fetcher.as_ref(),
        &args.urls,
        &args.sitemap_urls,
        args.abort_on_sitemap_error,
    )
    .await
    .context("Failed to build the list of pages")?;

    if urls.is_empty() {
        tracing::warn!("No pages to extract");
        return Ok(ExitCode::SUCCESS);
    }
    tracing::info!(
        "Extracting {} pages as {} into '{}'",
        urls.len(),
        request.output_tag(),
        args.output_dir.display()
    );

    let extractor = Extractor::new(
        fetcher,
        provider,
        request,
        OutputConfig {
            dir: args.output_dir,
            naming,
        },
        cancel,
    );
    let report = extractor.run_batch(urls, usize::from(args.jobs)).await;

    for outcome in report.outcomes() {
        match &outcome.result {
            Err(failure) => eprintln!("FAILED {} ({})", outcome.url, failure),
            Ok(written) if written.replaced_earlier_output => {
                eprintln!("REPLACED {} ({} was already written this run)", outcome.url, written.file_name)
            }
            Ok(_) => {}
        }
    }
    eprintln!(
        "{} succeeded, {} failed, {} tokens consumed",
        report.succeeded(),
        report.failed(),
        report.total_tokens()
    );

    Ok(if report.failed() == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Extracts one page and prints the result to stdout.
pub async fn extract(args: ExtractArgs, cancel: CancellationToken) -> anyhow::Result<ExitCode> {
    let request = ExtractionRequest::assemble(&args.input_tag, &args.output_tag, args.selector())
        .context("Invalid prompt configuration")?;
    let naming = NamingStrategy::for_output(request.output_tag(), "autoklept");
    let url = Url::parse(&args.url).with_context(|| format!("Invalid URL '{}'", args.url))?;

    let extractor = Extractor::new(
        Arc::new(HttpFetcher::new(DEFAULT_FETCH_TIMEOUT).context("Failed to build HTTP client")?),
        Arc::new(args.deepseek.provider()),
        request,
        OutputConfig {
            dir: ".".into(),
            naming,
        },
        cancel,
    );
    let result = extractor
        .extract_one(&url)
        .await
        .with_context(|| format!("Failed to extract '{}'", url))?;

    if let Some(reasoning) = &result.reasoning_trace {
        tracing::debug!("Reasoning: {}", reasoning);
    }
    tracing::info!("Extracted '{}' ({} tokens)", url, result.tokens_consumed);
    println!("{}", result.content);
    Ok(ExitCode::SUCCESS)
}

/// Prints the page URLs of one sitemap, one per line.
pub async fn list_sitemap(args: SitemapArgs) -> anyhow::Result<ExitCode> {
    let fetcher = HttpFetcher::new(DEFAULT_FETCH_TIMEOUT).context("Failed to build HTTP client")?;
    let urls = sitemap::expand(&fetcher, &args.url)
        .await
        .with_context(|| format!("Failed to expand sitemap '{}'", args.url))?;
    for url in urls {
        println!("{}", url);
    }
    Ok(ExitCode::SUCCESS)
}
