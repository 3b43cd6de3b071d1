use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::batch::{self, BatchReport};
use crate::errors::Result;
use crate::fetch::Fetcher;
use crate::job::{ExtractionJob, JobContext, OutputConfig};
use crate::llms::{CompletionProvider, ExtractionResult};
use crate::prompt::ExtractionRequest;

/// Owns the collaborators and request template of a run.
pub struct Extractor<F: ?Sized, P: ?Sized> {
    ctx: JobContext<F, P>,
}

impl<F, P> Extractor<F, P>
where
    F: Fetcher + ?Sized + 'static,
    P: CompletionProvider + ?Sized + 'static,
{
    pub fn new(
        fetcher: Arc<F>,
        provider: Arc<P>,
        request: ExtractionRequest,
        output: OutputConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            ctx: JobContext::new(fetcher, provider, Arc::new(request), Arc::new(output), cancel),
        }
    }

    pub fn request(&self) -> &ExtractionRequest {
        &self.ctx.request
    }

    pub fn output(&self) -> &OutputConfig {
        &self.ctx.output
    }

    /// Fetches, locates and completes a single page without writing anything.
    pub async fn extract_one(&self, url: &Url) -> Result<ExtractionResult> {
        ExtractionJob::new(&self.ctx, url.clone())
            .extract()
            .await
            .map_err(|failure| failure.error)
    }

    /// Runs the full pipeline over `urls` and logs a summary.
    pub async fn run_batch(&self, urls: Vec<Url>, concurrency: usize) -> BatchReport {
        let ctx = self.ctx.clone();
        let report = batch::run(urls, concurrency, self.ctx.cancel.clone(), move |url| {
            let ctx = ctx.clone();
            async move { ExtractionJob::new(&ctx, url).run().await }
        })
        .await;

        tracing::info!(
            "Batch finished: {} succeeded, {} failed, {} tokens consumed",
            report.succeeded(),
            report.failed(),
            report.total_tokens()
        );
        report
    }
}
