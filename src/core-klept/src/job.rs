//! The per-URL extraction job.
//!
//! A job walks `Fetching → Locating → Prompting → Completing → Naming → Writing → Done`.
//! Each stage runs one fallible operation and the job only advances on success; a
//! failure is reported together with the stage it happened in. Output is written to a
//! temporary sibling file and renamed into place, so a failed job leaves no file behind.

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::errors::{Error, Result};
use crate::fetch::Fetcher;
use crate::html;
use crate::llms::{CompletionProvider, ExtractionResult};
use crate::naming::NamingStrategy;
use crate::prompt::ExtractionRequest;

/// Where a job is in its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStage {
    Fetching,
    Locating,
    Prompting,
    Completing,
    Naming,
    Writing,
    Done,
}

impl std::fmt::Display for JobStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobStage::Fetching => "fetching",
            JobStage::Locating => "locating",
            JobStage::Prompting => "prompting",
            JobStage::Completing => "completing",
            JobStage::Naming => "naming",
            JobStage::Writing => "writing",
            JobStage::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// A failed job: the stage it was in and what went wrong.
#[derive(Debug)]
pub struct JobFailure {
    pub stage: JobStage,
    pub error: Error,
}

impl std::fmt::Display for JobFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed while {}: {}", self.stage, self.error)
    }
}

/// A file written by a successful job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenOutput {
    pub path: PathBuf,
    pub file_name: String,
    pub tokens_consumed: u32,
    /// Another job of the same run had already written this file name, so its output
    /// was replaced. Happens when two pages share a front matter title.
    pub replaced_earlier_output: bool,
}

/// The final state of one URL.
#[derive(Debug)]
pub struct JobOutcome {
    pub url: Url,
    pub result: std::result::Result<WrittenOutput, JobFailure>,
}

impl JobOutcome {
    /// Outcome for a URL that was never started because the run was cancelled.
    pub fn cancelled(url: Url) -> Self {
        Self {
            url,
            result: Err(JobFailure {
                stage: JobStage::Fetching,
                error: Error::Cancelled,
            }),
        }
    }

    /// Outcome for a URL whose job panicked. The stage it reached is lost with the
    /// job, so the failure is attributed to the first stage.
    pub fn panicked(url: Url, message: impl Into<String>) -> Self {
        Self {
            url,
            result: Err(JobFailure {
                stage: JobStage::Fetching,
                error: Error::Panicked(message.into()),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn tokens_consumed(&self) -> u32 {
        self.result.as_ref().map(|written| written.tokens_consumed).unwrap_or(0)
    }
}

/// Where outputs go and how they are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub naming: NamingStrategy,
}

/// Everything a job needs, shared between all jobs of a run.
pub struct JobContext<F: ?Sized, P: ?Sized> {
    pub fetcher: Arc<F>,
    pub provider: Arc<P>,
    pub request: Arc<ExtractionRequest>,
    pub output: Arc<OutputConfig>,
    pub cancel: CancellationToken,
    written_names: Arc<Mutex<HashSet<String>>>,
}

impl<F: ?Sized, P: ?Sized> JobContext<F, P> {
    pub fn new(
        fetcher: Arc<F>,
        provider: Arc<P>,
        request: Arc<ExtractionRequest>,
        output: Arc<OutputConfig>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            provider,
            request,
            output,
            cancel,
            written_names: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Records that a job of this run is writing `file_name`. Returns `false` when the
    /// name was already taken.
    fn claim_file_name(&self, file_name: &str) -> bool {
        let mut names = match self.written_names.lock() {
            Ok(names) => names,
            Err(poisoned) => poisoned.into_inner(),
        };
        names.insert(file_name.to_string())
    }
}

impl<F: ?Sized, P: ?Sized> Clone for JobContext<F, P> {
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            provider: self.provider.clone(),
            request: self.request.clone(),
            output: self.output.clone(),
            cancel: self.cancel.clone(),
            written_names: self.written_names.clone(),
        }
    }
}

/// One URL moving through the pipeline.
pub struct ExtractionJob<'a, F: ?Sized, P: ?Sized> {
    ctx: &'a JobContext<F, P>,
    url: Url,
    stage: JobStage,
}

impl<'a, F, P> ExtractionJob<'a, F, P>
where
    F: Fetcher + ?Sized,
    P: CompletionProvider + ?Sized,
{
    pub fn new(ctx: &'a JobContext<F, P>, url: Url) -> Self {
        Self {
            ctx,
            url,
            stage: JobStage::Fetching,
        }
    }

    pub fn stage(&self) -> JobStage {
        self.stage
    }

    /// Runs the whole pipeline and reports the outcome. Never panics on job errors.
    pub async fn run(mut self) -> JobOutcome {
        let result = self.execute().await;
        match &result {
            Ok(written) => tracing::info!(
                "[url: {}] Wrote '{}' ({} tokens)",
                self.url,
                written.path.display(),
                written.tokens_consumed
            ),
            Err(failure) => tracing::error!("[SKIP] [url: {}] Job {}", self.url, failure),
        }
        JobOutcome { url: self.url, result }
    }

    /// Runs the stages up to and including the completion, without naming or writing.
    pub async fn extract(&mut self) -> std::result::Result<ExtractionResult, JobFailure> {
        let page = cancellable(&self.ctx.cancel, self.ctx.fetcher.fetch(&self.url))
            .await
            .map_err(|e| self.fail(e))?;
        tracing::debug!("[url: {}] Downloaded HTML ({} bytes)", self.url, page.len());

        self.advance(JobStage::Locating);
        let located = html::locate(&page, self.ctx.request.selector()).map_err(|e| self.fail(e))?;
        tracing::debug!(
            "[url: {}] Located content ({} bytes -> {} bytes)",
            self.url,
            page.len(),
            located.len()
        );

        self.advance(JobStage::Prompting);
        let messages = self.ctx.request.messages_for(&String::from_utf8_lossy(&located));

        self.advance(JobStage::Completing);
        let extraction = cancellable(
            &self.ctx.cancel,
            self.ctx
                .provider
                .complete(self.ctx.request.system_instructions(), &messages),
        )
        .await
        .map_err(|e| self.fail(e))?;
        tracing::debug!(
            "[url: {}] Completion returned {} bytes ({} tokens)",
            self.url,
            extraction.content.len(),
            extraction.tokens_consumed
        );
        Ok(extraction)
    }

    async fn execute(&mut self) -> std::result::Result<WrittenOutput, JobFailure> {
        let extraction = self.extract().await?;

        self.advance(JobStage::Naming);
        let file_name = self
            .ctx
            .output
            .naming
            .file_name(&self.url, &extraction.content)
            .map_err(|e| self.fail(e))?;

        let replaced_earlier_output = !self.ctx.claim_file_name(&file_name);
        if replaced_earlier_output {
            tracing::warn!(
                "[url: {}] Output name '{}' was already written by another page in this run; replacing it",
                self.url,
                file_name
            );
        }

        self.advance(JobStage::Writing);
        let path = write_output(&self.ctx.output.dir, &file_name, extraction.content.as_bytes())
            .await
            .map_err(|e| self.fail(e))?;

        self.advance(JobStage::Done);
        Ok(WrittenOutput {
            path,
            file_name,
            tokens_consumed: extraction.tokens_consumed,
            replaced_earlier_output,
        })
    }

    fn advance(&mut self, next: JobStage) {
        tracing::debug!("[url: {}] {} -> {}", self.url, self.stage, next);
        self.stage = next;
    }

    fn fail(&self, error: Error) -> JobFailure {
        JobFailure {
            stage: self.stage,
            error,
        }
    }
}

/// Races `operation` against the cancellation token.
async fn cancellable<T>(cancel: &CancellationToken, operation: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = operation => result,
    }
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Writes `contents` to `dir/file_name`, creating `dir` if needed.
///
/// The bytes go to a hidden temporary file in the same directory first, which is then
/// renamed over the destination. Nothing is left at the destination if any step fails.
pub async fn write_output(dir: &Path, file_name: &str, contents: &[u8]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;

    let path = dir.join(file_name);
    let temp = dir.join(format!(
        ".{}.{}-{}.tmp",
        file_name,
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    let written = match tokio::fs::write(&temp, contents).await {
        Ok(()) => tokio::fs::rename(&temp, &path).await,
        Err(e) => Err(e),
    };
    if let Err(e) = written {
        // the temp file may not exist, so a failed removal is fine
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e.into());
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::mock::MockFetcher;
    use crate::html::NodeSelector;
    use crate::llms::mock::{MockCompletionProvider, sample_blog_html, sample_hugo_document};
    use crate::naming::hash_prefix;
    use crate::prompt::{InputTag, OutputTag};

    const PAGE_URL: &str = "http://example.com/post";

    fn context(
        fetcher: MockFetcher,
        provider: MockCompletionProvider,
        output: OutputTag,
        dir: &Path,
    ) -> JobContext<MockFetcher, MockCompletionProvider> {
        let selector = NodeSelector::new("div", "id", "SITE_CONTAINER");
        JobContext::new(
            Arc::new(fetcher),
            Arc::new(provider),
            Arc::new(ExtractionRequest::new(InputTag::Blog, output, selector)),
            Arc::new(OutputConfig {
                dir: dir.to_path_buf(),
                naming: NamingStrategy::for_output(output, "autoklept"),
            }),
            CancellationToken::new(),
        )
    }

    fn blog_fetcher() -> MockFetcher {
        MockFetcher::with_pages(vec![(PAGE_URL, sample_blog_html())])
    }

    fn page_url() -> Url {
        Url::parse(PAGE_URL).unwrap()
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        match std::fs::read_dir(dir) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_job_writes_hash_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(
            blog_fetcher(),
            MockCompletionProvider::with_default("Hello from the blog."),
            OutputTag::Text,
            dir.path(),
        );

        let outcome = ExtractionJob::new(&ctx, page_url()).run().await;
        let written = outcome.result.unwrap();

        assert_eq!(written.file_name, format!("autoklept-{}.md", hash_prefix(PAGE_URL, 5)));
        assert_eq!(std::fs::read_to_string(&written.path).unwrap(), "Hello from the blog.");
        assert_eq!(dir_entries(dir.path()), vec![written.file_name.clone()]);
    }

    #[tokio::test]
    async fn test_job_sends_only_located_subtree() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(
            blog_fetcher(),
            MockCompletionProvider::with_default("ok"),
            OutputTag::Markdown,
            dir.path(),
        );

        ExtractionJob::new(&ctx, page_url()).run().await.result.unwrap();

        let (system_role, messages) = ctx.provider.last_request().unwrap();
        assert_eq!(system_role, ctx.request.system_instructions());
        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.starts_with(ctx.request.task_prompt()));
        assert!(messages[0].content.contains("Hello from the blog."));
        assert!(!messages[0].content.contains("About"));
        assert!(!messages[0].content.contains("Example.com"));
    }

    #[tokio::test]
    async fn test_job_names_hugo_output_by_title() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(
            blog_fetcher(),
            MockCompletionProvider::with_default(sample_hugo_document()),
            OutputTag::Hugo,
            dir.path(),
        );

        let written = ExtractionJob::new(&ctx, page_url()).run().await.result.unwrap();
        assert_eq!(written.file_name, "my-first-post-a-beginning.md");
        assert_eq!(std::fs::read_to_string(written.path).unwrap(), sample_hugo_document());
    }

    #[tokio::test]
    async fn test_job_flags_shared_hugo_title() {
        const OTHER_URL: &str = "http://example.com/another-post";
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MockFetcher::with_pages(vec![(PAGE_URL, sample_blog_html()), (OTHER_URL, sample_blog_html())]);
        let ctx = context(
            fetcher,
            MockCompletionProvider::with_default(sample_hugo_document()),
            OutputTag::Hugo,
            dir.path(),
        );

        let first = ExtractionJob::new(&ctx, page_url()).run().await.result.unwrap();
        let second = ExtractionJob::new(&ctx, Url::parse(OTHER_URL).unwrap())
            .run()
            .await
            .result
            .unwrap();

        assert!(!first.replaced_earlier_output);
        assert!(second.replaced_earlier_output);
        assert_eq!(first.file_name, second.file_name);
        assert_eq!(dir_entries(dir.path()), vec![second.file_name.clone()]);
    }

    #[tokio::test]
    async fn test_job_distinct_hash_names_are_not_flagged() {
        const OTHER_URL: &str = "http://example.com/another-post";
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MockFetcher::with_pages(vec![(PAGE_URL, sample_blog_html()), (OTHER_URL, sample_blog_html())]);
        let ctx = context(fetcher, MockCompletionProvider::with_default("x"), OutputTag::Markdown, dir.path());

        let first = ExtractionJob::new(&ctx, page_url()).run().await.result.unwrap();
        let second = ExtractionJob::new(&ctx, Url::parse(OTHER_URL).unwrap())
            .run()
            .await
            .result
            .unwrap();

        assert!(!first.replaced_earlier_output);
        assert!(!second.replaced_earlier_output);
        assert_eq!(dir_entries(dir.path()).len(), 2);
    }

    #[tokio::test]
    async fn test_job_failure_stages() {
        let mut not_found = MockFetcher::new();
        not_found.add_status(PAGE_URL, 500);
        let no_container = MockFetcher::with_pages(vec![(PAGE_URL, "<html><body><p>plain</p></body></html>")]);

        let cases: Vec<(MockFetcher, MockCompletionProvider, OutputTag, JobStage)> = vec![
            (not_found, MockCompletionProvider::with_default("x"), OutputTag::Text, JobStage::Fetching),
            (no_container, MockCompletionProvider::with_default("x"), OutputTag::Text, JobStage::Locating),
            (blog_fetcher(), MockCompletionProvider::with_failure(), OutputTag::Text, JobStage::Completing),
            (blog_fetcher(), MockCompletionProvider::with_default("no front matter"), OutputTag::Hugo, JobStage::Naming),
        ];

        for (fetcher, provider, output, expected_stage) in cases {
            let dir = tempfile::tempdir().unwrap();
            let ctx = context(fetcher, provider, output, dir.path());
            let outcome = ExtractionJob::new(&ctx, page_url()).run().await;
            let failure = outcome.result.unwrap_err();
            assert_eq!(failure.stage, expected_stage, "error: {}", failure.error);
            assert!(dir_entries(dir.path()).is_empty(), "nothing may be written when {}", failure);
        }
    }

    #[tokio::test]
    async fn test_job_write_failure_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, "a file where the output directory should be").unwrap();

        let ctx = context(blog_fetcher(), MockCompletionProvider::with_default("x"), OutputTag::Text, &blocker);
        let failure = ExtractionJob::new(&ctx, page_url()).run().await.result.unwrap_err();

        assert_eq!(failure.stage, JobStage::Writing);
        assert!(matches!(failure.error, Error::Io(_)));
        assert_eq!(dir_entries(dir.path()), vec!["blocked".to_string()]);
    }

    #[tokio::test]
    async fn test_job_cancelled_before_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(blog_fetcher(), MockCompletionProvider::with_default("x"), OutputTag::Text, dir.path());
        ctx.cancel.cancel();

        let failure = ExtractionJob::new(&ctx, page_url()).run().await.result.unwrap_err();
        assert_eq!(failure.stage, JobStage::Fetching);
        assert!(matches!(failure.error, Error::Cancelled));
        assert!(ctx.fetcher.requested().is_empty());
        assert_eq!(ctx.provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_job_cancelled_during_completion() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = MockCompletionProvider::with_default("x");
        provider.set_delay(std::time::Duration::from_secs(30));
        let ctx = context(blog_fetcher(), provider, OutputTag::Text, dir.path());

        let cancel = ctx.cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            cancel.cancel();
        });

        let failure = ExtractionJob::new(&ctx, page_url()).run().await.result.unwrap_err();
        assert_eq!(failure.stage, JobStage::Completing);
        assert!(matches!(failure.error, Error::Cancelled));
        assert!(dir_entries(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_write_output_creates_directory_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        let path = write_output(&nested, "out.md", b"first").await.unwrap();
        assert_eq!(path, nested.join("out.md"));
        write_output(&nested, "out.md", b"second").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        assert_eq!(dir_entries(&nested), vec!["out.md".to_string()]);
    }
}
