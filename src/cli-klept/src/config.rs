//! Command-line and environment configuration.
//!
//! Every option can also be set through an `AUTOKLEPT_`-prefixed environment variable,
//! and a `.env` file is loaded before parsing.

use std::path::PathBuf;
use std::time::Duration;

use clap::builder::NonEmptyStringValueParser;
use clap::{ArgGroup, Args, Parser, Subcommand};
use core_klept::NodeSelector;
use core_klept::llms::DeepSeek;
use core_klept::llms::deepseek::DEFAULT_COMPLETION_TIMEOUT;

use crate::logging::LogFormat;

#[derive(Parser, Debug)]
#[command(name = "autoklept")]
#[command(about = "Extract page content through an LLM and save it as files", long_about = None)]
pub struct Cli {
    /// Log output format
    #[arg(long, global = true, env = "AUTOKLEPT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract every page from explicit URLs and sitemaps into the output directory
    Batch(BatchArgs),
    /// Extract a single page and print the result
    Extract(ExtractArgs),
    /// List the page URLs of a sitemap
    Sitemap(SitemapArgs),
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("sources").required(true).multiple(true).args(["urls", "sitemap_urls"])))]
pub struct BatchArgs {
    /// Page URL to extract (repeatable)
    #[arg(long = "url", value_parser = validate_url)]
    pub urls: Vec<String>,

    /// Sitemap whose pages are extracted (repeatable)
    #[arg(long = "sitemap-url")]
    pub sitemap_urls: Vec<String>,

    #[command(flatten)]
    pub prompt: PromptArgs,

    #[command(flatten)]
    pub selector: SelectorArgs,

    /// Directory the output files are written to
    #[arg(long, env = "AUTOKLEPT_OUTPUT_DIR", default_value = "out")]
    pub output_dir: PathBuf,

    /// Prefix of hash-named output files
    #[arg(long, env = "AUTOKLEPT_FILE_PREFIX", default_value = "autoklept", value_parser = validate_file_prefix)]
    pub file_prefix: String,

    /// Number of pages processed at the same time
    #[arg(short = 'j', long, env = "AUTOKLEPT_JOBS", default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    pub jobs: u16,

    /// Stop before extracting anything if a sitemap cannot be expanded
    #[arg(long, env = "AUTOKLEPT_ABORT_ON_SITEMAP_ERROR")]
    pub abort_on_sitemap_error: bool,

    #[command(flatten)]
    pub deepseek: DeepSeekArgs,
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Page URL to extract
    #[arg(short, long, value_parser = validate_url)]
    pub url: String,

    /// What the page contains (all, blog)
    #[arg(long, env = "AUTOKLEPT_INPUT_TAG", default_value = "blog")]
    pub input_tag: String,

    /// Output format (text, markdown, simple, hugo)
    #[arg(long, env = "AUTOKLEPT_OUTPUT_TAG", default_value = "markdown")]
    pub output_tag: String,

    /// Tag of the element holding the content
    #[arg(long, env = "AUTOKLEPT_HTML_TAG", default_value = "div")]
    pub html_tag: String,

    /// Attribute that identifies the content element
    #[arg(long, env = "AUTOKLEPT_HTML_ATTR_KEY", default_value = "id")]
    pub html_attr_key: String,

    /// Value of that attribute
    #[arg(long, env = "AUTOKLEPT_HTML_ATTR_VAL", default_value = "SITE_CONTAINER")]
    pub html_attr_val: String,

    #[command(flatten)]
    pub deepseek: DeepSeekArgs,
}

impl ExtractArgs {
    pub fn selector(&self) -> Option<NodeSelector> {
        NodeSelector::from_parts(
            Some(self.html_tag.as_str()),
            Some(self.html_attr_key.as_str()),
            Some(self.html_attr_val.as_str()),
        )
    }
}

#[derive(Args, Debug)]
pub struct SitemapArgs {
    /// Sitemap URL
    #[arg(short, long, value_parser = validate_url)]
    pub url: String,
}

#[derive(Args, Debug)]
pub struct PromptArgs {
    /// What the pages contain (all, blog)
    #[arg(long, env = "AUTOKLEPT_INPUT_TAG")]
    pub input_tag: String,

    /// Output format (text, markdown, simple, hugo)
    #[arg(long, env = "AUTOKLEPT_OUTPUT_TAG")]
    pub output_tag: String,
}

/// Optional element selector. All three parts are needed for it to apply.
#[derive(Args, Debug)]
pub struct SelectorArgs {
    /// Tag of the element holding the content
    #[arg(long, env = "AUTOKLEPT_HTML_TAG")]
    pub html_tag: Option<String>,

    /// Attribute that identifies the content element
    #[arg(long, env = "AUTOKLEPT_HTML_ATTR_KEY")]
    pub html_attr_key: Option<String>,

    /// Value of that attribute
    #[arg(long, env = "AUTOKLEPT_HTML_ATTR_VAL")]
    pub html_attr_val: Option<String>,
}

impl SelectorArgs {
    pub fn selector(&self) -> Option<NodeSelector> {
        NodeSelector::from_parts(
            self.html_tag.as_deref(),
            self.html_attr_key.as_deref(),
            self.html_attr_val.as_deref(),
        )
    }
}

#[derive(Args)]
pub struct DeepSeekArgs {
    /// DeepSeek API key
    #[arg(long, env = "AUTOKLEPT_DEEPSEEK_API_KEY", hide_env_values = true, value_parser = NonEmptyStringValueParser::new())]
    pub deepseek_api_key: String,

    /// Seconds to wait for one completion
    #[arg(long, env = "AUTOKLEPT_DEEPSEEK_TIMEOUT_SECS", default_value_t = DEFAULT_COMPLETION_TIMEOUT.as_secs())]
    pub deepseek_timeout_secs: u64,
}

impl DeepSeekArgs {
    pub fn provider(&self) -> DeepSeek {
        DeepSeek::new(&self.deepseek_api_key, Duration::from_secs(self.deepseek_timeout_secs))
    }
}

impl std::fmt::Debug for DeepSeekArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepSeekArgs")
            .field("deepseek_api_key", &"<redacted>")
            .field("deepseek_timeout_secs", &self.deepseek_timeout_secs)
            .finish()
    }
}

fn validate_url(s: &str) -> Result<String, String> {
    url::Url::parse(s)
        .map(|_| s.to_string())
        .map_err(|e| format!("Invalid URL: {}", e))
}

fn validate_file_prefix(s: &str) -> Result<String, String> {
    if s.is_empty() {
        return Err("File prefix must not be empty".to_string());
    }
    if s.contains(['/', '\\']) {
        return Err(format!("File prefix must not contain path separators: {}", s));
    }
    Ok(s.to_string())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    const KEY: [&str; 2] = ["--deepseek-api-key", "sk-test"];

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        let mut argv = vec!["autoklept"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv)
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_batch_arguments() {
        let cli = parse(&[
            "batch",
            "--url",
            "https://example.com/a",
            "--url",
            "https://example.com/b",
            "--sitemap-url",
            "https://example.com/sitemap.xml",
            "--input-tag",
            "blog",
            "--output-tag",
            "hugo",
            "--html-tag",
            "div",
            "--html-attr-key",
            "id",
            "--html-attr-val",
            "SITE_CONTAINER",
            "-j",
            "4",
            "--abort-on-sitemap-error",
            KEY[0],
            KEY[1],
        ])
        .unwrap();

        let Command::Batch(args) = cli.command else {
            panic!("expected batch");
        };
        assert_eq!(args.urls, vec!["https://example.com/a", "https://example.com/b"]);
        assert_eq!(args.sitemap_urls, vec!["https://example.com/sitemap.xml"]);
        assert_eq!(args.jobs, 4);
        assert!(args.abort_on_sitemap_error);
        assert_eq!(args.selector.selector().unwrap().to_string(), r#"div[id="SITE_CONTAINER"]"#);
        assert_eq!(args.deepseek.deepseek_api_key, "sk-test");
    }

    #[test]
    fn test_batch_rejects_bad_input() {
        // no URL source
        assert!(parse(&["batch", "--input-tag", "blog", "--output-tag", "text", KEY[0], KEY[1]]).is_err());
        // relative explicit URL
        assert!(
            parse(&["batch", "--url", "/post", "--input-tag", "blog", "--output-tag", "text", KEY[0], KEY[1]]).is_err()
        );
        // zero jobs
        assert!(
            parse(&[
                "batch",
                "--url",
                "https://example.com",
                "--input-tag",
                "blog",
                "--output-tag",
                "text",
                "-j",
                "0",
                KEY[0],
                KEY[1]
            ])
            .is_err()
        );
    }

    #[test]
    fn test_extract_defaults() {
        let cli = parse(&["extract", "--url", "https://example.com/post", KEY[0], KEY[1]]).unwrap();
        let Command::Extract(args) = cli.command else {
            panic!("expected extract");
        };
        assert_eq!(args.input_tag, "blog");
        assert_eq!(args.output_tag, "markdown");
        assert_eq!(args.selector().unwrap().to_string(), r#"div[id="SITE_CONTAINER"]"#);
    }

    #[test]
    fn test_api_key_is_redacted() {
        let cli = parse(&["extract", "--url", "https://example.com/post", KEY[0], KEY[1]]).unwrap();
        assert!(!format!("{:?}", cli).contains("sk-test"));
    }

    #[test]
    fn test_file_prefix_validation() {
        assert!(validate_file_prefix("autoklept").is_ok());
        assert!(validate_file_prefix("").is_err());
        assert!(validate_file_prefix("../escape").is_err());
    }
}
