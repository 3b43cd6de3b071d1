//! Mock completion provider for testing
//!
//! This module provides a mock implementation of the `CompletionProvider` trait
//! that can be configured to return predefined responses or errors,
//! without making real API calls.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::{Error, Result};
use crate::llms::{ChatMessage, CompletionProvider, ExtractionResult};

/// Mock completion provider for testing
///
/// Can be configured to:
/// - Return specific responses based on message content
/// - Return a default response for any request
/// - Simulate API failures and slow responses
#[derive(Default)]
pub struct MockCompletionProvider {
    /// If the last message contains the key, return the corresponding response.
    /// Checked in insertion order.
    responses: Vec<(String, String)>,
    /// Default response if no specific match found
    default_response: Option<String>,
    /// If true, always return an error
    should_fail: bool,
    /// Artificial latency per call
    delay: Option<Duration>,
    /// Tokens reported for every successful call
    tokens_per_call: u32,
    calls: AtomicUsize,
    last_messages: Mutex<Option<(String, Vec<ChatMessage>)>>,
}

impl MockCompletionProvider {
    /// Create a new empty mock provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that returns a specific response when the page content contains the given text
    pub fn with_response(content_contains: &str, response: &str) -> Self {
        let mut provider = Self::new();
        provider.add_response(content_contains, response);
        provider
    }

    /// Create a mock with multiple configured responses
    pub fn with_responses(responses: Vec<(&str, &str)>) -> Self {
        let mut provider = Self::new();
        for (content_part, response) in responses {
            provider.add_response(content_part, response);
        }
        provider
    }

    /// Create a mock with a default response for any request
    pub fn with_default(response: &str) -> Self {
        let mut provider = Self::new();
        provider.set_default(response);
        provider
    }

    /// Create a mock that always fails with an error
    pub fn with_failure() -> Self {
        let mut provider = Self::new();
        provider.set_should_fail(true);
        provider
    }

    /// Add a response mapping to this provider
    pub fn add_response(&mut self, content_contains: &str, response: &str) {
        self.responses.push((content_contains.to_string(), response.to_string()));
    }

    /// Set the default response
    pub fn set_default(&mut self, response: &str) {
        self.default_response = Some(response.to_string());
    }

    /// Set whether this provider should fail
    pub fn set_should_fail(&mut self, should_fail: bool) {
        self.should_fail = should_fail;
    }

    /// Sleep this long before answering each call
    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = Some(delay);
    }

    /// Report this many tokens for each successful call
    pub fn set_tokens_per_call(&mut self, tokens: u32) {
        self.tokens_per_call = tokens;
    }

    /// Number of calls received so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// System role and messages of the most recent call
    pub fn last_request(&self) -> Option<(String, Vec<ChatMessage>)> {
        self.last_messages.lock().ok().and_then(|last| last.clone())
    }
}

#[async_trait]
impl CompletionProvider for MockCompletionProvider {
    async fn complete(&self, system_role: &str, messages: &[ChatMessage]) -> Result<ExtractionResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_messages.lock() {
            *last = Some((system_role.to_string(), messages.to_vec()));
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.should_fail {
            return Err(Error::Completion("Mock completion provider configured to fail".to_string()));
        }

        let content = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        let response = self
            .responses
            .iter()
            .find(|(key, _)| content.contains(key.as_str()))
            .map(|(_, response)| response.clone())
            .or_else(|| self.default_response.clone())
            .ok_or_else(|| {
                Error::Completion("Mock completion provider has no response configured for this request".to_string())
            })?;

        Ok(ExtractionResult {
            content: response,
            reasoning_trace: None,
            tokens_consumed: self.tokens_per_call,
        })
    }
}

//
// Test Fixtures
//

/// A blog page whose content lives in a `div#SITE_CONTAINER`.
pub fn sample_blog_html() -> &'static str {
    r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>My First Post</title>
</head>
<body>
    <header>
        <nav>
            <ul>
                <li><a href="/">Home</a></li>
                <li><a href="/about">About</a></li>
            </ul>
        </nav>
    </header>
    <div id="SITE_CONTAINER">
        <h1>My First Post: A Beginning</h1>
        <p>Hello from the blog.</p>
    </div>
    <footer>
        <p>&copy; 2024 Example.com</p>
    </footer>
</body>
</html>
"#
}

/// A Hugo document with TOML front matter, as the model returns it for the Hugo output tag.
pub fn sample_hugo_document() -> &'static str {
    r#"+++
date = 2024-03-01
draft = true
tags = ["intro", "rust"]
title = "My First Post: A Beginning"
+++

Hello from the blog.
"#
}
