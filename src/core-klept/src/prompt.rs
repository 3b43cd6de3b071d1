//! Prompt fragments and assembly of the per-run extraction request.
//!
//! The fragments below are composed to tell the model what kind of page it is
//! reading and which output format to produce.

use std::str::FromStr;

use indoc::indoc;

use crate::errors::{Error, Result};
use crate::html::NodeSelector;
use crate::llms::ChatMessage;

/// System role sent with every completion.
pub const SYSTEM_ROLE: &str = indoc! {"
    - You are extremely good at parsing HTML.
    - You are aware of the pitfalls of tricky characters like backticks.
    - It is your top priority not to change the actual user content you extract from any parsed HTML. You must not reword, summarize, or remove anything - you must reproduce the original user language exactly and completely.
    - You must preserve the structure of the original content as much as possible.
    - If you drop any content from the original page, the extraction is worthless, so please try your best.
    - When you output, do not write anything before or after the raw output you formatted from the original content. DO NOT output any backtick open / close blocks, like ```markdown
    <content here...>
    ``` or ```toml
    <content here...>
    ```."
};

/// First line of every task prompt.
pub const EXTRACTION_PREAMBLE: &str = "Extract out all actual user content from the following HTML. ";

const ALL_INPUT_TEXT: &str = "The input HTML contains text, images, and video.";
const BLOG_INPUT_TEXT: &str = "The input HTML contains a blog.";
const TEXT_OUTPUT_TEXT: &str = "Output the content as raw text, without any formatting except line breaks.";
const MARKDOWN_OUTPUT_TEXT: &str =
    "Output the content as markdown, preserving as much of the original formatting as possible.";
const SIMPLE_OUTPUT_TEXT: &str = "Output the content as simplified HTML, where as much site-specific HTML slop has been stripped out, while still preserving as much of the original structure and rendering.";
const HUGO_OUTPUT_TEXT: &str = indoc! {r#"
    Output the content as a Hugo-compatible blog markdown document, preserving as much of the original formatting as possible.
    Create the markdown document with a TOML-formatted front matter section, delimited by +++ lines, with the following fields:
    - "date", which is populated with the input blog's creation or posting date
    - "draft", which is hard-coded to true
    - "tags", which is populated as a TOML list of tags on the original blog
    - "title", which is populated from the blog's title

    Be sure to strip out the original title and tags from the text of the input blog, since they are captured by the front matter metadata.
"#};

/// What kind of content the page holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputTag {
    All,
    Blog,
}

/// The format the model should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputTag {
    Text,
    Markdown,
    Simple,
    /// Hugo blog document with TOML front matter; outputs are named after their title.
    Hugo,
}

impl InputTag {
    pub const ALL: [InputTag; 2] = [InputTag::All, InputTag::Blog];

    pub fn name(&self) -> &'static str {
        match self {
            InputTag::All => "All",
            InputTag::Blog => "Blog",
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            InputTag::All => ALL_INPUT_TEXT,
            InputTag::Blog => BLOG_INPUT_TEXT,
        }
    }
}

impl OutputTag {
    pub const ALL: [OutputTag; 4] = [OutputTag::Text, OutputTag::Markdown, OutputTag::Simple, OutputTag::Hugo];

    pub fn name(&self) -> &'static str {
        match self {
            OutputTag::Text => "Text",
            OutputTag::Markdown => "Markdown",
            OutputTag::Simple => "Simple",
            OutputTag::Hugo => "Hugo",
        }
    }

    pub fn instruction(&self) -> &'static str {
        match self {
            OutputTag::Text => TEXT_OUTPUT_TEXT,
            OutputTag::Markdown => MARKDOWN_OUTPUT_TEXT,
            OutputTag::Simple => SIMPLE_OUTPUT_TEXT,
            OutputTag::Hugo => HUGO_OUTPUT_TEXT,
        }
    }

    /// True when the output embeds front matter that names the file.
    pub fn has_front_matter(&self) -> bool {
        matches!(self, OutputTag::Hugo)
    }
}

impl FromStr for InputTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        InputTag::ALL
            .into_iter()
            .find(|tag| tag.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidEnumMember {
                kind: "input tag",
                value: s.to_string(),
            })
    }
}

impl FromStr for OutputTag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        OutputTag::ALL
            .into_iter()
            .find(|tag| tag.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidEnumMember {
                kind: "output tag",
                value: s.to_string(),
            })
    }
}

impl std::fmt::Display for InputTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::fmt::Display for OutputTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Builds the task prompt: preamble, input instruction and output instruction, one per line.
pub fn build_prompt(input: InputTag, output: OutputTag) -> String {
    [EXTRACTION_PREAMBLE, input.instruction(), output.instruction()].join("\n")
}

/// The per-run request template.
///
/// It is built once and shared between jobs; each job derives its own message
/// list from it, so the template itself never changes.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    system_instructions: String,
    task_prompt: String,
    output_tag: OutputTag,
    selector: Option<NodeSelector>,
}

impl ExtractionRequest {
    /// Validates the tags and assembles the request.
    ///
    /// # Errors
    ///
    /// `Error::InvalidEnumMember` if either tag is unknown.
    pub fn assemble(input_tag: &str, output_tag: &str, selector: Option<NodeSelector>) -> Result<Self> {
        let input: InputTag = input_tag.parse()?;
        let output: OutputTag = output_tag.parse()?;
        Ok(Self::new(input, output, selector))
    }

    pub fn new(input: InputTag, output: OutputTag, selector: Option<NodeSelector>) -> Self {
        Self {
            system_instructions: SYSTEM_ROLE.to_string(),
            task_prompt: build_prompt(input, output),
            output_tag: output,
            selector,
        }
    }

    pub fn system_instructions(&self) -> &str {
        &self.system_instructions
    }

    pub fn task_prompt(&self) -> &str {
        &self.task_prompt
    }

    pub fn output_tag(&self) -> OutputTag {
        self.output_tag
    }

    pub fn selector(&self) -> Option<&NodeSelector> {
        self.selector.as_ref()
    }

    /// The conversation for one page: a single user turn holding the task prompt,
    /// a newline, and the page content. The system role travels separately.
    pub fn messages_for(&self, content: &str) -> Vec<ChatMessage> {
        let mut user = String::with_capacity(self.task_prompt.len() + 1 + content.len());
        user.push_str(&self.task_prompt);
        user.push('\n');
        user.push_str(content);
        vec![ChatMessage::user(user)]
    }
}
