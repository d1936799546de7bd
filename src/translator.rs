//! Translation system using OpenAI-compatible APIs.
//!
//! [`OpenAiChat`] streams chat completions from the API; [`Translator`]
//! walks the chunks of a sub-chapter, keeps a short message history for
//! context and validates every response.

use crate::config::{ApiConfig, PromptsConfig, TranslationConfig};
use crate::console::Console;
use crate::error::TranslationError;
use crate::novel::{Novel, SubChapter};
use crate::utils::check_response_status;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Refusal phrases that indicate the model declined to translate.
const REFUSAL_PHRASES: &[&str] = &[
    "i'm sorry",
    "i cannot",
    "i am unable",
    "as an ai",
    "my apologies",
    "i am not programmed",
    "i do not have the ability",
];

/// Position of the chunk being translated, for progress display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressInfo {
    /// Chapter number (1-based).
    pub chapter: u32,
    /// Sub-chapter number (1-based).
    pub sub_chapter: u32,
    /// Chunk number (1-based).
    pub chunk: usize,
    /// Total number of chunks in the sub-chapter.
    pub total_chunks: usize,
}

/// A message in the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role: "system", "user", or "assistant".
    pub role: String,
    /// Content of the message.
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Request body for the chat completions API.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
}

/// Delta content in a streaming response.
#[derive(Debug, Deserialize)]
struct Delta {
    content: Option<String>,
}

/// A single choice in a streaming chunk.
#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Option<Delta>,
}

/// Streaming chunk from the API.
#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

/// One chat-completions call.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Sends `messages` and returns the raw assistant reply.
    async fn complete(
        &self,
        messages: &[Message],
        progress: Option<ProgressInfo>,
    ) -> Result<String, TranslationError>;
}

/// Streaming chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiChat {
    /// HTTP client for API requests.
    client: Client,
    /// Credentials, endpoint and model.
    api_config: ApiConfig,
    /// Console for progress output.
    console: Console,
}

impl OpenAiChat {
    pub fn new(api_config: ApiConfig, console: Console) -> Self {
        Self {
            client: Client::new(),
            api_config,
            console,
        }
    }

    /// Display progress during streaming.
    fn display_progress(
        &self,
        response: &str,
        elapsed: Duration,
        progress_info: Option<ProgressInfo>,
    ) {
        let char_count = response.chars().count();
        let speed = if elapsed.as_secs_f64() > 0.0 {
            char_count as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        // Get preview (last 50 chars, newlines replaced with spaces)
        let preview: String = response
            .chars()
            .rev()
            .take(50)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect();

        let prefix = progress_info
            .map(|info| {
                format!(
                    "{} ",
                    self.console.chunk_info(
                        info.chapter,
                        info.sub_chapter,
                        info.chunk,
                        info.total_chunks
                    )
                )
            })
            .unwrap_or_default();

        self.console.progress_update(&format!(
            "{}Progress: {} chars at {}. {}",
            prefix,
            self.console.count(char_count),
            self.console.speed(speed),
            self.console.muted(&format!("{}...", preview))
        ));
    }
}

/// Pulls the content deltas out of complete SSE lines in `buffer`.
///
/// Consumed lines are removed; a trailing partial line stays for the next
/// network chunk. Lines are decoded only once complete, so a character split
/// across chunks survives. Returns true once the `[DONE]` marker is seen.
fn drain_sse_lines(buffer: &mut Vec<u8>, output: &mut String) -> bool {
    while let Some(newline) = buffer.iter().position(|&b| b == b'\n') {
        let raw: Vec<u8> = buffer.drain(..=newline).collect();
        let line = String::from_utf8_lossy(&raw);
        let Some(data) = line.trim().strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();

        if data == "[DONE]" {
            return true;
        }

        if let Ok(chunk) = serde_json::from_str::<StreamChunk>(data) {
            for choice in chunk.choices {
                if let Some(content) = choice.delta.and_then(|d| d.content) {
                    output.push_str(&content);
                }
            }
        }
    }

    false
}

#[async_trait]
impl ChatBackend for OpenAiChat {
    async fn complete(
        &self,
        messages: &[Message],
        progress: Option<ProgressInfo>,
    ) -> Result<String, TranslationError> {
        let request = ChatRequest {
            model: &self.api_config.model,
            messages,
            stream: true,
        };

        // Make streaming request
        let url = format!(
            "{}/chat/completions",
            self.api_config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_config.api_key)
            .json(&request)
            .send()
            .await?;
        let response = check_response_status(response).await?;

        // Stream and accumulate response
        let mut full_response = String::new();
        let mut buffer: Vec<u8> = Vec::new();
        let start_time = Instant::now();
        let mut last_update = Instant::now();
        let mut stream = response.bytes_stream();

        while let Some(bytes) = stream.next().await {
            buffer.extend_from_slice(&bytes?);
            let done = drain_sse_lines(&mut buffer, &mut full_response);

            // Update progress display every second
            if self.console.is_verbose() && last_update.elapsed() >= Duration::from_secs(1) {
                self.display_progress(&full_response, start_time.elapsed(), progress);
                last_update = Instant::now();
            }

            if done {
                break;
            }
        }

        // Flush a final line that arrived without a trailing newline
        buffer.push(b'\n');
        drain_sse_lines(&mut buffer, &mut full_response);

        if self.console.is_verbose() {
            self.console.clear_line();
        }

        Ok(full_response)
    }
}

/// Translator for converting Japanese text to English.
pub struct Translator {
    /// Chat-completions backend.
    backend: Box<dyn ChatBackend>,
    /// Translation behavior configuration.
    config: TranslationConfig,
    /// System prompt for title translation.
    title_prompt: String,
    /// System prompt for content translation.
    content_prompt: String,
    /// Console for output.
    console: Console,
}

impl Translator {
    /// Create a new Translator.
    pub fn new(
        backend: Box<dyn ChatBackend>,
        config: TranslationConfig,
        prompts: &PromptsConfig,
        console: Console,
    ) -> Self {
        Self {
            backend,
            config,
            title_prompt: prompts.title_translation.clone(),
            content_prompt: prompts.content_translation.clone(),
            console,
        }
    }

    /// Translates a title with the title prompt and no history.
    pub async fn translate_title(&self, text: &str) -> Result<String, TranslationError> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        let messages = [Message::system(&self.title_prompt), Message::user(text)];
        self.request(&messages, None).await
    }

    /// Translates the novel title unless it already has one.
    pub async fn translate_novel_title(
        &self,
        novel: &mut Novel,
        force: bool,
    ) -> Result<(), TranslationError> {
        if novel.translated_title.is_none() || force {
            self.console
                .detail(&format!("Translating title 「{}」", novel.title));
            novel.translated_title = Some(self.translate_title(&novel.title).await?);
        }
        Ok(())
    }

    /// Translates every untranslated chunk of a sub-chapter, in order.
    ///
    /// With `force`, chunks that already carry a translation are sent again.
    /// Chunks kept from an earlier run still feed the history. Returns the
    /// number of chunks sent to the model.
    pub async fn translate_sub_chapter(
        &self,
        sub_chapter: &mut SubChapter,
        chapter_number: u32,
        sub_chapter_number: u32,
        force: bool,
    ) -> Result<usize, TranslationError> {
        if !force && sub_chapter.translated_name.is_some() && sub_chapter.is_translated() {
            self.console.detail(&format!(
                "Chapter {}, subchapter {} already translated",
                chapter_number, sub_chapter_number
            ));
            return Ok(0);
        }

        if sub_chapter.translated_name.is_none() || force {
            sub_chapter.translated_name = Some(self.translate_title(&sub_chapter.name).await?);
        }

        let total_chunks = sub_chapter.chunks.len();
        let mut history: VecDeque<(String, String)> = VecDeque::new();
        let mut translated = 0;

        for (i, chunk) in sub_chapter.chunks.iter_mut().enumerate() {
            let needs_translation = chunk.translation.is_none() || force;

            if needs_translation {
                let progress = ProgressInfo {
                    chapter: chapter_number,
                    sub_chapter: sub_chapter_number,
                    chunk: i + 1,
                    total_chunks,
                };
                self.console.detail(&format!(
                    "Chunk {}/{} of chapter {}, subchapter {}",
                    i + 1,
                    total_chunks,
                    chapter_number,
                    sub_chapter_number
                ));

                let text = if chunk.context.trim().is_empty() {
                    String::new()
                } else {
                    let messages = self.build_messages(&history, &chunk.context);
                    translated += 1;
                    self.request(&messages, Some(progress)).await?
                };
                chunk.translation = Some(text);
            }

            if let Some(translation) = &chunk.translation {
                history.push_back((chunk.context.clone(), translation.clone()));
                while history.len() > self.config.history_length {
                    history.pop_front();
                }
            }
        }

        Ok(translated)
    }

    /// System prompt, retained pairs, then the new chunk.
    fn build_messages(&self, history: &VecDeque<(String, String)>, chunk: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(2 + history.len() * 2);
        messages.push(Message::system(&self.content_prompt));
        for (original, translation) in history {
            messages.push(Message::user(original));
            messages.push(Message::assistant(translation));
        }
        messages.push(Message::user(chunk));
        messages
    }

    /// Sends one request, validates the reply and waits out the request delay.
    async fn request(
        &self,
        messages: &[Message],
        progress: Option<ProgressInfo>,
    ) -> Result<String, TranslationError> {
        let raw = self.backend.complete(messages, progress).await?;
        let reply = validate_response(&raw)?;

        if self.config.delay_between_requests_sec > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(
                self.config.delay_between_requests_sec,
            ))
            .await;
        }

        Ok(reply)
    }
}

/// Trims a reply and rejects empty responses and refusals.
fn validate_response(raw: &str) -> Result<String, TranslationError> {
    let trimmed = raw.trim();

    if trimmed.is_empty() {
        return Err(TranslationError::Refused("Empty response".to_string()));
    }

    let lower = trimmed.to_lowercase();
    if let Some(phrase) = REFUSAL_PHRASES.iter().find(|p| lower.starts_with(*p)) {
        return Err(TranslationError::Refused(format!(
            "Response starts with refusal phrase: {}",
            phrase
        )));
    }

    Ok(trimmed.to_string())
}
