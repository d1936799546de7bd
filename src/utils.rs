//! Utility functions for common operations.

use crate::error::TranslationError;

/// Splits text into chunks by lines, respecting a maximum chunk size.
///
/// This function splits text into chunks where each chunk is at most `chunk_size`
/// characters. It prefers to split on line boundaries to maintain context.
///
/// # Arguments
/// * `text` - The text to split
/// * `chunk_size` - Maximum size of each chunk in characters
///
/// # Returns
/// A vector of text chunks, each no larger than `chunk_size` (unless a single line
/// exceeds the limit, in which case that line becomes its own chunk).
pub fn split_text_into_line_chunks(text: &str, chunk_size: usize) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current_chunk: Vec<&str> = Vec::new();
    let mut current_size: usize = 0;

    for line in text.lines() {
        let line_len = line.chars().count();
        let line_size = line_len + if current_chunk.is_empty() { 0 } else { 1 };

        if current_size + line_size > chunk_size && !current_chunk.is_empty() {
            // Push current chunk and start new one
            chunks.push(current_chunk.join("\n"));
            current_chunk = vec![line];
            current_size = line_len;
        } else {
            current_chunk.push(line);
            current_size += line_size;
        }
    }

    // Remember the last chunk
    if !current_chunk.is_empty() {
        chunks.push(current_chunk.join("\n"));
    }

    // Blank-only chunks carry nothing to translate
    chunks.retain(|chunk| !chunk.trim().is_empty());
    chunks
}

/// Checks if an HTTP response is successful, and if not, returns a detailed error.
///
/// This helper extracts both the status code and response body for better error messages.
pub async fn check_response_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, TranslationError> {
    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(TranslationError::ApiError(format!(
            "HTTP {}: {}",
            status, text
        )));
    }
    Ok(response)
}
