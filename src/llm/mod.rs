//! Answer service: Ollama client and the grounding prompt
//!
//! The model only ever sees the assembled browsing context; the prompt pins
//! it to that context so answers stay grounded in actual history data.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnswerError {
    #[error("Answer service unreachable: {0}")]
    Unreachable(String),

    #[error("Answer generation failed: {0}")]
    GenerationError(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("HTTP client construction failed: {0}")]
    ClientBuild(String),
}

/// User-facing message when the model cannot be reached.
pub const CONNECTION_APOLOGY: &str = "Sorry, I'm having trouble connecting to the AI model. \
     Please check if Ollama is running and the model is available.";

/// User-facing message when the index holds no matching data.
pub const NO_DATA_MESSAGE: &str =
    "I don't have enough browsing history data to answer this question.";

/// Provider of LLM answers. Implemented by [`OllamaClient`] and by test
/// doubles.
pub trait AnswerProvider: Send + Sync {
    /// Generate an answer for a fully assembled prompt.
    fn generate(
        &self,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<String, AnswerError>> + Send;

    /// Cheap reachability probe; callers degrade politely when this fails.
    fn health_check(&self) -> impl std::future::Future<Output = bool> + Send;
}

/// Client for a local Ollama server.
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaClient {
    /// Build a client with the configured timeouts. Construction failure is
    /// an error: falling back to a client without timeouts could hang a
    /// request indefinitely.
    pub fn new(
        base_url: &str,
        model: &str,
        temperature: f32,
        timeout_secs: u64,
    ) -> Result<Self, AnswerError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AnswerError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl AnswerProvider for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String, AnswerError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": self.temperature },
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnswerError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AnswerError::GenerationError(format!(
                "Ollama returned HTTP {}",
                response.status()
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AnswerError::MalformedResponse(e.to_string()))?;

        Ok(parsed.response)
    }

    async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::warn!("Ollama health check failed: {}", e);
                false
            }
        }
    }
}

/// Assemble the QA prompt from the formatted browsing context and the
/// user's question.
pub fn build_qa_prompt(context: &str, question: &str) -> String {
    format!(
        "You are an AI assistant analyzing browser history data. You have access to the \
following browsing history context:\n{context}\n\n\
CRITICAL RULES:\n\
1. ONLY use information that is explicitly present in the provided context\n\
2. DO NOT make assumptions or inferences beyond what the data shows\n\
3. If the context is empty or insufficient, say \"{no_data}\"\n\
4. Always cite specific URLs, titles, visit times, and domains from the context when making claims\n\
5. Be precise about what you can and cannot determine from the available data\n\
6. For statistical questions, count and analyze the actual URLs, domains, and visit patterns shown in the data\n\n\
When analyzing browsing patterns:\n\
- Count the frequency of specific URLs and domains using the visit counts\n\
- Identify the most visited sites based on the visit counts provided\n\
- Note visit times and patterns if available\n\
- Use visit counts to determine which sites are visited most frequently\n\n\
For domain-specific questions (like \"How many times did I visit github?\"):\n\
- Look for all URLs that contain the domain name in the URL or title\n\
- Sum up the visit counts for all matching URLs\n\
- Provide the total count and list the specific URLs with their individual visit counts\n\
- If no matching URLs are found, clearly state that no visits to that domain were found\n\n\
Answer the user's question based STRICTLY on the provided browsing history context. \
If you cannot answer the question with the available data, acknowledge this limitation.\n\n\
Question: {question}\n\
Answer:",
        context = context,
        no_data = NO_DATA_MESSAGE,
        question = question,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_contains_context_and_question() {
        let prompt = build_qa_prompt("BROWSING SUMMARY:\nTotal visits: 40", "most visited site?");
        assert!(prompt.contains("Total visits: 40"));
        assert!(prompt.contains("Question: most visited site?"));
        assert!(prompt.contains("CRITICAL RULES"));
        assert!(prompt.ends_with("Answer:"));
    }

    #[test]
    fn test_client_construction_and_url_normalization() {
        let client =
            OllamaClient::new("http://localhost:11434/", "llama3.2:latest", 0.2, 120).unwrap();
        assert_eq!(client.base_url, "http://localhost:11434");
        assert_eq!(client.model(), "llama3.2:latest");
    }
}
