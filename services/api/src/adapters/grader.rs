//! services/api/src/adapters/grader.rs
//!
//! This module contains the adapter for the homework grading model.
//! It implements the `HomeworkGrader` port from the `core` crate.

const GRADING_PROMPT: &str = r#"Analyze this student's homework submission.
1. Check for accuracy and completeness of the answers.
2. Provide specific, constructive suggestions on how the student can improve their work.
3. If the work is excellent, provide positive reinforcement.
4. If there are errors, explain the underlying concept briefly.

Return your analysis strictly as JSON with exactly these three fields:
- "status": either "Approved" or "Rejected". Use "Approved" only if the work is mostly correct and complete. Otherwise, use "Rejected" to encourage a re-submission after following your suggestions.
- "score": a quality score from 1 to 10.
- "feedback": detailed feedback and specific suggestions for improvement."#;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrlArgs, ResponseFormat,
    },
    Client,
};
use async_trait::async_trait;
use tracing::warn;

use drona_core::domain::Verdict;
use drona_core::ports::{HomeworkGrader, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `HomeworkGrader` using an OpenAI-compatible
/// multimodal model. Every failure along the way resolves to the fixed
/// fallback verdict; `analyze` cannot fail.
#[derive(Clone)]
pub struct OpenAiGraderAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiGraderAdapter {
    /// Creates a new `OpenAiGraderAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Uploads arrive as data URIs; a bare base64 payload gets the jpeg prefix.
    fn as_data_uri(image: &str) -> String {
        if image.starts_with("data:") {
            image.to_string()
        } else {
            format!("data:image/jpeg;base64,{}", image)
        }
    }

    /// Parses the model's reply, tolerating a markdown code fence around the JSON.
    fn parse_verdict(raw: &str) -> PortResult<Verdict> {
        let trimmed = raw.trim();
        let body = match trimmed.strip_prefix("```") {
            Some(rest) => rest
                .strip_prefix("json")
                .unwrap_or(rest)
                .trim_start()
                .trim_end_matches('`')
                .trim(),
            None => trimmed,
        };
        serde_json::from_str(body)
            .map_err(|e| PortError::Unexpected(format!("unparseable grading verdict: {}", e)))
    }

    async fn request_verdict(&self, image: &str) -> PortResult<Verdict> {
        let image_part = ChatCompletionRequestMessageContentPartImageArgs::default()
            .image_url(
                ImageUrlArgs::default()
                    .url(Self::as_data_uri(image))
                    .detail(ImageDetail::Auto)
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            )
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let prompt_part = ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(GRADING_PROMPT)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages([ChatCompletionRequestUserMessageArgs::default()
                .content(vec![image_part.into(), prompt_part.into()])
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into()])
            .response_format(ResponseFormat::JsonObject)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Grading model response contained no text content.".to_string())
            })?;

        Self::parse_verdict(&content)
    }
}

//=========================================================================================
// `HomeworkGrader` Trait Implementation
//=========================================================================================

#[async_trait]
impl HomeworkGrader for OpenAiGraderAdapter {
    /// Judges a homework photo. Any failure (network, malformed model output,
    /// parse error) resolves to the fixed fallback rejection.
    async fn analyze(&self, image: &str) -> Verdict {
        match self.request_verdict(image).await {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("Homework analysis failed, returning fallback verdict: {}", e);
                Verdict::fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drona_core::domain::VerdictStatus;

    #[test]
    fn parses_a_plain_json_verdict() {
        let verdict = OpenAiGraderAdapter::parse_verdict(
            r#"{"status": "Approved", "score": 9, "feedback": "Great work"}"#,
        )
        .unwrap();
        assert_eq!(verdict.status, VerdictStatus::Approved);
        assert_eq!(verdict.score, 9.0);
        assert_eq!(verdict.feedback, "Great work");
    }

    #[test]
    fn parses_a_fenced_json_verdict() {
        let raw = "```json\n{\"status\": \"Rejected\", \"score\": 3, \"feedback\": \"Redo question 2.\"}\n```";
        let verdict = OpenAiGraderAdapter::parse_verdict(raw).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Rejected);
        assert_eq!(verdict.score, 3.0);
    }

    #[test]
    fn malformed_replies_are_errors() {
        assert!(OpenAiGraderAdapter::parse_verdict("the dog ate it").is_err());
        assert!(OpenAiGraderAdapter::parse_verdict(r#"{"status": "Maybe"}"#).is_err());
    }

    #[test]
    fn bare_base64_payloads_get_a_jpeg_prefix() {
        assert_eq!(
            OpenAiGraderAdapter::as_data_uri("AAAA"),
            "data:image/jpeg;base64,AAAA"
        );
        assert_eq!(
            OpenAiGraderAdapter::as_data_uri("data:image/png;base64,BBBB"),
            "data:image/png;base64,BBBB"
        );
    }
}
