// Extraction client
//
// One outbound call per image against the Gemini generateContent endpoint.
// The instruction prompt pins the output to an enumerated JSON schema so
// the normalizer can be schema-driven instead of free-text heuristic. The
// model is under no obligation to honor it exactly — that leniency lives
// in the normalizer, not here.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::AppConfig;
use crate::error::TrackerError;
use crate::intake::RawImage;

/// Fixed instruction sent with every image. The field names here are the
/// contract the normalizer parses against.
pub const EXTRACTION_PROMPT: &str = r#"Analyze this bill/receipt image and extract all the items with their details.

Please return the data in the following JSON format:
{
    "items": [
        {
            "item": "item name",
            "quantity": "quantity with unit (e.g., 1 kg, 2 pieces, 500ml)",
            "amount": 150.00,
            "category": "category (e.g., Groceries, Snacks, Beverages, etc.)"
        }
    ],
    "total_amount": 450.00,
    "date": "YYYY-MM-DD",
    "store_name": "store name if visible"
}

Rules:
1. Extract each line item separately
2. For quantity, include the unit (kg, grams, pieces, liters, etc.)
3. For amount, use only the numeric value (no currency symbols)
4. For category, choose from: Groceries, Snacks, Beverages, Personal Care, Household, Medicine, or Other
5. If date is not clear, use today's date
6. If quantity is not specified, use "1 piece"
7. Return only valid JSON, no additional text"#;

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Anything that can turn a bill image into raw extraction text. The
/// pipeline depends on this seam, not on the network.
#[async_trait]
pub trait BillExtractor: Send + Sync {
    async fn extract(&self, image: &RawImage) -> Result<String, TrackerError>;
}

// ============================================================================
// GEMINI WIRE TYPES
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum Part {
    Text(String),
    InlineData(InlineData),
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

// ============================================================================
// GEMINI CLIENT
// ============================================================================

pub struct GeminiExtractor {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiExtractor {
    pub fn new(config: &AppConfig) -> Result<Self, TrackerError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| TrackerError::extraction(format!("failed to build HTTP client: {e}")))?;
        Ok(GeminiExtractor {
            client,
            api_key: config.google_api_key.clone(),
            model: config.gemini_model.clone(),
        })
    }

    fn request_body(image: &RawImage) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text(EXTRACTION_PROMPT.to_string()),
                    Part::InlineData(InlineData {
                        mime_type: image.media_type.as_mime().to_string(),
                        data: BASE64.encode(&image.bytes),
                    }),
                ],
            }],
        }
    }

    /// Pull the first text part out of a response, or explain why there
    /// isn't one (safety block, empty candidates).
    fn response_text(response: GenerateContentResponse) -> Result<String, TrackerError> {
        if let Some(feedback) = &response.prompt_feedback {
            if let Some(reason) = &feedback.block_reason {
                return Err(TrackerError::extraction(format!(
                    "model refused the request: {reason}"
                )));
            }
        }
        response
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .ok_or_else(|| TrackerError::extraction("model returned no text candidate"))
    }
}

#[async_trait]
impl BillExtractor for GeminiExtractor {
    #[instrument(skip(self, image), fields(image = %image.label))]
    async fn extract(&self, image: &RawImage) -> Result<String, TrackerError> {
        let url = format!("{GEMINI_ENDPOINT}/{}:generateContent", self.model);
        let body = Self::request_body(image);

        debug!(bytes = image.bytes.len(), "sending image for extraction");
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TrackerError::extraction("request timed out")
                } else {
                    TrackerError::extraction(format!("network error: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let snippet: String = detail.chars().take(200).collect();
            return Err(TrackerError::extraction(format!(
                "API returned {status}: {snippet}"
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| TrackerError::extraction(format!("unreadable API response: {e}")))?;
        Self::response_text(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::RawImage;

    fn jpeg_image() -> RawImage {
        RawImage::from_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0, 1, 2, 3], "bill.jpg").unwrap()
    }

    #[test]
    fn test_prompt_names_every_schema_field() {
        for field in ["item", "quantity", "amount", "category", "date"] {
            assert!(EXTRACTION_PROMPT.contains(field), "prompt missing '{field}'");
        }
        // The prompt must enumerate the closed category set.
        for label in ["Groceries", "Snacks", "Beverages", "Personal Care", "Household", "Medicine", "Other"] {
            assert!(EXTRACTION_PROMPT.contains(label), "prompt missing '{label}'");
        }
    }

    #[test]
    fn test_request_body_carries_prompt_and_image() {
        let body = GeminiExtractor::request_body(&jpeg_image());
        let json = serde_json::to_value(&body).unwrap();

        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], EXTRACTION_PROMPT);
        assert_eq!(parts[1]["inline_data"]["mime_type"], "image/jpeg");
        assert_eq!(
            parts[1]["inline_data"]["data"],
            BASE64.encode([0xFFu8, 0xD8, 0xFF, 0xE0, 1, 2, 3])
        );
    }

    #[test]
    fn test_response_text_takes_first_text_part() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [
                { "content": { "parts": [ { "text": "{\"items\": []}" } ] } }
            ]
        }))
        .unwrap();
        assert_eq!(
            GeminiExtractor::response_text(response).unwrap(),
            "{\"items\": []}"
        );
    }

    #[test]
    fn test_blocked_prompt_is_a_refusal() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [],
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();
        let err = GeminiExtractor::response_text(response).unwrap_err();
        assert!(matches!(err, TrackerError::ExtractionFailure { .. }));
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_empty_candidates_is_a_failure() {
        let response: GenerateContentResponse =
            serde_json::from_value(serde_json::json!({ "candidates": [] })).unwrap();
        assert!(GeminiExtractor::response_text(response).is_err());
    }
}
