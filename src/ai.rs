use base64::{prelude::BASE64_STANDARD, Engine};
use reqwest::{header::CONTENT_TYPE, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

const RECENT_VIDEO_LIMIT: usize = 10;
const DESCRIPTION_LIMIT: usize = 1_000;
const DEFAULT_IMAGE_MIME: &str = "image/jpeg";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("AI credential is not configured")]
    MissingKey,
    #[error("analysis unavailable: {0}")]
    Unavailable(String),
    #[error("analysis request failed: {0}")]
    Request(String),
}

impl AnalysisError {
    /// Every failure can be re-triggered by the user except missing setup.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AnalysisError::MissingKey)
    }
}

impl From<reqwest::Error> for AnalysisError {
    fn from(err: reqwest::Error) -> Self {
        AnalysisError::Request(err.to_string())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub channel_title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub recent_videos: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub analysis: String,
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

pub fn build_channel_prompt(request: &AnalyzeRequest) -> String {
    let recent: Vec<String> = request
        .recent_videos
        .iter()
        .take(RECENT_VIDEO_LIMIT)
        .map(|title| format!("- {title}"))
        .collect();
    let recent = if recent.is_empty() {
        "- (no recent uploads)".to_string()
    } else {
        recent.join("\n")
    };
    format!(
        "You are a YouTube growth analyst. Analyze the channel below and answer in markdown \
         with sections for content strategy, strengths, weaknesses and three concrete \
         recommendations.\n\nChannel: {}\nDescription: {}\nRecent videos:\n{}",
        request.channel_title.trim(),
        truncate(request.description.trim(), DESCRIPTION_LIMIT),
        recent
    )
}

pub fn build_thumbnail_prompt(title: &str) -> String {
    format!(
        "The attached image is the thumbnail of the YouTube video \"{title}\". Describe its \
         color palette, composition and text placement, then list insights that explain why \
         it attracts clicks. Respond in JSON."
    )
}

pub fn build_success_prompt(title: &str, channel_title: &str, views: u64, subscribers: u64) -> String {
    format!(
        "The video \"{title}\" from channel \"{channel_title}\" reached {views} views with \
         {subscribers} subscribers. Explain why it succeeded, the keyword strategy, what the \
         thumbnail does well, the growth outlook, and list action items. Respond in JSON."
    )
}

/// A fixed JSON shape requested from the model.
pub trait StructuredAnalysis: DeserializeOwned {
    fn schema() -> Value;

    /// Rejects results whose required text is blank.
    fn is_complete(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThumbnailAnalysis {
    pub color: String,
    pub composition: String,
    pub text_placement: String,
    pub insights: Vec<String>,
}

impl StructuredAnalysis for ThumbnailAnalysis {
    fn schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "color": { "type": "STRING" },
                "composition": { "type": "STRING" },
                "textPlacement": { "type": "STRING" },
                "insights": { "type": "ARRAY", "items": { "type": "STRING" } }
            },
            "required": ["color", "composition", "textPlacement", "insights"]
        })
    }

    fn is_complete(&self) -> bool {
        [&self.color, &self.composition, &self.text_placement]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessAnalysis {
    pub success_reason: String,
    pub keyword_strategy: String,
    pub thumbnail_insight: String,
    pub growth: String,
    pub action_items: Vec<String>,
}

impl StructuredAnalysis for SuccessAnalysis {
    fn schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "successReason": { "type": "STRING" },
                "keywordStrategy": { "type": "STRING" },
                "thumbnailInsight": { "type": "STRING" },
                "growth": { "type": "STRING" },
                "actionItems": { "type": "ARRAY", "items": { "type": "STRING" } }
            },
            "required": ["successReason", "keywordStrategy", "thumbnailInsight", "growth", "actionItems"]
        })
    }

    fn is_complete(&self) -> bool {
        [
            &self.success_reason,
            &self.keyword_strategy,
            &self.thumbnail_insight,
            &self.growth,
        ]
        .iter()
        .all(|field| !field.trim().is_empty())
    }
}

/// Parses model output into `T`, tolerating a markdown code fence.
pub fn parse_structured<T: StructuredAnalysis>(text: &str) -> Result<T, AnalysisError> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);
    let parsed: T = serde_json::from_str(body.trim()).map_err(|err| {
        warn!("structured analysis did not match schema: {err}");
        AnalysisError::Unavailable(err.to_string())
    })?;
    if !parsed.is_complete() {
        return Err(AnalysisError::Unavailable("incomplete analysis".into()));
    }
    Ok(parsed)
}

/// An image sent inline next to the prompt text.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    pub fn from_bytes(mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            mime_type: mime_type.to_string(),
            data: BASE64_STANDARD.encode(bytes),
        }
    }

    fn part(&self) -> Value {
        json!({ "inlineData": { "mimeType": self.mime_type, "data": self.data } })
    }
}

/// Downloads an image for inline submission. A missing or non-image content
/// type falls back to JPEG, which is what thumbnails are served as.
pub async fn fetch_image(http: &Client, url: &str) -> Result<InlineImage, AnalysisError> {
    let response = http.get(url).send().await?.error_for_status()?;
    let mime_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .filter(|value| value.starts_with("image/"))
        .unwrap_or(DEFAULT_IMAGE_MIME)
        .to_string();
    let bytes = response.bytes().await?;
    if bytes.is_empty() {
        return Err(AnalysisError::Unavailable(format!("empty image at {url}")));
    }
    Ok(InlineImage::from_bytes(&mime_type, &bytes))
}

/// `generateContent` body: the prompt text, then the image if any.
pub fn request_body(prompt: &str, image: Option<&InlineImage>, generation_config: Option<Value>) -> Value {
    let mut parts = vec![json!({ "text": prompt })];
    if let Some(image) = image {
        parts.push(image.part());
    }
    let mut body = json!({ "contents": [{ "parts": parts }] });
    if let Some(config) = generation_config {
        body["generationConfig"] = config;
    }
    body
}

fn structured_config<T: StructuredAnalysis>() -> Value {
    json!({
        "responseMimeType": "application/json",
        "responseSchema": T::schema(),
    })
}

/// Concatenated text parts of the first candidate.
pub fn candidate_text(body: &Value) -> Option<String> {
    let parts = body
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if text.trim().is_empty() { None } else { Some(text) }
}

#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    base: String,
    model: String,
    key: Option<String>,
}

impl GeminiClient {
    pub fn new(http: Client, base: &str, model: &str, key: Option<String>) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            model: model.to_string(),
            key: key.filter(|key| !key.trim().is_empty()),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.key.is_some()
    }

    async fn generate(&self, body: Value) -> Result<String, AnalysisError> {
        let key = self.key.as_deref().ok_or(AnalysisError::MissingKey)?;
        let url = format!("{}/models/{}:generateContent", self.base, self.model);

        debug!("requesting generation from {}", self.model);
        let response = self
            .http
            .post(url)
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        let payload: Value = response.json().await?;
        if !status.is_success() {
            let message = payload
                .pointer("/error/message")
                .and_then(Value::as_str)
                .unwrap_or("generation failed")
                .to_string();
            return Err(AnalysisError::Request(message));
        }
        candidate_text(&payload).ok_or_else(|| AnalysisError::Unavailable("empty response".into()))
    }

    pub async fn generate_text(&self, prompt: &str) -> Result<String, AnalysisError> {
        self.generate(request_body(prompt, None, None)).await
    }

    pub async fn generate_json<T: StructuredAnalysis>(&self, prompt: &str) -> Result<T, AnalysisError> {
        let text = self
            .generate(request_body(prompt, None, Some(structured_config::<T>())))
            .await?;
        parse_structured(&text)
    }

    /// Structured output about `image`, which the model receives inline.
    pub async fn generate_json_with_image<T: StructuredAnalysis>(
        &self,
        prompt: &str,
        image: &InlineImage,
    ) -> Result<T, AnalysisError> {
        let text = self
            .generate(request_body(prompt, Some(image), Some(structured_config::<T>())))
            .await?;
        parse_structured(&text)
    }
}

/// Caller side of `POST /api/analyze`.
pub struct AnalyzeClient {
    http: Client,
    endpoint: Url,
}

impl AnalyzeClient {
    pub fn new(http: Client, base: &str) -> Result<Self, url::ParseError> {
        let endpoint = Url::parse(base)?.join("/api/analyze")?;
        Ok(Self { http, endpoint })
    }

    pub async fn analyze(&self, request: &AnalyzeRequest) -> Result<String, AnalysisError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;
        let status = response.status();
        let payload: Value = response
            .json()
            .await
            .map_err(|err| AnalysisError::Unavailable(err.to_string()))?;
        if !status.is_success() {
            let message = payload
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("analysis failed")
                .to_string();
            return Err(AnalysisError::Request(message));
        }
        serde_json::from_value::<AnalyzeResponse>(payload)
            .map(|body| body.analysis)
            .map_err(|err| AnalysisError::Unavailable(err.to_string()))
    }
}

/// Lifecycle of one analysis section on a page.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisState<T> {
    Idle,
    Pending,
    Ready(T),
    Failed { message: String, retryable: bool },
}

impl<T> AnalysisState<T> {
    pub fn from_result(result: Result<T, AnalysisError>) -> Self {
        match result {
            Ok(value) => AnalysisState::Ready(value),
            Err(err) => AnalysisState::Failed {
                retryable: err.is_retryable(),
                message: err.to_string(),
            },
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, AnalysisState::Pending)
    }

    pub fn can_retry(&self) -> bool {
        matches!(self, AnalysisState::Failed { retryable: true, .. })
    }
}
