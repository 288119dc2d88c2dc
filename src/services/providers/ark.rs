use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use super::{IdentificationProvider, ProviderError};
use crate::models::item::{ItemDescription, UNKNOWN};

const IDENTIFY_PROMPT: &str = concat!(
    "Based on this image, identify the main item for resale. ",
    "Return ONLY valid JSON with these exact field names: ",
    "name (the item), series (product line or category), ",
    "year (year of production), condition (e.g. Excellent, Good, Fair, Poor)."
);

/// Client for a vision model behind an OpenAI-style chat completions API.
pub struct ArkVisionClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Deserialize)]
struct RawItem {
    #[serde(default)]
    name: Value,
    #[serde(default)]
    series: Value,
    #[serde(default)]
    year: Value,
    #[serde(default)]
    condition: Value,
}

impl ArkVisionClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

/// Encode image bytes as a data URL, sniffing the MIME type.
pub fn image_data_url(image: &[u8]) -> String {
    let mime = image::guess_format(image)
        .map(|format| format.to_mime_type())
        .unwrap_or("image/jpeg");
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(image)
    )
}

/// Parse the model's reply, tolerating a surrounding Markdown code fence.
pub fn parse_item_reply(reply: &str) -> Result<ItemDescription, ProviderError> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => return Err(ProviderError::Parse(format!("no JSON object in reply: {}", reply))),
    };

    let raw: RawItem =
        serde_json::from_str(json).map_err(|e| ProviderError::Parse(e.to_string()))?;

    let name = field_text(&raw.name);
    if name == UNKNOWN {
        return Err(ProviderError::Parse("reply is missing the item name".to_string()));
    }

    Ok(ItemDescription {
        name,
        series: field_text(&raw.series),
        year: field_text(&raw.year),
        condition: field_text(&raw.condition),
    })
}

fn field_text(value: &Value) -> String {
    match value {
        Value::String(s) if !s.trim().is_empty() => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

#[async_trait]
impl IdentificationProvider for ArkVisionClient {
    async fn identify(&self, image: &[u8]) -> Result<ItemDescription, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let request_body = serde_json::json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "image_url", "image_url": { "url": image_data_url(image) } },
                    { "type": "text", "text": IDENTIFY_PROMPT }
                ]
            }]
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(super::status_error(response).await);
        }

        let chat: ChatResponse = response.json().await?;
        let reply = chat
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::Parse("response has no choices".to_string()))?;

        let item = parse_item_reply(&reply)?;
        tracing::debug!(name = %item.name, series = %item.series, "Item identified");
        Ok(item)
    }
}
