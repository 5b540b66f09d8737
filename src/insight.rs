use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::error::InsightError;
use crate::event::Event;

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const FALLBACK_ADVICE: &str = "Quantum nodes detect a 400% efficiency spike. Hold assets.";
const FALLBACK_VOLATILITY: u8 = 88;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    Neutral,
}

impl Trend {
    pub fn label(self) -> &'static str {
        match self {
            Trend::Bullish => "BULLISH",
            Trend::Bearish => "BEARISH",
            Trend::Neutral => "NEUTRAL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketInsight {
    pub trend: Trend,
    pub advice: String,
    pub volatility_index: u8,
}

impl MarketInsight {
    pub fn fallback() -> Self {
        Self {
            trend: Trend::Bullish,
            advice: FALLBACK_ADVICE.to_string(),
            volatility_index: FALLBACK_VOLATILITY,
        }
    }
}

/// Source of market commentary. Implementations never fail; provider
/// trouble degrades to [`MarketInsight::fallback`].
pub trait InsightProvider: Send + Sync {
    fn market_analysis(&self, hash_rate: u64) -> MarketInsight;
}

/// Used when no API key is available.
#[derive(Debug, Default)]
pub struct OfflineProvider;

impl InsightProvider for OfflineProvider {
    fn market_analysis(&self, _hash_rate: u64) -> MarketInsight {
        warn!("insight API key missing, using simulation mode");
        MarketInsight::fallback()
    }
}

pub struct GeminiProvider {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            model,
            endpoint: GEMINI_ENDPOINT.to_string(),
        }
    }

    fn fetch(&self, hash_rate: u64) -> Result<MarketInsight, InsightError> {
        if self.api_key.is_empty() {
            return Err(InsightError::MissingApiKey);
        }
        let url = format!("{}/{}:generateContent", self.endpoint, self.model);
        let body = json!({
            "contents": [{ "parts": [{ "text": build_prompt(hash_rate) }] }]
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .map_err(|e| e.without_url())?;

        let status = response.status();
        let text = response.text().map_err(|e| e.without_url())?;
        debug!(status = status.as_u16(), "insight provider responded");
        if status != StatusCode::OK {
            return Err(InsightError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let generated = extract_text(&text)?;
        parse_insight(&generated)
    }
}

impl InsightProvider for GeminiProvider {
    fn market_analysis(&self, hash_rate: u64) -> MarketInsight {
        match self.fetch(hash_rate) {
            Ok(insight) => insight,
            Err(err) => {
                error!("market analysis failed: {}", err);
                MarketInsight::fallback()
            }
        }
    }
}

fn build_prompt(hash_rate: u64) -> String {
    format!(
        "Generate a short, futuristic cryptocurrency market analysis based on a simulated hash rate of {} TH/s.\n\
         Return ONLY a JSON object with this schema (do not use markdown code blocks):\n\
         {{\n  \"trend\": \"bullish\" | \"bearish\" | \"neutral\",\n  \
         \"advice\": \"string (max 15 words, sound technically advanced)\",\n  \
         \"volatilityIndex\": number (0-100)\n}}",
        hash_rate
    )
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

fn extract_text(body: &str) -> Result<String, InsightError> {
    let response: GenerateResponse = serde_json::from_str(body)?;
    response
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .find_map(|part| part.text)
        .filter(|text| !text.trim().is_empty())
        .ok_or(InsightError::EmptyResponse)
}

/// Models sometimes wrap the payload in markdown fences despite being told not to.
pub fn strip_fences(text: &str) -> String {
    text.replace("```json", "").replace("```", "").trim().to_string()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InsightPayload {
    trend: Trend,
    advice: String,
    volatility_index: i64,
}

pub fn parse_insight(text: &str) -> Result<MarketInsight, InsightError> {
    let payload: InsightPayload = serde_json::from_str(&strip_fences(text))?;
    let volatility_index = u8::try_from(payload.volatility_index)
        .ok()
        .filter(|v| *v <= 100)
        .ok_or(InsightError::VolatilityOutOfRange(payload.volatility_index))?;
    Ok(MarketInsight {
        trend: payload.trend,
        advice: payload.advice,
        volatility_index,
    })
}

/// Runs provider calls off the UI thread and posts results back as events.
#[derive(Clone)]
pub struct InsightDispatcher {
    provider: Arc<dyn InsightProvider>,
    events: Sender<Event>,
}

impl InsightDispatcher {
    pub fn new(provider: Arc<dyn InsightProvider>, events: Sender<Event>) -> Self {
        Self { provider, events }
    }

    pub fn request(&self, hash_rate: u64) {
        info!(hash_rate, "requesting market insight");
        let provider = Arc::clone(&self.provider);
        let events = self.events.clone();
        thread::spawn(move || {
            let insight = panic::catch_unwind(AssertUnwindSafe(|| {
                provider.market_analysis(hash_rate)
            }))
            .unwrap_or_else(|_| {
                error!("insight provider panicked");
                MarketInsight::fallback()
            });
            if events.send(Event::Insight(insight)).is_err() {
                debug!("event loop closed before insight arrived");
            }
        });
    }
}
