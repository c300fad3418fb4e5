//! LLM mood client: provider abstraction + file cache + daily limit.

use std::fs;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::MoodSignal;
use crate::config::ai::{AiConfig, AZURE_API_VERSION};
use crate::store::write_atomic;

pub const DEFAULT_MOOD_CACHE_DIR: &str = "cache/mood";

const SYSTEM_PROMPT: &str = "You are a JSON-only assistant. Extract mood and tone from text. ONLY return valid JSON, no markdown, no explanation.";

/// Trait object used by the hybrid extractor.
pub trait MoodClient: Send + Sync {
    /// `None` means "no answer"; the caller falls back to rules.
    fn extract<'a>(
        &'a self,
        input: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<MoodSignal>> + Send + 'a>>;
    fn provider_name(&self) -> &'static str;
}

pub type DynMoodClient = Arc<dyn MoodClient>;

/// Factory: build a client according to config and environment variables.
///
/// * `AI_TEST_MODE=mock` ⇒ deterministic mock wrapped in the cache.
/// * disabled config ⇒ `DisabledClient`.
/// * otherwise the OpenAI / Azure provider wrapped with caching + daily limit.
pub fn build_client_from_config(config: &AiConfig, cache_dir: &Path) -> DynMoodClient {
    if std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false)
    {
        let mock = MockProvider {
            fixed: MoodSignal::new("energetic", "intense"),
        };
        return Arc::new(CachingClient::new(mock, cache_dir.to_path_buf(), config.daily_limit));
    }

    if !config.enabled {
        return Arc::new(DisabledClient);
    }

    match ChatProvider::from_config(config) {
        Ok(provider) => Arc::new(CachingClient::new(
            provider,
            cache_dir.to_path_buf(),
            config.daily_limit,
        )),
        Err(e) => {
            tracing::warn!(target: "mood", error = %e, "llm provider unavailable, using rules");
            Arc::new(DisabledClient)
        }
    }
}

// ------------------------------------------------------------
// Provider abstraction + concrete providers
// ------------------------------------------------------------

/// Low-level provider: does the real remote call.
pub trait Provider: Send + Sync + 'static {
    fn fetch<'a>(
        &'a self,
        input: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<MoodSignal>> + Send + 'a>>;
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone)]
enum Flavor {
    OpenAi,
    Azure { endpoint: String },
}

/// Chat Completions provider for OpenAI and Azure OpenAI.
pub struct ChatProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    flavor: Flavor,
}

impl ChatProvider {
    pub fn from_config(cfg: &AiConfig) -> anyhow::Result<Self> {
        if cfg.api_key.trim().is_empty() {
            anyhow::bail!("empty api key");
        }
        let flavor = match cfg.provider.as_str() {
            "openai" => Flavor::OpenAi,
            "azure" => Flavor::Azure {
                endpoint: cfg
                    .endpoint
                    .clone()
                    .unwrap_or_default()
                    .trim_end_matches('/')
                    .to_string(),
            },
            other => anyhow::bail!("unsupported provider `{other}`"),
        };
        let http = reqwest::Client::builder()
            .user_agent("mood-recommender/0.1")
            .connect_timeout(Duration::from_secs(3))
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            flavor,
        })
    }

    fn request(&self) -> reqwest::RequestBuilder {
        match &self.flavor {
            Flavor::OpenAi => self
                .http
                .post("https://api.openai.com/v1/chat/completions")
                .bearer_auth(&self.api_key),
            Flavor::Azure { endpoint } => self
                .http
                .post(format!(
                    "{endpoint}/openai/deployments/{}/chat/completions?api-version={AZURE_API_VERSION}",
                    self.model
                ))
                .header("api-key", &self.api_key),
        }
    }
}

impl Provider for ChatProvider {
    fn fetch<'a>(
        &'a self,
        input: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<MoodSignal>> + Send + 'a>> {
        Box::pin(async move {
            #[derive(Serialize)]
            struct Msg<'a> {
                role: &'a str,
                content: &'a str,
            }
            #[derive(Serialize)]
            struct Req<'a> {
                model: &'a str,
                messages: Vec<Msg<'a>>,
                temperature: f32,
                max_tokens: u32,
            }
            #[derive(Deserialize)]
            struct Resp {
                choices: Vec<Choice>,
            }
            #[derive(Deserialize)]
            struct Choice {
                message: ChoiceMsg,
            }
            #[derive(Deserialize)]
            struct ChoiceMsg {
                content: Option<String>,
            }

            let user = format!(
                "Extract mood (happy/sad/calm/energetic/neutral) and tone (light/intense/neutral) from: '{input}'. Return ONLY this exact JSON format: {{\"mood\": \"value\", \"tone\": \"value\"}}"
            );
            let req = Req {
                model: &self.model,
                messages: vec![
                    Msg {
                        role: "system",
                        content: SYSTEM_PROMPT,
                    },
                    Msg {
                        role: "user",
                        content: &user,
                    },
                ],
                temperature: 0.3,
                max_tokens: 50,
            };

            let resp = self.request().json(&req).send().await.ok()?;
            if !resp.status().is_success() {
                tracing::warn!(target: "mood", status = %resp.status(), provider = self.name(), "llm call failed");
                return None;
            }
            let body: Resp = resp.json().await.ok()?;
            let content = body.choices.first()?.message.content.as_deref()?;
            parse_mood_json(content)
        })
    }

    fn name(&self) -> &'static str {
        match self.flavor {
            Flavor::OpenAi => "openai",
            Flavor::Azure { .. } => "azure_openai",
        }
    }
}

/// Always `None`; used when the LLM is disabled.
pub struct DisabledClient;

impl MoodClient for DisabledClient {
    fn extract<'a>(
        &'a self,
        _input: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<MoodSignal>> + Send + 'a>> {
        Box::pin(async { None })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

#[derive(Clone)]
pub struct MockProvider {
    pub fixed: MoodSignal,
}

impl Provider for MockProvider {
    fn fetch<'a>(
        &'a self,
        _input: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<MoodSignal>> + Send + 'a>> {
        let out = self.fixed.clone();
        Box::pin(async move { Some(out) })
    }
    fn name(&self) -> &'static str {
        "mock"
    }
}

// ------------------------------------------------------------
// Caching client wrapper (file cache + daily limit)
// ------------------------------------------------------------

pub struct CachingClient<P: Provider> {
    inner: P,
    cache_dir: PathBuf,
    daily_limit_max: u32,
    counter: Arc<Mutex<DailyCounter>>,
}

impl<P: Provider> CachingClient<P> {
    pub fn new(inner: P, cache_dir: PathBuf, daily_limit_max: u32) -> Self {
        let _ = fs::create_dir_all(&cache_dir);
        let counter = Arc::new(Mutex::new(
            load_daily_counter(&cache_dir).unwrap_or_default(),
        ));
        Self {
            inner,
            cache_dir,
            daily_limit_max,
            counter,
        }
    }

    async fn extract_impl(&self, input: &str) -> Option<MoodSignal> {
        // cache hits do not count against the daily limit
        let key = cache_key(input);
        if let Some(hit) = read_cache_file(&self.cache_dir, &key) {
            return Some(hit);
        }

        {
            let mut g = self.counter.lock().ok()?;
            if g.is_expired() {
                g.reset_to_today();
                let _ = save_daily_counter(&self.cache_dir, &g);
            }
            if g.count >= self.daily_limit_max {
                tracing::debug!(target: "mood", limit = self.daily_limit_max, "daily llm limit reached");
                return None;
            }
        }

        let fresh = self.inner.fetch(input).await?.normalized();
        let _ = write_cache_file(&self.cache_dir, &key, &fresh);
        if let Ok(mut g) = self.counter.lock() {
            g.count = g.count.saturating_add(1);
            let _ = save_daily_counter(&self.cache_dir, &g);
        }
        Some(fresh)
    }
}

impl<P: Provider> MoodClient for CachingClient<P> {
    fn extract<'a>(
        &'a self,
        input: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<MoodSignal>> + Send + 'a>> {
        Box::pin(self.extract_impl(input))
    }
    fn provider_name(&self) -> &'static str {
        self.inner.name()
    }
}

// ------------------------------------------------------------
// File cache helpers
// ------------------------------------------------------------

fn cache_key(input: &str) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(input.trim().to_lowercase().as_bytes());
    digest.iter().take(16).map(|b| format!("{b:02x}")).collect()
}

fn cache_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

fn read_cache_file(dir: &Path, key: &str) -> Option<MoodSignal> {
    let buf = fs::read_to_string(cache_path(dir, key)).ok()?;
    serde_json::from_str(&buf).ok()
}

fn write_cache_file(dir: &Path, key: &str, value: &MoodSignal) -> io::Result<()> {
    let path = cache_path(dir, key);
    let json = serde_json::to_string(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    write_atomic(&path, json.as_bytes())
}

// ------------------------------------------------------------
// Daily counter helpers
// ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailyCounter {
    date: String,
    count: u32,
}

impl Default for DailyCounter {
    fn default() -> Self {
        Self {
            date: today(),
            count: 0,
        }
    }
}

impl DailyCounter {
    fn is_expired(&self) -> bool {
        self.date != today()
    }
    fn reset_to_today(&mut self) {
        self.date = today();
        self.count = 0;
    }
}

fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

fn counter_path(dir: &Path) -> PathBuf {
    dir.join("daily_count.json")
}

fn load_daily_counter(dir: &Path) -> io::Result<DailyCounter> {
    let s = fs::read_to_string(counter_path(dir))?;
    serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn save_daily_counter(dir: &Path, dc: &DailyCounter) -> io::Result<()> {
    let s = serde_json::to_string(dc).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    write_atomic(&counter_path(dir), s.as_bytes())
}

// ------------------------------------------------------------
// Response parsing
// ------------------------------------------------------------

/// Parse `{"mood": .., "tone": ..}`, tolerating ```json fences around it.
pub fn parse_mood_json(content: &str) -> Option<MoodSignal> {
    let body = strip_code_fence(content);
    let signal: MoodSignal = serde_json::from_str(body).ok()?;
    Some(signal.normalized())
}

fn strip_code_fence(content: &str) -> &str {
    let s = content.trim();
    let Some(start) = s.find("```") else {
        return s;
    };
    let after = &s[start + 3..];
    let after = after.strip_prefix("json").unwrap_or(after);
    match after.find("```") {
        Some(end) => after[..end].trim(),
        None => after.trim(),
    }
}
