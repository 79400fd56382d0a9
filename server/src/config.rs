use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use anyhow::{anyhow, Result};
use tracing::{info, warn};
use url::Url;

/// Origins always allowed to call the API with credentials.
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "http://localhost:8080",
    "http://127.0.0.1:8080",
    "http://localhost:3000",
];

/// Default multipart upload limit (10 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Vision model providers the extraction client can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisionProvider {
    OpenAi,
    Claude,
}

impl VisionProvider {
    pub fn default_model(&self) -> &'static str {
        match self {
            VisionProvider::OpenAi => "gpt-4o",
            VisionProvider::Claude => "claude-sonnet-4-20250514",
        }
    }

    pub fn default_api_base(&self) -> &'static str {
        match self {
            VisionProvider::OpenAi => "https://api.openai.com",
            VisionProvider::Claude => "https://api.anthropic.com",
        }
    }

    /// Environment variable (or secret file name) holding the API key.
    pub fn key_name(&self) -> &'static str {
        match self {
            VisionProvider::OpenAi => "OPENAI_API_KEY",
            VisionProvider::Claude => "ANTHROPIC_API_KEY",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VisionProvider::OpenAi => "openai",
            VisionProvider::Claude => "claude",
        }
    }
}

impl FromStr for VisionProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(VisionProvider::OpenAi),
            "claude" | "anthropic" => Ok(VisionProvider::Claude),
            other => Err(format!(
                "Unsupported vision provider: '{}'. Supported: openai, claude",
                other
            )),
        }
    }
}

impl Display for VisionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub provider: VisionProvider,
    pub model: String,
    pub api_base: String,
    /// Server-side model credential. Absence is reported per request.
    pub api_key: Option<String>,
    pub allowed_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        let port = try_load("PORT", "3001")?;
        let provider: VisionProvider = try_load("VISION_PROVIDER", "openai")?;
        let model = try_load("VISION_MODEL", provider.default_model())?;
        let api_base = try_load("VISION_API_BASE", provider.default_api_base())?;
        let max_upload_bytes =
            try_load("MAX_UPLOAD_BYTES", &DEFAULT_MAX_UPLOAD_BYTES.to_string())?;

        let extra_origins = var("ALLOWED_ORIGINS").unwrap_or_default();
        let allowed_origins = build_allowed_origins(&extra_origins);

        let api_key = read_secret(provider.key_name());
        if api_key.is_none() {
            warn!(
                "{} is not configured; /api/upload-w2 will fail unless callers send a bearer token",
                provider.key_name()
            );
        }

        Ok(Self {
            port,
            provider,
            model,
            api_base,
            api_key,
            allowed_origins,
            max_upload_bytes,
        })
    }

    /// Defaults with no credential, used as a base by tests and tooling.
    pub fn with_defaults() -> Self {
        let provider = VisionProvider::OpenAi;
        Self {
            port: 3001,
            provider,
            model: provider.default_model().to_string(),
            api_base: provider.default_api_base().to_string(),
            api_key: None,
            allowed_origins: build_allowed_origins(""),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// Merge the built-in allow-list with a comma-separated list of extra origins.
/// Entries that are not http(s) URLs are dropped with a warning.
pub fn build_allowed_origins(extra: &str) -> Vec<String> {
    let mut origins: Vec<String> = Vec::new();

    let candidates = DEFAULT_ALLOWED_ORIGINS
        .iter()
        .copied()
        .chain(extra.split(',').map(str::trim).filter(|s| !s.is_empty()));

    for candidate in candidates {
        match normalize_origin(candidate) {
            Some(origin) => {
                if !origins.contains(&origin) {
                    origins.push(origin);
                }
            }
            None => warn!("Ignoring invalid CORS origin: {}", candidate),
        }
    }

    origins
}

fn normalize_origin(candidate: &str) -> Option<String> {
    let url = Url::parse(candidate).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let origin = url.origin();
    origin.is_tuple().then(|| origin.ascii_serialization())
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse()
        .map_err(|e| anyhow!("Invalid {key} value '{raw}': {e}"))
}

/// Read a secret from the environment, falling back to `/run/secrets/<name>`.
fn read_secret(secret_name: &str) -> Option<String> {
    if let Some(value) = var(secret_name) {
        return Some(value.trim().to_string());
    }

    let path = format!("/run/secrets/{secret_name}");
    match read_to_string(&path) {
        Ok(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Ok(_) => None,
        Err(e) => {
            info!("No {secret_name} secret file at {path}: {e}");
            None
        }
    }
}
