use anyhow::{Context, Result, anyhow};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TextServiceConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct ImageServiceConfig {
    pub api_key: String,
    pub base_url: String,
    pub engine: String,
}

/// Knobs for the chapter loop.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub sections_per_chapter: usize,
    pub max_attempts: usize,
    /// Sections below this many words are regenerated.
    pub min_words: usize,
    /// Word count asked for in the prompt.
    pub target_words: usize,
    pub chapter_pause: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            sections_per_chapter: 2,
            max_attempts: 3,
            min_words: 500,
            target_words: 800,
            chapter_pause: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub output_dir: PathBuf,
    pub public_base_url: String,
    pub author: String,
    pub text: TextServiceConfig,
    pub image: ImageServiceConfig,
    pub pipeline: PipelineSettings,
}

impl Config {
    /// Loads `.env` (if any) and reads the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| var(key).ok_or_else(|| anyhow!("{key} must be set"));

        let defaults = PipelineSettings::default();
        let pipeline = PipelineSettings {
            sections_per_chapter: parse_or(&var, "SECTIONS_PER_CHAPTER", defaults.sections_per_chapter)?,
            max_attempts: parse_or(&var, "SECTION_MAX_ATTEMPTS", defaults.max_attempts)?,
            min_words: parse_or(&var, "SECTION_MIN_WORDS", defaults.min_words)?,
            target_words: parse_or(&var, "SECTION_TARGET_WORDS", defaults.target_words)?,
            chapter_pause: Duration::from_millis(parse_or(&var, "CHAPTER_PAUSE_MS", 1000u64)?),
        };

        Ok(Self {
            bind_addr: parse_or(&var, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?,
            output_dir: var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./output")),
            public_base_url: var("PUBLIC_BASE_URL").unwrap_or_default(),
            author: var("BOOK_AUTHOR").unwrap_or_else(|| "Author Name".to_string()),
            text: TextServiceConfig {
                api_key: required("ANTHROPIC_API_KEY")?,
                base_url: var("ANTHROPIC_BASE_URL")
                    .unwrap_or_else(|| "https://api.anthropic.com".to_string()),
                model: var("TEXT_MODEL").unwrap_or_else(|| "claude-3-haiku-20240307".to_string()),
            },
            image: ImageServiceConfig {
                api_key: required("STABILITY_API_KEY")?,
                base_url: var("STABILITY_BASE_URL")
                    .or_else(|| var("API_HOST"))
                    .unwrap_or_else(|| "https://api.stability.ai".to_string()),
                engine: var("STABILITY_ENGINE")
                    .unwrap_or_else(|| "stable-diffusion-xl-beta-v2-2-2".to_string()),
            },
            pipeline,
        })
    }
}

fn parse_or<T, F>(var: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}
