use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub searxng_domain: String,
    pub ollama_host: String,
    /// Kept raw: a bad value is reported to each `/stream` caller, not at boot.
    pub max_iterations: Option<String>,
    pub max_sources: usize,
    pub fetch_concurrency: usize,
    pub fetch_timeout: Duration,
    pub event_buffer: usize,
    pub session_ttl: Duration,
    pub chunk_words: usize,
    pub top_k: usize,
}

impl Config {
    pub fn from_env() -> Result<Config> {
        dotenv().ok(); // Load .env file if present
        Ok(Config {
            listen_addr: get_env_or_default("LISTEN_ADDR", "0.0.0.0:8080"),
            searxng_domain: get_env("SEARXNG_DOMAIN")?,
            ollama_host: get_env_or_default("OLLAMA_HOST", "http://localhost:11434"),
            max_iterations: env::var("MAX_ITERATIONS").ok(),
            max_sources: parse_env_or("MAX_SOURCES", 10)?,
            fetch_concurrency: parse_env_or("FETCH_CONCURRENCY", 10)?,
            fetch_timeout: Duration::from_secs(parse_env_or("FETCH_TIMEOUT_SECS", 15)?),
            event_buffer: parse_env_or("EVENT_BUFFER", 32)?,
            session_ttl: Duration::from_secs(parse_env_or("SESSION_TTL_SECS", 3600)?),
            chunk_words: parse_env_or("CHUNK_WORDS", 200)?,
            top_k: parse_env_or("TOP_K", 3)?,
        })
    }

    /// Parses the iteration bound handed to every accepted query.
    pub fn max_iterations(&self) -> Option<u32> {
        self.max_iterations
            .as_deref()
            .and_then(|raw| raw.trim().parse::<u32>().ok())
            .filter(|n| *n > 0)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: "0.0.0.0:8080".to_string(),
            searxng_domain: "http://localhost:8888".to_string(),
            ollama_host: "http://localhost:11434".to_string(),
            max_iterations: Some("3".to_string()),
            max_sources: 10,
            fetch_concurrency: 10,
            fetch_timeout: Duration::from_secs(15),
            event_buffer: 32,
            session_ttl: Duration::from_secs(3600),
            chunk_words: 200,
            top_k: 3,
        }
    }
}

fn get_env(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("Missing required environment variable: {key}"))
}

fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {key}: {raw:?}")),
        Err(_) => Ok(default),
    }
}
