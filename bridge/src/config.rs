use anyhow::{Context, Result, anyhow};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "voice-bridge")]
pub struct Args {
    #[arg(short, long, default_value = "[::]", help = "address to listen on")]
    pub address: String,

    #[arg(short, long, default_value = "8001", help = "port to listen on")]
    pub port: u16,

    #[arg(long, help = "path to the base realtime-session prompt")]
    pub base_prompt_file: String,

    #[arg(long, help = "path to the summarization system prompt")]
    pub summary_system_prompt_file: String,

    #[arg(long, default_value = "gpt-4o-realtime-preview", env = "REALTIME_MODEL")]
    pub realtime_model: String,

    #[arg(long, default_value = "alloy", env = "REALTIME_VOICE")]
    pub realtime_voice: String,

    #[arg(long, default_value = "whisper-1", env = "TRANSCRIPTION_MODEL")]
    pub transcription_model: String,

    #[arg(long, default_value = "gpt-4o-mini", env = "SUMMARY_MODEL")]
    pub summary_model: String,
}

/// Process-wide immutable configuration, assembled once at startup and
/// handed to every session task by reference.
pub struct Config {
    pub listen_addr: String,
    pub listen_port: u16,

    pub realtime_ws_url: String,
    pub realtime_api_key: String,
    pub realtime_model: String,
    pub realtime_voice: String,
    pub transcription_model: String,

    pub summary_endpoint: String,
    pub summary_model: String,
    pub summary_system_prompt: String,

    pub call_log_endpoint: String,
    pub call_log_anon_key: String,
    pub call_log_shared_secret: String,
    pub org_id: Option<String>,

    pub base_prompt: String,

    pub energy_threshold: i64,
    pub vad_hangover_ms: u64,

    pub http_client: reqwest::Client,
}

impl Config {
    pub fn load(args: Args) -> Result<Self> {
        let realtime_api_key = require_env("REALTIME_API_KEY")?;
        let realtime_ws_url = std::env::var("REALTIME_WS_URL")
            .unwrap_or_else(|_| "wss://api.openai.com/v1/realtime".to_string());

        let summary_endpoint = require_env("SUMMARY_ENDPOINT")?;

        let call_log_endpoint = require_env("CALL_LOG_ENDPOINT")?;
        let call_log_anon_key = require_env("CALL_LOG_ANON_KEY")?;
        let call_log_shared_secret = require_env_dual(
            "CALL_LOG_SHARED_SECRET",
            "CALL_LOG_SERVICE_SECRET",
        )?;
        let org_id = std::env::var("ORG_ID").ok().filter(|s| !s.trim().is_empty());

        let base_prompt = read_prompt_file(&args.base_prompt_file)?;
        let summary_system_prompt = read_prompt_file(&args.summary_system_prompt_file)?;

        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            listen_addr: args.address,
            listen_port: args.port,
            realtime_ws_url,
            realtime_api_key,
            realtime_model: args.realtime_model,
            realtime_voice: args.realtime_voice,
            transcription_model: args.transcription_model,
            summary_endpoint,
            summary_model: args.summary_model,
            summary_system_prompt,
            call_log_endpoint,
            call_log_anon_key,
            call_log_shared_secret,
            org_id,
            base_prompt,
            energy_threshold: shared_vad::ENERGY_THRESHOLD,
            vad_hangover_ms: shared_vad::HANGOVER_MS,
            http_client,
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("missing required environment variable {name}"))
}

/// Resolve a secret from either of two environment variable names, the
/// first taking precedence. Preserves the dual-source shared secret lookup
/// the deployment relies on.
fn require_env_dual(primary: &str, fallback: &str) -> Result<String> {
    pick_dual(std::env::var(primary).ok(), std::env::var(fallback).ok())
        .ok_or_else(|| anyhow!("missing required environment variable {primary} (or {fallback})"))
}

fn pick_dual(primary: Option<String>, fallback: Option<String>) -> Option<String> {
    primary
        .filter(|s| !s.trim().is_empty())
        .or_else(|| fallback.filter(|s| !s.trim().is_empty()))
}

fn read_prompt_file(path: &str) -> Result<String> {
    std::fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .with_context(|| format!("failed to read prompt file {path}"))
}
