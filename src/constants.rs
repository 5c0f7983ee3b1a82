// Defaults loaded from the environment (or a .env file picked up by dotenvy in main).

use std::env;
use std::time::Duration;

/// Name of the environment variable holding the fallback API key.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Fixed file names written into the working directory.
pub const ROADMAP_FILE: &str = "roadmap.json";
pub const COMPLETED_TASKS_FILE: &str = "completed_tasks.json";

pub const SESSION_COOKIE: &str = "roadmapper_session";

/// Sessions untouched for this long are dropped on the next lookup.
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(2 * 60 * 60);

lazy_static::lazy_static! {
    pub static ref GROQ_API_URL: String = env::var("GROQ_API_URL")
        .unwrap_or_else(|_| "https://api.groq.com/openai/v1/chat/completions".to_string());
    pub static ref GROQ_MODEL: String = env::var("GROQ_MODEL")
        .unwrap_or_else(|_| "meta-llama/llama-4-scout-17b-16e-instruct".to_string());
    // Blank values count as unset.
    pub static ref GROQ_API_KEY: Option<String> = env::var(API_KEY_ENV)
        .ok()
        .filter(|key| !key.trim().is_empty());
}
