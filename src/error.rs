use std::path::PathBuf;

use thiserror::Error;

/// Everything that can end a user action. None of these are retried.
#[derive(Debug, Error)]
pub enum RoadmapError {
    #[error("please enter a valid project idea")]
    EmptyIdea,

    #[error("API key not set: enter it in the settings panel or set GROQ_API_KEY")]
    MissingCredential,

    #[error("API call failed ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("failed to reach the chat completion endpoint: {0}")]
    Transport(String),

    #[error("failed to parse JSON from AI response: {source}")]
    MalformedRoadmap {
        candidate: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid roadmap at `{path}`: {reason}")]
    InvalidRoadmap { path: String, reason: String },

    #[error("failed to write {}: {source}", path.display())]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for RoadmapError {
    fn from(err: reqwest::Error) -> Self {
        RoadmapError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RoadmapError>;
