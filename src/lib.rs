pub mod constants;
pub mod error;
pub mod extract;
pub mod llm_interaction;
pub mod progress;
pub mod request;
pub mod roadmap;
pub mod session;
pub mod terminal;
pub mod web_server;

pub use error::{Result, RoadmapError};
pub use roadmap::{ParsedRoadmap, Roadmap, RoadmapModel, TaskCompletion, TaskId};
