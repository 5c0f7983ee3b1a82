use regex::Regex;
use serde_json::Value;

use crate::error::{Result, RoadmapError};

lazy_static::lazy_static! {
    static ref FENCED_JSON: Regex = Regex::new(r"(?s)```json(.*?)```").expect("fenced json pattern is valid");
}

/// Pulls the JSON document out of a model reply.
///
/// The interior of the first ```` ```json ```` fence wins; without one the whole reply is
/// parsed. The result is only known to be JSON, see [`crate::roadmap::Roadmap::from_value`]
/// for schema checks.
pub fn extract_roadmap_json(reply: &str) -> Result<Value> {
    let candidate = match FENCED_JSON.captures(reply).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => reply,
    };

    serde_json::from_str(candidate).map_err(|source| RoadmapError::MalformedRoadmap {
        candidate: candidate.to_string(),
        source,
    })
}
