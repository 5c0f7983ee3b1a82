use serde::{Deserialize, Serialize};

use crate::error::{Result, RoadmapError};

/// Body of an OpenAI-compatible `chat/completions` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Builds the single-message request asking the model for a roadmap.
///
/// `tools` is appended as a preference hint only when it has visible content.
pub fn build_roadmap_request(
    model: &str,
    idea: &str,
    tools: Option<&str>,
) -> Result<ChatCompletionRequest> {
    if idea.trim().is_empty() {
        return Err(RoadmapError::EmptyIdea);
    }

    Ok(ChatCompletionRequest {
        model: model.to_string(),
        messages: vec![ChatMessage::user(roadmap_prompt(idea, tools))],
    })
}

fn roadmap_prompt(idea: &str, tools: Option<&str>) -> String {
    let tool_hint = match tools.map(str::trim) {
        Some(tools) if !tools.is_empty() => {
            format!("\nNote: Prefer using these tools if suitable - {}\n", tools)
        }
        _ => String::new(),
    };

    format!(
        r#"
You are an expert AI project planner and technical architect.

My project idea is:
"{idea}"

{tool_hint}

Please break this idea down into a complete development roadmap that includes:

1. Clear and well-defined **main processes or phases** (as modules or headings)
2. For each main process, provide detailed **sub-processes or steps** (as subheadings or tasks)
3. For each sub-process or task, suggest recommended **tools, technologies, or frameworks** to use
4. Provide an **ordered list of tasks** to be performed in each sub-process
5. Include optional task **dependencies** if applicable
6. Output everything in **structured JSON** format, with these fields:
   - `module`
   - `submodules` (list of sub-processes, each with:)
       - `submodule_name`
       - `tasks`
       - `tools`
   - `dependencies` (optional)
"#
    )
}
