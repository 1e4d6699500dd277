use serde::{Deserialize, Serialize};

/// What the code generator was asked to do
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeTask {
    pub description: String,
    /// Generating tool, e.g. "claude-code", "cursor", "copilot"
    pub tool: Option<String>,
    pub conversation_id: Option<String>,
}

impl CodeTask {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            tool: None,
            conversation_id: None,
        }
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    pub fn with_conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }
}
