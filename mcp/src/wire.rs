//! Wire envelope types for the tool-call boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tool-call request: the tool's wire name plus an argument bag.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolCallRequest {
    pub tool: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_arguments_default_to_empty() {
        let request: ToolCallRequest = serde_json::from_value(json!({"tool": "search"})).unwrap();
        assert_eq!(request.tool, "search");
        assert!(request.arguments.is_empty());
    }
}
