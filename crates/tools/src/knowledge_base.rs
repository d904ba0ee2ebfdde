//! Knowledge base tool: a small static keyword → fact map.
//!
//! Matching is a case-insensitive substring test against the topic. Keys
//! are checked longest first, so when several keys match the longest one
//! wins ("machine learning" over "ai"). A lone "explain" still matches
//! "ai".

use async_trait::async_trait;
use toolrelay_core::error::ToolError;
use toolrelay_core::tool::{Tool, ToolResult};

/// Ordered longest key first.
const FACTS: &[(&str, &str)] = &[
    (
        "machine learning",
        "Machine Learning is a subset of AI that enables systems to learn and improve from experience without explicit programming. Common types include supervised, unsupervised, and reinforcement learning.",
    ),
    (
        "blockchain",
        "Blockchain is a distributed ledger technology that records transactions across multiple computers securely and transparently. It's the foundation of cryptocurrencies.",
    ),
    (
        "javascript",
        "JavaScript is a high-level, interpreted programming language used primarily for web development. It runs in browsers and on servers (Node.js).",
    ),
    (
        "python",
        "Python is a high-level, interpreted programming language known for its simplicity and readability. It's widely used in data science, AI, web development, and automation.",
    ),
    (
        "ai",
        "Artificial Intelligence (AI) is the simulation of human intelligence by machines. It includes machine learning, deep learning, natural language processing, and computer vision.",
    ),
];

pub struct KnowledgeBaseTool;

#[async_trait]
impl Tool for KnowledgeBaseTool {
    fn name(&self) -> &str {
        "knowledge_base"
    }

    fn description(&self) -> &str {
        "Retrieves information from a knowledge base on various topics including science, history, technology, and general knowledge."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "topic": {
                    "type": "string",
                    "description": "The topic to retrieve information about"
                }
            },
            "required": ["topic"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let topic = arguments["topic"]
            .as_str()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'topic' argument".into()))?;

        let output = match lookup(topic) {
            Some(fact) => format!(
                "📚 Knowledge Base - {topic}:\n\n{fact}\n\n\
                 💡 This is from a simulated knowledge base."
            ),
            None => format!(
                "📚 Knowledge Base Query: \"{topic}\"\n\n\
                 No specific information found in the current knowledge base (topic not found)."
            ),
        };
        Ok(ToolResult::ok(output))
    }
}

/// Find the fact for the first key contained in `topic`.
pub fn lookup(topic: &str) -> Option<&'static str> {
    let topic = topic.to_lowercase();
    FACTS
        .iter()
        .find(|(key, _)| topic.contains(key))
        .map(|(_, fact)| *fact)
}
