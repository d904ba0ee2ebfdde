//! Web search tool: a simulated search that returns templated results.
//!
//! No network access. The output names the query so the model can still
//! ground a follow-up answer on it, and it is identical for identical input.

use async_trait::async_trait;
use toolrelay_core::error::ToolError;
use toolrelay_core::tool::{Tool, ToolResult};

pub struct WebSearchTool;

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Searches the web for current information about any topic. Returns relevant search results."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        Ok(ToolResult::ok(render_results(query)))
    }
}

fn render_results(query: &str) -> String {
    format!(
        "Search results for \"{query}\":\n\n\
         📰 Recent developments in {query}:\n\
         - This is a simulated search result providing information about {query}\n\
         - Live search is not connected, so no external pages were fetched\n\
         - Treat these results as a placeholder and answer from general knowledge\n\n\
         💡 Note: plug in a search API (Brave Search, SerpAPI, DuckDuckGo) to get real results."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn search_names_the_query() {
        let result = WebSearchTool
            .execute(serde_json::json!({"query": "rust async runtimes"}))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.starts_with("Search results for \"rust async runtimes\""));
        assert!(result.output.contains("Recent developments in rust async runtimes"));
    }

    #[tokio::test]
    async fn search_is_deterministic() {
        let args = serde_json::json!({"query": "quantum computing"});
        let first = WebSearchTool.execute(args.clone()).await.unwrap();
        let second = WebSearchTool.execute(args).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn missing_query_returns_error() {
        assert!(WebSearchTool.execute(serde_json::json!({})).await.is_err());
        assert!(WebSearchTool.execute(serde_json::json!({"query": "  "})).await.is_err());
    }

    #[test]
    fn tool_definition() {
        let def = WebSearchTool.to_definition();
        assert_eq!(def.name, "web_search");
        assert_eq!(def.parameters["required"][0], "query");
    }
}
