//! Built-in tool implementations for ToolRelay.
//!
//! Five small, side-effect-free tools the model may call mid-conversation.
//! Only the clock reads anything from outside its arguments.

pub mod calculator;
pub mod clock;
pub mod knowledge_base;
pub mod task_planner;
pub mod web_search;

use toolrelay_core::tool::ToolRegistry;

/// Create the tool registry advertised to the model.
///
/// Order is fixed: calculator, web_search, task_planner, get_current_time,
/// knowledge_base.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(calculator::CalculatorTool));
    registry.register(Box::new(web_search::WebSearchTool));
    registry.register(Box::new(task_planner::TaskPlannerTool));
    registry.register(Box::new(clock::CurrentTimeTool));
    registry.register(Box::new(knowledge_base::KnowledgeBaseTool));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_order() {
        let registry = default_registry();
        assert_eq!(
            registry.names(),
            vec!["calculator", "web_search", "task_planner", "get_current_time", "knowledge_base"]
        );
    }

    #[test]
    fn every_descriptor_is_an_object_schema() {
        for def in default_registry().definitions() {
            assert_eq!(def.parameters["type"], "object", "{}", def.name);
            assert!(!def.description.is_empty());
        }
    }

    #[tokio::test]
    async fn invoke_dispatches_by_exact_name() {
        let registry = default_registry();
        let out = registry
            .invoke("calculator", serde_json::json!({"expression": "sqrt(16)"}))
            .await;
        assert_eq!(out, "Calculation result: sqrt(16) = 4");

        let out = registry.invoke("Calculator", serde_json::json!({})).await;
        assert_eq!(out, "unknown tool: `Calculator`");
    }

    #[tokio::test]
    async fn invoke_reports_missing_required_argument() {
        let registry = default_registry();
        let out = registry.invoke("web_search", serde_json::json!({})).await;
        assert!(out.starts_with("Error executing web_search:"));
    }

    #[tokio::test]
    async fn pure_tools_are_idempotent() {
        let registry = default_registry();
        let cases = [
            ("calculator", serde_json::json!({"expression": "2 + 2"})),
            ("web_search", serde_json::json!({"query": "rust"})),
            ("task_planner", serde_json::json!({"goal": "ship"})),
            ("knowledge_base", serde_json::json!({"topic": "python"})),
        ];
        for (name, args) in cases {
            let first = registry.invoke(name, args.clone()).await;
            let second = registry.invoke(name, args).await;
            assert_eq!(first, second, "{name}");
        }
    }
}
