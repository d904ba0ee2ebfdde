//! Task planner tool: breaks a goal into a fixed five-step plan.

use async_trait::async_trait;
use toolrelay_core::error::ToolError;
use toolrelay_core::tool::{Tool, ToolResult};

pub struct TaskPlannerTool;

#[async_trait]
impl Tool for TaskPlannerTool {
    fn name(&self) -> &str {
        "task_planner"
    }

    fn description(&self) -> &str {
        "Creates a structured plan to accomplish a complex goal by breaking it down into actionable steps."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "goal": {
                    "type": "string",
                    "description": "The goal or task to plan for"
                },
                "context": {
                    "type": "string",
                    "description": "Additional context, constraints, or requirements"
                }
            },
            "required": ["goal"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let goal = arguments["goal"]
            .as_str()
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'goal' argument".into()))?;

        // Absent context is an empty string
        let context = arguments["context"].as_str().unwrap_or("").trim();

        Ok(ToolResult::ok(render_plan(goal, context)))
    }
}

/// Build the plan text. An empty `context` omits the context line.
pub fn render_plan(goal: &str, context: &str) -> String {
    let context_line = if context.is_empty() {
        String::new()
    } else {
        format!("\n📋 Context: {context}\n")
    };

    format!(
        "🎯 Task Plan: {goal}{context_line}\n\n\
         Step 1: 📊 Analyze Requirements\n\
         \x20  - Define clear objectives\n\
         \x20  - Identify constraints and resources\n\
         \x20  - Set success criteria\n\n\
         Step 2: 🗂️ Break Down the Goal\n\
         \x20  - Divide into manageable sub-tasks\n\
         \x20  - Establish task dependencies\n\
         \x20  - Prioritize based on importance\n\n\
         Step 3: 📅 Create Timeline\n\
         \x20  - Estimate time for each task\n\
         \x20  - Set milestones and deadlines\n\
         \x20  - Build in buffer time\n\n\
         Step 4: ⚡ Execute and Monitor\n\
         \x20  - Start with highest priority tasks\n\
         \x20  - Track progress regularly\n\
         \x20  - Adjust plan as needed\n\n\
         Step 5: ✅ Review and Validate\n\
         \x20  - Check completion against criteria\n\
         \x20  - Document lessons learned\n\
         \x20  - Celebrate achievements\n\n\
         💡 This plan can be customized based on your specific needs!"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plan_includes_goal_and_context() {
        let result = TaskPlannerTool
            .execute(serde_json::json!({"goal": "Launch a blog", "context": "two weeks"}))
            .await
            .unwrap();
        assert!(result.output.starts_with("🎯 Task Plan: Launch a blog"));
        assert!(result.output.contains("📋 Context: two weeks"));
        assert!(result.output.contains("Step 5: ✅ Review and Validate"));
    }

    #[tokio::test]
    async fn missing_context_defaults_to_empty() {
        let result = TaskPlannerTool
            .execute(serde_json::json!({"goal": "Learn Rust"}))
            .await
            .unwrap();
        assert!(result.success);
        assert!(!result.output.contains("Context:"));
        assert_eq!(result.output, render_plan("Learn Rust", ""));
    }

    #[test]
    fn steps_are_indented() {
        let plan = render_plan("x", "");
        assert!(plan.contains("\n   - Define clear objectives\n"));
    }

    #[tokio::test]
    async fn missing_goal_returns_error() {
        let result = TaskPlannerTool.execute(serde_json::json!({"context": "c"})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }
}
