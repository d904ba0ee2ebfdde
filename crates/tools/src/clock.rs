//! Clock tool: the current local date and time, with the timezone name.
//!
//! The only built-in that is not a pure function of its input.

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use toolrelay_core::error::ToolError;
use toolrelay_core::tool::{Tool, ToolResult};

pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Gets the current date and time in a readable format."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let now = Local::now();
        let zone = local_zone_name(&now);
        Ok(ToolResult::ok(render_time(&now, &zone)))
    }
}

/// IANA name of the host timezone, or the UTC offset when it can't be resolved.
fn local_zone_name(now: &DateTime<Local>) -> String {
    match iana_time_zone::get_timezone() {
        Ok(name) => name,
        Err(e) => {
            tracing::debug!(error = %e, "Could not resolve timezone name");
            format!("UTC{}", now.format("%:z"))
        }
    }
}

/// Format a timestamp for people.
pub fn render_time<Tz>(now: &DateTime<Tz>, zone_name: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!(
        "🕐 Current date and time:\n\n\
         📅 Date: {}\n\
         ⏰ Time: {}\n\
         🌍 Timezone: {zone_name}",
        now.format("%A, %B %-d, %Y"),
        now.format("%I:%M:%S %p %Z"),
    )
}
