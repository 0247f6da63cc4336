// Reminder tools - add and list reminders

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::error::ToolError;
use crate::services::{Reminder, ReminderService};
use crate::tools::registry::Tool;
use crate::tools::types::{decode_input, ParamSpec, PermissionLevel, ToolDescriptor};

#[derive(Debug, Deserialize)]
struct AddReminderInput {
    title: String,
    /// RFC 3339 due time.
    #[serde(default)]
    due: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

pub struct AddReminderTool {
    reminders: Arc<dyn ReminderService>,
    descriptor: ToolDescriptor,
}

impl AddReminderTool {
    pub fn new(reminders: Arc<dyn ReminderService>) -> Self {
        Self {
            reminders,
            descriptor: ToolDescriptor {
                id: "add_reminder".to_string(),
                name: "Add Reminder".to_string(),
                description: "Create a reminder, optionally with a due time and notes."
                    .to_string(),
                domain: "reminders".to_string(),
                trigger_keywords: vec![
                    "remind".to_string(),
                    "reminder".to_string(),
                    "don't forget".to_string(),
                ],
                required_permission: PermissionLevel::Elevated,
                parameters: vec![
                    ParamSpec::required("title", "string", "Submit essay", "What to remember"),
                    ParamSpec::optional(
                        "due",
                        "string",
                        "2025-05-02T23:59:00Z",
                        "Due time, RFC 3339",
                    ),
                    ParamSpec::optional("notes", "string", "Upload to Canvas", "Extra notes"),
                ],
            },
        }
    }
}

#[async_trait]
impl Tool for AddReminderTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        let input: AddReminderInput = decode_input(&self.descriptor.id, input)?;

        let due: Option<DateTime<Utc>> = match &input.due {
            Some(value) => Some(
                DateTime::parse_from_rfc3339(value)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| ToolError::Execution {
                        tool: self.descriptor.id.clone(),
                        source: anyhow::anyhow!("invalid due timestamp '{}': {}", value, e),
                    })?,
            ),
            None => None,
        };

        self.reminders
            .add(Reminder {
                title: input.title.clone(),
                due,
                notes: input.notes,
            })
            .await
            .map_err(|e| ToolError::Execution {
                tool: self.descriptor.id.clone(),
                source: e,
            })?;

        Ok(match due {
            Some(due) => format!(
                "Reminder set: '{}' due {}.",
                input.title,
                due.format("%a %b %e at %H:%M")
            ),
            None => format!("Reminder set: '{}'.", input.title),
        })
    }
}

pub struct ListRemindersTool {
    reminders: Arc<dyn ReminderService>,
    descriptor: ToolDescriptor,
}

impl ListRemindersTool {
    pub fn new(reminders: Arc<dyn ReminderService>) -> Self {
        Self {
            reminders,
            descriptor: ToolDescriptor {
                id: "list_reminders".to_string(),
                name: "List Reminders".to_string(),
                description: "List the user's upcoming reminders.".to_string(),
                domain: "reminders".to_string(),
                trigger_keywords: vec![
                    "reminders".to_string(),
                    "reminder".to_string(),
                    "todo".to_string(),
                ],
                required_permission: PermissionLevel::Basic,
                parameters: vec![],
            },
        }
    }
}

#[async_trait]
impl Tool for ListRemindersTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        #[derive(Deserialize)]
        struct NoInput {}
        let _: NoInput = decode_input(&self.descriptor.id, input)?;

        let reminders = self
            .reminders
            .upcoming()
            .await
            .map_err(|e| ToolError::Execution {
                tool: self.descriptor.id.clone(),
                source: e,
            })?;

        if reminders.is_empty() {
            return Ok("No reminders set.".to_string());
        }

        let lines: Vec<String> = reminders
            .iter()
            .map(|r| {
                let due = r
                    .due
                    .map(|d| format!(" (due {})", d.format("%b %e %H:%M")))
                    .unwrap_or_default();
                format!("- {}{}", r.title, due)
            })
            .collect();
        Ok(format!(
            "{} reminder(s):\n{}",
            reminders.len(),
            lines.join("\n")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryReminders;
    use serde_json::json;

    #[tokio::test]
    async fn test_add_then_list() {
        let service = Arc::new(InMemoryReminders::new());
        let add = AddReminderTool::new(Arc::clone(&service) as Arc<dyn ReminderService>);
        let list = ListRemindersTool::new(service);

        let output = add
            .execute(json!({"title": "Study for finals"}))
            .await
            .unwrap();
        assert!(output.contains("Study for finals"));

        let listing = list.execute(json!({})).await.unwrap();
        assert!(listing.contains("1 reminder(s)"));
        assert!(listing.contains("Study for finals"));
    }

    #[tokio::test]
    async fn test_add_with_due_time() {
        let add = AddReminderTool::new(Arc::new(InMemoryReminders::new()));
        let output = add
            .execute(json!({"title": "Essay", "due": "2025-05-02T23:59:00Z"}))
            .await
            .unwrap();
        assert!(output.contains("due"));
    }

    #[tokio::test]
    async fn test_add_invalid_due_is_execution_error() {
        let add = AddReminderTool::new(Arc::new(InMemoryReminders::new()));
        let err = add
            .execute(json!({"title": "Essay", "due": "next friday"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Execution { .. }));
    }

    #[tokio::test]
    async fn test_add_missing_title_is_decode_error() {
        let add = AddReminderTool::new(Arc::new(InMemoryReminders::new()));
        let err = add.execute(json!({"notes": "hm"})).await.unwrap_err();
        assert!(matches!(err, ToolError::ArgumentDecode { .. }));
    }

    #[tokio::test]
    async fn test_list_empty() {
        let list = ListRemindersTool::new(Arc::new(InMemoryReminders::new()));
        let output = list.execute(json!({})).await.unwrap();
        assert_eq!(output, "No reminders set.");
    }
}
