// Calendar tools - list upcoming events and create new ones

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::error::ToolError;
use crate::services::{CalendarEvent, CalendarService};
use crate::tools::registry::Tool;
use crate::tools::types::{decode_input, ParamSpec, PermissionLevel, ToolDescriptor};

fn format_event(event: &CalendarEvent) -> String {
    let mut line = format!("- {} at {}", event.title, event.start.format("%a %b %e %H:%M"));
    if let Some(end) = &event.end {
        line.push_str(&format!(" until {}", end.format("%H:%M")));
    }
    if let Some(location) = &event.location {
        line.push_str(&format!(" ({location})"));
    }
    line
}

fn parse_timestamp(tool: &str, field: &str, value: &str) -> Result<DateTime<Utc>, ToolError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ToolError::Execution {
            tool: tool.to_string(),
            source: anyhow::anyhow!("invalid {} timestamp '{}': {}", field, value, e),
        })
}

#[derive(Debug, Deserialize)]
struct ListEventsInput {
    /// Look-ahead window in days.
    #[serde(default = "default_days")]
    days: u32,
}

fn default_days() -> u32 {
    7
}

pub struct ListCalendarEventsTool {
    calendar: Arc<dyn CalendarService>,
    descriptor: ToolDescriptor,
}

impl ListCalendarEventsTool {
    pub fn new(calendar: Arc<dyn CalendarService>) -> Self {
        Self {
            calendar,
            descriptor: ToolDescriptor {
                id: "list_calendar_events".to_string(),
                name: "List Calendar Events".to_string(),
                description: "List the user's upcoming calendar events within a look-ahead \
                              window (default 7 days)."
                    .to_string(),
                domain: "calendar".to_string(),
                trigger_keywords: vec![
                    "calendar".to_string(),
                    "schedule".to_string(),
                    "events".to_string(),
                    "meetings".to_string(),
                ],
                required_permission: PermissionLevel::Basic,
                parameters: vec![ParamSpec::optional(
                    "days",
                    "integer",
                    "7",
                    "How many days ahead to look",
                )],
            },
        }
    }
}

#[async_trait]
impl Tool for ListCalendarEventsTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        let input: ListEventsInput = decode_input(&self.descriptor.id, input)?;

        let events = self
            .calendar
            .upcoming_events(input.days)
            .await
            .map_err(|e| ToolError::Execution {
                tool: self.descriptor.id.clone(),
                source: e,
            })?;

        if events.is_empty() {
            return Ok(format!(
                "No events on the calendar in the next {} days.",
                input.days
            ));
        }

        let lines: Vec<String> = events.iter().map(format_event).collect();
        Ok(format!(
            "{} upcoming event(s):\n{}",
            events.len(),
            lines.join("\n")
        ))
    }
}

#[derive(Debug, Deserialize)]
struct CreateEventInput {
    title: String,
    /// RFC 3339 start time.
    start: String,
    #[serde(default)]
    end: Option<String>,
    #[serde(default)]
    location: Option<String>,
}

pub struct CreateCalendarEventTool {
    calendar: Arc<dyn CalendarService>,
    descriptor: ToolDescriptor,
}

impl CreateCalendarEventTool {
    pub fn new(calendar: Arc<dyn CalendarService>) -> Self {
        Self {
            calendar,
            descriptor: ToolDescriptor {
                id: "create_calendar_event".to_string(),
                name: "Create Calendar Event".to_string(),
                description: "Add a new event to the user's calendar.".to_string(),
                domain: "calendar".to_string(),
                trigger_keywords: vec![
                    "calendar".to_string(),
                    "schedule".to_string(),
                    "add event".to_string(),
                    "book".to_string(),
                ],
                required_permission: PermissionLevel::Elevated,
                parameters: vec![
                    ParamSpec::required("title", "string", "Study session", "Event title"),
                    ParamSpec::required(
                        "start",
                        "string",
                        "2025-05-02T15:00:00Z",
                        "Start time, RFC 3339",
                    ),
                    ParamSpec::optional(
                        "end",
                        "string",
                        "2025-05-02T16:00:00Z",
                        "End time, RFC 3339",
                    ),
                    ParamSpec::optional("location", "string", "Library room 204", "Where"),
                ],
            },
        }
    }
}

#[async_trait]
impl Tool for CreateCalendarEventTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        let input: CreateEventInput = decode_input(&self.descriptor.id, input)?;

        let start = parse_timestamp(&self.descriptor.id, "start", &input.start)?;
        let end = match &input.end {
            Some(value) => Some(parse_timestamp(&self.descriptor.id, "end", value)?),
            None => None,
        };

        let event = CalendarEvent {
            title: input.title.clone(),
            start,
            end,
            location: input.location,
        };

        self.calendar
            .create_event(event)
            .await
            .map_err(|e| ToolError::Execution {
                tool: self.descriptor.id.clone(),
                source: e,
            })?;

        Ok(format!(
            "Created event '{}' on {}.",
            input.title,
            start.format("%a %b %e at %H:%M")
        ))
    }
}
