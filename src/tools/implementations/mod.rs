// Default campus tools

pub mod calendar;
pub mod courses;
pub mod reminders;

use std::sync::Arc;

use crate::services::ServiceHandles;
use crate::tools::registry::Tool;

pub use calendar::{CreateCalendarEventTool, ListCalendarEventsTool};
pub use courses::{GetAssignmentsTool, GetCoursesTool, GetGradesTool};
pub use reminders::{AddReminderTool, ListRemindersTool};

/// The tools `ToolRegistry::ensure_initialized` registers.
pub fn default_tools(services: &ServiceHandles) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ListCalendarEventsTool::new(Arc::clone(&services.calendar))),
        Arc::new(CreateCalendarEventTool::new(Arc::clone(&services.calendar))),
        Arc::new(GetCoursesTool::new(Arc::clone(&services.courses))),
        Arc::new(GetAssignmentsTool::new(Arc::clone(&services.courses))),
        Arc::new(GetGradesTool::new(Arc::clone(&services.courses))),
        Arc::new(AddReminderTool::new(Arc::clone(&services.reminders))),
        Arc::new(ListRemindersTool::new(Arc::clone(&services.reminders))),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tool_ids_are_unique() {
        let services = ServiceHandles::in_memory();
        let tools = default_tools(&services);
        let mut ids: Vec<&str> = tools.iter().map(|t| t.descriptor().id.as_str()).collect();
        ids.sort();
        let before = ids.len();
        ids.dedup();
        assert_eq!(ids.len(), before);
        assert_eq!(before, 7);
    }

    #[test]
    fn test_default_tools_have_trigger_keywords() {
        let services = ServiceHandles::in_memory();
        for tool in default_tools(&services) {
            assert!(
                !tool.descriptor().trigger_keywords.is_empty(),
                "{} has no trigger keywords",
                tool.descriptor().id
            );
        }
    }
}
