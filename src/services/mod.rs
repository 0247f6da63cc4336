// External service contracts consumed by tools
//
// The concrete HTTP clients (campus LMS, device calendar, reminders) live
// outside this crate; tools consume them only through these typed traits.
// In-memory implementations back the CLI demo and the test suite.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub title: String,
    pub start: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub course_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grade {
    pub course_id: String,
    pub course_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub letter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[async_trait]
pub trait CalendarService: Send + Sync {
    /// Events starting within the next `days` days.
    async fn upcoming_events(&self, days: u32) -> Result<Vec<CalendarEvent>>;

    async fn create_event(&self, event: CalendarEvent) -> Result<()>;
}

#[async_trait]
pub trait CourseService: Send + Sync {
    async fn courses(&self) -> Result<Vec<Course>>;

    /// Assignments, optionally narrowed to one course.
    async fn assignments(&self, course_id: Option<&str>) -> Result<Vec<Assignment>>;

    async fn grades(&self) -> Result<Vec<Grade>>;
}

#[async_trait]
pub trait ReminderService: Send + Sync {
    async fn add(&self, reminder: Reminder) -> Result<()>;

    async fn upcoming(&self) -> Result<Vec<Reminder>>;
}

/// The service handles the default tools need, wired once at the
/// composition root and passed into the registry.
#[derive(Clone)]
pub struct ServiceHandles {
    pub calendar: Arc<dyn CalendarService>,
    pub courses: Arc<dyn CourseService>,
    pub reminders: Arc<dyn ReminderService>,
}

impl ServiceHandles {
    /// Fully in-memory handles for the CLI demo and tests.
    pub fn in_memory() -> Self {
        Self {
            calendar: Arc::new(InMemoryCalendar::new()),
            courses: Arc::new(InMemoryCourses::new()),
            reminders: Arc::new(InMemoryReminders::new()),
        }
    }
}

/// In-memory calendar store.
pub struct InMemoryCalendar {
    events: RwLock<Vec<CalendarEvent>>,
}

impl InMemoryCalendar {
    pub fn new() -> Self {
        Self {
            events: RwLock::new(Vec::new()),
        }
    }

    pub fn with_events(events: Vec<CalendarEvent>) -> Self {
        Self {
            events: RwLock::new(events),
        }
    }
}

impl Default for InMemoryCalendar {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CalendarService for InMemoryCalendar {
    async fn upcoming_events(&self, days: u32) -> Result<Vec<CalendarEvent>> {
        let now = Utc::now();
        let horizon = now + Duration::days(days as i64);
        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|e| e.start >= now && e.start <= horizon)
            .cloned()
            .collect())
    }

    async fn create_event(&self, event: CalendarEvent) -> Result<()> {
        self.events.write().await.push(event);
        Ok(())
    }
}

/// In-memory course/assignment/grade store.
pub struct InMemoryCourses {
    courses: RwLock<Vec<Course>>,
    assignments: RwLock<Vec<Assignment>>,
    grades: RwLock<Vec<Grade>>,
}

impl InMemoryCourses {
    pub fn new() -> Self {
        Self {
            courses: RwLock::new(Vec::new()),
            assignments: RwLock::new(Vec::new()),
            grades: RwLock::new(Vec::new()),
        }
    }

    pub fn with_data(
        courses: Vec<Course>,
        assignments: Vec<Assignment>,
        grades: Vec<Grade>,
    ) -> Self {
        Self {
            courses: RwLock::new(courses),
            assignments: RwLock::new(assignments),
            grades: RwLock::new(grades),
        }
    }
}

impl Default for InMemoryCourses {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CourseService for InMemoryCourses {
    async fn courses(&self) -> Result<Vec<Course>> {
        Ok(self.courses.read().await.clone())
    }

    async fn assignments(&self, course_id: Option<&str>) -> Result<Vec<Assignment>> {
        let assignments = self.assignments.read().await;
        Ok(assignments
            .iter()
            .filter(|a| course_id.map_or(true, |id| a.course_id == id))
            .cloned()
            .collect())
    }

    async fn grades(&self) -> Result<Vec<Grade>> {
        Ok(self.grades.read().await.clone())
    }
}

/// In-memory reminder store.
pub struct InMemoryReminders {
    reminders: RwLock<Vec<Reminder>>,
}

impl InMemoryReminders {
    pub fn new() -> Self {
        Self {
            reminders: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryReminders {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReminderService for InMemoryReminders {
    async fn add(&self, reminder: Reminder) -> Result<()> {
        self.reminders.write().await.push(reminder);
        Ok(())
    }

    async fn upcoming(&self) -> Result<Vec<Reminder>> {
        Ok(self.reminders.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_calendar_create_then_list() {
        let calendar = InMemoryCalendar::new();
        calendar
            .create_event(CalendarEvent {
                title: "Study group".to_string(),
                start: Utc::now() + Duration::hours(2),
                end: None,
                location: Some("Library".to_string()),
            })
            .await
            .unwrap();

        let events = calendar.upcoming_events(7).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Study group");
    }

    #[tokio::test]
    async fn test_calendar_horizon_filters_far_events() {
        let calendar = InMemoryCalendar::with_events(vec![CalendarEvent {
            title: "Graduation".to_string(),
            start: Utc::now() + Duration::days(300),
            end: None,
            location: None,
        }]);

        assert!(calendar.upcoming_events(7).await.unwrap().is_empty());
        assert_eq!(calendar.upcoming_events(365).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_calendar_excludes_past_events() {
        let calendar = InMemoryCalendar::with_events(vec![
            CalendarEvent {
                title: "Last week's seminar".to_string(),
                start: Utc::now() - Duration::days(7),
                end: None,
                location: None,
            },
            CalendarEvent {
                title: "Tomorrow's lab".to_string(),
                start: Utc::now() + Duration::days(1),
                end: None,
                location: None,
            },
        ]);

        let events = calendar.upcoming_events(7).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Tomorrow's lab");
    }

    #[tokio::test]
    async fn test_assignments_filter_by_course() {
        let courses = InMemoryCourses::with_data(
            vec![],
            vec![
                Assignment {
                    course_id: "bio101".to_string(),
                    name: "Lab report".to_string(),
                    due: None,
                    points: Some(20.0),
                },
                Assignment {
                    course_id: "cs200".to_string(),
                    name: "Problem set".to_string(),
                    due: None,
                    points: None,
                },
            ],
            vec![],
        );

        let all = courses.assignments(None).await.unwrap();
        assert_eq!(all.len(), 2);

        let bio = courses.assignments(Some("bio101")).await.unwrap();
        assert_eq!(bio.len(), 1);
        assert_eq!(bio[0].name, "Lab report");
    }

    #[tokio::test]
    async fn test_reminders_round_trip() {
        let reminders = InMemoryReminders::new();
        reminders
            .add(Reminder {
                title: "Submit essay".to_string(),
                due: None,
                notes: None,
            })
            .await
            .unwrap();

        let upcoming = reminders.upcoming().await.unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].title, "Submit essay");
    }
}
