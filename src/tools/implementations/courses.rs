// Course tools - enrolled courses, assignments, and grades

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::error::ToolError;
use crate::services::CourseService;
use crate::tools::registry::Tool;
use crate::tools::types::{decode_input, ParamSpec, PermissionLevel, ToolDescriptor};

fn execution_error(tool: &str, source: anyhow::Error) -> ToolError {
    ToolError::Execution {
        tool: tool.to_string(),
        source,
    }
}

pub struct GetCoursesTool {
    courses: Arc<dyn CourseService>,
    descriptor: ToolDescriptor,
}

impl GetCoursesTool {
    pub fn new(courses: Arc<dyn CourseService>) -> Self {
        Self {
            courses,
            descriptor: ToolDescriptor {
                id: "get_courses".to_string(),
                name: "Get Courses".to_string(),
                description: "List the courses the user is currently enrolled in.".to_string(),
                domain: "courses".to_string(),
                trigger_keywords: vec![
                    "courses".to_string(),
                    "classes".to_string(),
                    "canvas".to_string(),
                    "enrolled".to_string(),
                ],
                required_permission: PermissionLevel::Basic,
                parameters: vec![],
            },
        }
    }
}

#[async_trait]
impl Tool for GetCoursesTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        #[derive(Deserialize)]
        struct NoInput {}
        let _: NoInput = decode_input(&self.descriptor.id, input)?;

        let courses = self
            .courses
            .courses()
            .await
            .map_err(|e| execution_error(&self.descriptor.id, e))?;

        if courses.is_empty() {
            return Ok("No enrolled courses found.".to_string());
        }

        let lines: Vec<String> = courses
            .iter()
            .map(|c| format!("- {}: {}", c.code, c.name))
            .collect();
        Ok(format!(
            "Enrolled in {} course(s):\n{}",
            courses.len(),
            lines.join("\n")
        ))
    }
}

#[derive(Debug, Deserialize)]
struct AssignmentsInput {
    #[serde(default)]
    course_id: Option<String>,
}

pub struct GetAssignmentsTool {
    courses: Arc<dyn CourseService>,
    descriptor: ToolDescriptor,
}

impl GetAssignmentsTool {
    pub fn new(courses: Arc<dyn CourseService>) -> Self {
        Self {
            courses,
            descriptor: ToolDescriptor {
                id: "get_assignments".to_string(),
                name: "Get Assignments".to_string(),
                description: "List upcoming assignments, optionally for a single course."
                    .to_string(),
                domain: "courses".to_string(),
                trigger_keywords: vec![
                    "assignments".to_string(),
                    "homework".to_string(),
                    "due".to_string(),
                    "deadline".to_string(),
                ],
                required_permission: PermissionLevel::Basic,
                parameters: vec![ParamSpec::optional(
                    "course_id",
                    "string",
                    "bio101",
                    "Narrow results to one course id",
                )],
            },
        }
    }
}

#[async_trait]
impl Tool for GetAssignmentsTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        let input: AssignmentsInput = decode_input(&self.descriptor.id, input)?;

        let assignments = self
            .courses
            .assignments(input.course_id.as_deref())
            .await
            .map_err(|e| execution_error(&self.descriptor.id, e))?;

        if assignments.is_empty() {
            return Ok("No upcoming assignments.".to_string());
        }

        let lines: Vec<String> = assignments
            .iter()
            .map(|a| {
                let due = a
                    .due
                    .map(|d| d.format("due %b %e %H:%M").to_string())
                    .unwrap_or_else(|| "no due date".to_string());
                format!("- {} [{}] ({})", a.name, a.course_id, due)
            })
            .collect();
        Ok(format!(
            "{} assignment(s):\n{}",
            assignments.len(),
            lines.join("\n")
        ))
    }
}

pub struct GetGradesTool {
    courses: Arc<dyn CourseService>,
    descriptor: ToolDescriptor,
}

impl GetGradesTool {
    pub fn new(courses: Arc<dyn CourseService>) -> Self {
        Self {
            courses,
            descriptor: ToolDescriptor {
                id: "get_grades".to_string(),
                name: "Get Grades".to_string(),
                description: "Show the user's current grade in each course.".to_string(),
                domain: "courses".to_string(),
                trigger_keywords: vec![
                    "grades".to_string(),
                    "grade".to_string(),
                    "score".to_string(),
                    "gpa".to_string(),
                ],
                required_permission: PermissionLevel::Basic,
                parameters: vec![],
            },
        }
    }
}

#[async_trait]
impl Tool for GetGradesTool {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    async fn execute(&self, input: Value) -> Result<String, ToolError> {
        #[derive(Deserialize)]
        struct NoInput {}
        let _: NoInput = decode_input(&self.descriptor.id, input)?;

        let grades = self
            .courses
            .grades()
            .await
            .map_err(|e| execution_error(&self.descriptor.id, e))?;

        if grades.is_empty() {
            return Ok("No grades posted yet.".to_string());
        }

        let lines: Vec<String> = grades
            .iter()
            .map(|g| {
                let score = g
                    .score
                    .map(|s| format!("{s:.1}%"))
                    .unwrap_or_else(|| "ungraded".to_string());
                match &g.letter {
                    Some(letter) => format!("- {}: {} ({})", g.course_name, score, letter),
                    None => format!("- {}: {}", g.course_name, score),
                }
            })
            .collect();
        Ok(format!("Current grades:\n{}", lines.join("\n")))
    }
}
