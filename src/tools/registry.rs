// Tool registry
//
// Owns the id -> tool map. Default-tool registration runs exactly once,
// even under concurrent first use: the first caller runs it to completion
// behind a one-shot gate and everyone else observes the finished map.
// Constructed at the composition root with the service handles the default
// tools need; there is no global instance.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};

use crate::error::ToolError;
use crate::services::ServiceHandles;
use crate::tools::implementations::default_tools;
use crate::tools::types::{PermissionLevel, ToolDefinition, ToolDescriptor};

/// A callable capability with a declared descriptor and execution behavior.
#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;

    /// Decode the raw arguments into this tool's typed input and run it.
    /// Execution may perform I/O against external services.
    async fn execute(&self, input: Value) -> Result<String, ToolError>;
}

/// Conjunctive lookup filter. Unset fields impose no constraint.
#[derive(Debug, Clone, Default)]
pub struct ToolFilter {
    pub domain: Option<String>,
    pub keyword: Option<String>,
    pub max_permission: Option<PermissionLevel>,
}

impl ToolFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn with_max_permission(mut self, ceiling: PermissionLevel) -> Self {
        self.max_permission = Some(ceiling);
        self
    }

    fn matches(&self, descriptor: &ToolDescriptor) -> bool {
        if let Some(domain) = &self.domain {
            if !descriptor.domain.eq_ignore_ascii_case(domain) {
                return false;
            }
        }

        if let Some(keyword) = &self.keyword {
            let needle = keyword.to_lowercase();
            let hit = descriptor
                .trigger_keywords
                .iter()
                .any(|k| k.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        if let Some(ceiling) = self.max_permission {
            if descriptor.required_permission > ceiling {
                return false;
            }
        }

        true
    }
}

/// Concurrency-safe owner of the available tools.
pub struct ToolRegistry {
    services: ServiceHandles,
    init: OnceCell<()>,
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
}

impl ToolRegistry {
    pub fn new(services: ServiceHandles) -> Self {
        Self {
            services,
            init: OnceCell::new(),
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Idempotent one-shot default registration. Concurrent first callers
    /// wait for the same completed initialization.
    pub async fn ensure_initialized(&self) {
        self.init
            .get_or_init(|| async {
                let defaults = default_tools(&self.services);
                let mut tools = self.tools.write().await;
                for tool in defaults {
                    tools.insert(tool.descriptor().id.clone(), tool);
                }
                tracing::info!(count = tools.len(), "registered default tools");
            })
            .await;
    }

    /// Insert or overwrite a tool by id. Runs default registration first so
    /// a caller-supplied tool is never clobbered by it later.
    pub async fn register(&self, tool: Arc<dyn Tool>) {
        self.ensure_initialized().await;
        let id = tool.descriptor().id.clone();
        let replaced = self.tools.write().await.insert(id.clone(), tool);
        if replaced.is_some() {
            tracing::debug!(tool = %id, "replaced existing tool registration");
        }
    }

    pub async fn get(&self, id: &str) -> Option<Arc<dyn Tool>> {
        self.ensure_initialized().await;
        self.tools.read().await.get(id).cloned()
    }

    pub async fn get_all(&self) -> Vec<Arc<dyn Tool>> {
        self.ensure_initialized().await;
        let tools = self.tools.read().await;
        let mut all: Vec<Arc<dyn Tool>> = tools.values().cloned().collect();
        all.sort_by(|a, b| a.descriptor().id.cmp(&b.descriptor().id));
        all
    }

    /// Tools matching every set filter field.
    pub async fn get_tools(&self, filter: &ToolFilter) -> Vec<Arc<dyn Tool>> {
        self.get_all()
            .await
            .into_iter()
            .filter(|tool| filter.matches(tool.descriptor()))
            .collect()
    }

    /// Wire-format definitions for the matching tools.
    pub async fn definitions(&self, filter: &ToolFilter) -> Vec<ToolDefinition> {
        self.get_tools(filter)
            .await
            .iter()
            .map(|tool| tool.descriptor().to_definition())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::types::ParamSpec;

    struct StubTool {
        descriptor: ToolDescriptor,
    }

    impl StubTool {
        fn new(id: &str, domain: &str, keywords: &[&str], permission: PermissionLevel) -> Self {
            Self {
                descriptor: ToolDescriptor {
                    id: id.to_string(),
                    name: id.to_string(),
                    description: format!("stub {id}"),
                    domain: domain.to_string(),
                    trigger_keywords: keywords.iter().map(|k| k.to_string()).collect(),
                    required_permission: permission,
                    parameters: vec![ParamSpec::optional("q", "string", "x", "query")],
                },
            }
        }
    }

    #[async_trait]
    impl Tool for StubTool {
        fn descriptor(&self) -> &ToolDescriptor {
            &self.descriptor
        }

        async fn execute(&self, _input: Value) -> Result<String, ToolError> {
            Ok("ok".to_string())
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::new(ServiceHandles::in_memory())
    }

    #[tokio::test]
    async fn test_default_tools_registered_once() {
        let registry = registry();
        let first = registry.get_all().await.len();
        let second = registry.get_all().await.len();
        assert_eq!(first, 7);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_concurrent_first_use_initializes_once() {
        let registry = Arc::new(registry());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move { registry.get_all().await.len() }));
        }
        for handle in handles {
            // Every task observes the complete map, never a partial one
            assert_eq!(handle.await.unwrap(), 7);
        }
    }

    #[tokio::test]
    async fn test_register_overwrites_by_id() {
        let registry = registry();
        registry.ensure_initialized().await;
        let before = registry.get_all().await.len();

        registry
            .register(Arc::new(StubTool::new(
                "get_courses",
                "courses",
                &["course"],
                PermissionLevel::Basic,
            )))
            .await;

        assert_eq!(registry.get_all().await.len(), before);
        let tool = registry.get("get_courses").await.unwrap();
        assert_eq!(tool.descriptor().description, "stub get_courses");
    }

    #[tokio::test]
    async fn test_register_before_first_use_survives_default_init() {
        // Registering under a default id before any lookup must win over
        // the lazy default registration that runs afterwards
        let registry = registry();
        registry
            .register(Arc::new(StubTool::new(
                "get_courses",
                "courses",
                &["course"],
                PermissionLevel::Basic,
            )))
            .await;

        let tool = registry.get("get_courses").await.unwrap();
        assert_eq!(tool.descriptor().description, "stub get_courses");
        assert_eq!(registry.get_all().await.len(), 7);
    }

    #[tokio::test]
    async fn test_get_unknown_tool() {
        assert!(registry().get("no_such_tool").await.is_none());
    }

    #[tokio::test]
    async fn test_filter_domain_case_insensitive() {
        let registry = registry();
        let tools = registry
            .get_tools(&ToolFilter::new().with_domain("CALENDAR"))
            .await;
        assert_eq!(tools.len(), 2);
        for tool in tools {
            assert_eq!(tool.descriptor().domain, "calendar");
        }
    }

    #[tokio::test]
    async fn test_filter_keyword_substring_case_insensitive() {
        let registry = registry();
        let tools = registry
            .get_tools(&ToolFilter::new().with_keyword("REMIND"))
            .await;
        assert!(!tools.is_empty());
        for tool in tools {
            assert_eq!(tool.descriptor().domain, "reminders");
        }
    }

    #[tokio::test]
    async fn test_filter_permission_ceiling() {
        let registry = registry();
        registry
            .register(Arc::new(StubTool::new(
                "admin_tool",
                "admin",
                &["admin"],
                PermissionLevel::Full,
            )))
            .await;

        let tools = registry
            .get_tools(&ToolFilter::new().with_max_permission(PermissionLevel::Elevated))
            .await;
        assert!(tools
            .iter()
            .all(|t| t.descriptor().required_permission <= PermissionLevel::Elevated));
        assert!(!tools.iter().any(|t| t.descriptor().id == "admin_tool"));
    }

    #[tokio::test]
    async fn test_filters_are_conjunctive() {
        let registry = registry();
        // Calendar domain AND a reminders-only keyword: nothing matches
        let tools = registry
            .get_tools(
                &ToolFilter::new()
                    .with_domain("calendar")
                    .with_keyword("reminder"),
            )
            .await;
        assert!(tools.is_empty());
    }

    #[tokio::test]
    async fn test_unset_filter_matches_everything() {
        let registry = registry();
        assert_eq!(
            registry.get_tools(&ToolFilter::new()).await.len(),
            registry.get_all().await.len()
        );
    }
}
