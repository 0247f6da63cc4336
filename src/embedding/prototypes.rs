// Tool intent prototypes
//
// Each tool gets a centroid vector built from a handful of exemplar
// phrases. Exemplars that fail to vectorize are skipped, not zero-filled.
// Prototypes are computed at most once per tool id and cached for the
// process lifetime.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{mean_vectors, EmbeddingTable};

/// Static mapping from tool id to its exemplar trigger phrases.
#[derive(Debug, Clone, Default)]
pub struct ExemplarSet {
    entries: Vec<(String, Vec<String>)>,
}

impl ExemplarSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exemplars for the default campus tools, 3-5 phrases each.
    pub fn defaults() -> Self {
        let mut set = Self::new();
        set.insert(
            "list_calendar_events",
            &[
                "what's on my calendar",
                "show my schedule for this week",
                "do i have any events tomorrow",
                "what meetings do i have today",
            ],
        );
        set.insert(
            "create_calendar_event",
            &[
                "add an event to my calendar",
                "schedule a meeting for friday",
                "put a study session on my calendar",
            ],
        );
        set.insert(
            "get_courses",
            &[
                "show me my canvas courses",
                "what classes am i taking",
                "list my courses this semester",
            ],
        );
        set.insert(
            "get_assignments",
            &[
                "what assignments are due",
                "show my upcoming homework",
                "any assignments due this week",
                "what do i need to turn in",
            ],
        );
        set.insert(
            "get_grades",
            &[
                "what are my grades",
                "show my current grade in biology",
                "how am i doing in my classes",
            ],
        );
        set.insert(
            "add_reminder",
            &[
                "remind me to study tonight",
                "set a reminder for my exam",
                "add a reminder to submit my essay",
            ],
        );
        set.insert(
            "list_reminders",
            &[
                "what reminders do i have",
                "show my reminders",
                "list my upcoming reminders",
            ],
        );
        set
    }

    pub fn insert(&mut self, tool_id: impl Into<String>, phrases: &[&str]) {
        self.entries.push((
            tool_id.into(),
            phrases.iter().map(|p| p.to_string()).collect(),
        ));
    }

    pub fn get(&self, tool_id: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(id, _)| id == tool_id)
            .map(|(_, phrases)| phrases.as_slice())
    }

    pub fn tool_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Centroid of the exemplar vectors that resolve. `None` when none do.
/// Deterministic for a fixed exemplar list and table.
pub fn prototype(table: &EmbeddingTable, exemplars: &[String]) -> Option<Vec<f32>> {
    let resolved: Vec<Vec<f32>> = exemplars
        .iter()
        .filter_map(|phrase| table.vector(phrase))
        .collect();

    if resolved.len() < exemplars.len() {
        tracing::debug!(
            resolved = resolved.len(),
            total = exemplars.len(),
            "some exemplars did not vectorize"
        );
    }

    mean_vectors(&resolved)
}

/// Caches one prototype per tool id, computed lazily on first request.
pub struct PrototypeStore {
    table: Arc<EmbeddingTable>,
    exemplars: ExemplarSet,
    cache: RwLock<HashMap<String, Option<Arc<Vec<f32>>>>>,
}

impl PrototypeStore {
    pub fn new(table: Arc<EmbeddingTable>, exemplars: ExemplarSet) -> Self {
        Self {
            table,
            exemplars,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The prototype for a tool id, computing and caching it on first use.
    /// A tool with no resolvable exemplars caches `None` and never retries.
    pub fn get(&self, tool_id: &str) -> Option<Arc<Vec<f32>>> {
        if let Some(cached) = self.cache.read().expect("prototype cache poisoned").get(tool_id) {
            return cached.clone();
        }

        let mut cache = self.cache.write().expect("prototype cache poisoned");
        // Another task may have filled the slot while we waited on the lock.
        if let Some(cached) = cache.get(tool_id) {
            return cached.clone();
        }

        let computed = self
            .exemplars
            .get(tool_id)
            .and_then(|phrases| prototype(&self.table, phrases))
            .map(Arc::new);

        cache.insert(tool_id.to_string(), computed.clone());
        computed
    }

    pub fn tool_ids(&self) -> Vec<String> {
        self.exemplars.tool_ids().map(String::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Arc<EmbeddingTable> {
        Arc::new(
            EmbeddingTable::from_pairs(vec![
                ("courses", vec![1.0, 0.0]),
                ("grades", vec![0.0, 1.0]),
            ])
            .unwrap(),
        )
    }

    fn phrases(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_prototype_is_mean_of_resolvable_exemplars() {
        let table = table();
        // "courses" resolves to [1,0]; "grades" to [0,1]; third is skipped
        let proto = prototype(&table, &phrases(&["courses", "grades", "xyzzy"])).unwrap();
        assert_eq!(proto, vec![0.5, 0.5]);
    }

    #[test]
    fn test_prototype_none_when_nothing_resolves() {
        let table = table();
        assert!(prototype(&table, &phrases(&["xyzzy", "plugh"])).is_none());
    }

    #[test]
    fn test_prototype_deterministic() {
        let table = table();
        let e = phrases(&["courses", "grades"]);
        assert_eq!(prototype(&table, &e), prototype(&table, &e));
    }

    #[test]
    fn test_store_caches_per_tool_id() {
        let mut exemplars = ExemplarSet::new();
        exemplars.insert("get_courses", &["courses"]);
        let store = PrototypeStore::new(table(), exemplars);

        let first = store.get("get_courses").unwrap();
        let second = store.get("get_courses").unwrap();
        // Same Arc: computed once, served from cache after
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_store_caches_negative_result() {
        let mut exemplars = ExemplarSet::new();
        exemplars.insert("mystery", &["xyzzy"]);
        let store = PrototypeStore::new(table(), exemplars);

        assert!(store.get("mystery").is_none());
        assert!(store.get("mystery").is_none());
        // The miss is cached, not recomputed
        assert!(store
            .cache
            .read()
            .unwrap()
            .get("mystery")
            .is_some());
    }

    #[test]
    fn test_store_unknown_tool_id() {
        let store = PrototypeStore::new(table(), ExemplarSet::new());
        assert!(store.get("never_registered").is_none());
    }

    #[test]
    fn test_default_exemplars_cover_default_tools() {
        let set = ExemplarSet::defaults();
        for id in [
            "list_calendar_events",
            "create_calendar_event",
            "get_courses",
            "get_assignments",
            "get_grades",
            "add_reminder",
            "list_reminders",
        ] {
            let phrases = set.get(id).unwrap();
            assert!(
                (3..=5).contains(&phrases.len()),
                "{} has {} exemplars",
                id,
                phrases.len()
            );
        }
    }
}
