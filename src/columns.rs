//! Column visibility state for the register table.
//!
//! [`ColumnVisibility`] owns the [`VisibilityMap`] of one table and writes it
//! back to its [`VisibilityStore`] after every change. Every change replaces
//! the whole map at once, so no caller ever observes a half applied preset.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, trace, warn};

use crate::storage::VisibilityStore;

/// Storage key of the persisted visibility map.
pub const VISIBILITY_STORAGE_KEY: &str = "columnsVisibility";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub key: String,
    pub label: String,
}

impl ColumnDefinition {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }

    fn matches(&self, needle: &str) -> bool {
        self.label.to_lowercase().contains(needle) || self.key.to_lowercase().contains(needle)
    }
}

#[derive(Debug, Clone)]
pub struct ColumnGroup {
    pub group_key: String,
    pub label: String,
    pub keys: HashSet<String>,
}

impl ColumnGroup {
    pub fn new(group_key: &str, label: &str, keys: &[&str]) -> Self {
        Self {
            group_key: group_key.to_string(),
            label: label.to_string(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// A named selection. `keys == None` selects every column.
#[derive(Debug, Clone)]
pub struct Preset {
    pub label: String,
    pub keys: Option<Vec<String>>,
}

impl Preset {
    pub fn all(label: &str) -> Self {
        Self {
            label: label.to_string(),
            keys: None,
        }
    }

    pub fn with_keys(label: &str, keys: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            keys: Some(keys.iter().map(|k| k.to_string()).collect()),
        }
    }
}

/// Column key to visibility. Holds exactly one entry per known column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VisibilityMap(BTreeMap<String, bool>);

impl VisibilityMap {
    /// Merge persisted state into the known columns. Unknown persisted keys
    /// are dropped, missing or non boolean entries default to visible.
    pub fn initialize(columns: &[ColumnDefinition], persisted: &Map<String, Value>) -> Self {
        let map = columns
            .iter()
            .map(|c| {
                let visible = match persisted.get(&c.key) {
                    Some(Value::Bool(b)) => *b,
                    Some(other) => {
                        debug!("Discarding malformed visibility for {}: {other}", c.key);
                        true
                    }
                    None => true,
                };
                (c.key.clone(), visible)
            })
            .collect();
        VisibilityMap(map)
    }

    /// Decode the raw persisted payload. Anything that is not a JSON object
    /// is discarded as a whole.
    pub fn decode_persisted(raw: &str) -> Map<String, Value> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(obj)) => obj,
            Ok(other) => {
                warn!("Ignoring persisted visibility, expected an object, got {other}");
                Map::new()
            }
            Err(e) => {
                warn!("Ignoring persisted visibility, invalid JSON: {e}");
                Map::new()
            }
        }
    }

    fn filled<'a>(keys: impl Iterator<Item = &'a String>, visible: bool) -> Self {
        VisibilityMap(keys.map(|k| (k.clone(), visible)).collect())
    }

    pub fn is_visible(&self, key: &str) -> bool {
        self.0.get(key).copied().unwrap_or(false)
    }

    pub fn get(&self, key: &str) -> Option<bool> {
        self.0.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn visible_count(&self) -> usize {
        self.0.values().filter(|v| **v).count()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }
}

/// One section of the column picker. `group == None` is the ungrouped bucket.
#[derive(Debug)]
pub struct ColumnBucket<'a> {
    pub group: Option<&'a ColumnGroup>,
    pub expanded: bool,
    pub columns: Vec<&'a ColumnDefinition>,
}

impl ColumnBucket<'_> {
    pub fn label(&self) -> &str {
        self.group.map(|g| g.label.as_str()).unwrap_or("Other")
    }
}

pub struct ColumnVisibility {
    columns: Vec<ColumnDefinition>,
    groups: Vec<ColumnGroup>,
    // Column key -> index into `groups`, first declaring group wins.
    group_lookup: HashMap<String, usize>,
    expanded: Vec<bool>,
    visibility: VisibilityMap,
    store: Box<dyn VisibilityStore>,
}

impl ColumnVisibility {
    pub fn new(
        columns: Vec<ColumnDefinition>,
        groups: Vec<ColumnGroup>,
        store: Box<dyn VisibilityStore>,
    ) -> Self {
        let persisted = match store.load(VISIBILITY_STORAGE_KEY) {
            Ok(Some(raw)) => VisibilityMap::decode_persisted(&raw),
            Ok(None) => Map::new(),
            Err(e) => {
                warn!("Could not read column visibility from {}: {e}", store.name());
                Map::new()
            }
        };
        let visibility = VisibilityMap::initialize(&columns, &persisted);

        let mut group_lookup = HashMap::new();
        for (gidx, group) in groups.iter().enumerate() {
            for key in group.keys.iter() {
                group_lookup.entry(key.clone()).or_insert(gidx);
            }
        }
        let expanded = vec![true; groups.len()];

        debug!(
            "Column visibility ready: {}/{} visible, backend {}",
            visibility.visible_count(),
            visibility.len(),
            store.name()
        );

        Self {
            columns,
            groups,
            group_lookup,
            expanded,
            visibility,
            store,
        }
    }

    pub fn columns(&self) -> &[ColumnDefinition] {
        &self.columns
    }

    pub fn visibility(&self) -> &VisibilityMap {
        &self.visibility
    }

    pub fn is_visible(&self, key: &str) -> bool {
        self.visibility.is_visible(key)
    }

    pub fn visible_count(&self) -> usize {
        self.visibility.visible_count()
    }

    pub fn can_select_all(&self) -> bool {
        self.visible_count() < self.columns.len()
    }

    pub fn can_deselect_all(&self) -> bool {
        self.visible_count() > 0
    }

    /// Visible columns in declaration order.
    pub fn visible_columns(&self) -> Vec<&ColumnDefinition> {
        self.columns
            .iter()
            .filter(|c| self.visibility.is_visible(&c.key))
            .collect()
    }

    /// Flip one column. Unknown keys are ignored.
    pub fn toggle(&mut self, key: &str) {
        let Some(current) = self.visibility.get(key) else {
            debug!("Toggle of unknown column {key} ignored");
            return;
        };
        let mut next = self.visibility.clone();
        next.0.insert(key.to_string(), !current);
        self.replace(next);
    }

    /// Show exactly `keys` (restricted to known columns), or everything for `None`.
    pub fn apply_preset<S: AsRef<str>>(&mut self, keys: Option<&[S]>) {
        let next = match keys {
            None => VisibilityMap::filled(self.visibility.keys(), true),
            Some(keys) => {
                let mut next = VisibilityMap::filled(self.visibility.keys(), false);
                for key in keys {
                    if let Some(v) = next.0.get_mut(key.as_ref()) {
                        *v = true;
                    }
                }
                next
            }
        };
        self.replace(next);
    }

    pub fn apply(&mut self, preset: &Preset) {
        trace!("Applying preset {}", preset.label);
        self.apply_preset(preset.keys.as_deref());
    }

    pub fn select_all(&mut self) {
        self.apply_preset::<&str>(None);
    }

    pub fn deselect_all(&mut self) {
        let next = VisibilityMap::filled(self.visibility.keys(), false);
        self.replace(next);
    }

    fn replace(&mut self, next: VisibilityMap) {
        self.visibility = next;
        self.persist();
    }

    fn persist(&self) {
        let json = match serde_json::to_string(&self.visibility) {
            Ok(json) => json,
            Err(e) => {
                warn!("Could not encode column visibility: {e}");
                return;
            }
        };
        if let Err(e) = self.store.save(VISIBILITY_STORAGE_KEY, &json) {
            warn!(
                "Could not persist column visibility to {}, keeping it in memory: {e}",
                self.store.name()
            );
        }
    }

    /// Case-insensitive substring match on label or key.
    pub fn filter_columns(&self, query: &str) -> Vec<&ColumnDefinition> {
        let needle = query.trim().to_lowercase();
        self.columns
            .iter()
            .filter(|c| needle.is_empty() || c.matches(&needle))
            .collect()
    }

    /// Partition columns into their groups, in group declaration order, with
    /// the ungrouped bucket last. Empty buckets are left out.
    pub fn group_columns<'a>(&'a self, filtered: &[&'a ColumnDefinition]) -> Vec<ColumnBucket<'a>> {
        let mut grouped: Vec<Vec<&ColumnDefinition>> = vec![Vec::new(); self.groups.len()];
        let mut ungrouped = Vec::new();
        for &column in filtered {
            match self.group_lookup.get(&column.key) {
                Some(&gidx) => grouped[gidx].push(column),
                None => ungrouped.push(column),
            }
        }

        let mut buckets: Vec<ColumnBucket> = grouped
            .into_iter()
            .enumerate()
            .filter(|(_, cols)| !cols.is_empty())
            .map(|(gidx, columns)| ColumnBucket {
                group: Some(&self.groups[gidx]),
                expanded: self.expanded[gidx],
                columns,
            })
            .collect();
        if !ungrouped.is_empty() {
            buckets.push(ColumnBucket {
                group: None,
                expanded: true,
                columns: ungrouped,
            });
        }
        buckets
    }

    pub fn is_group_expanded(&self, group_key: &str) -> bool {
        self.groups
            .iter()
            .position(|g| g.group_key == group_key)
            .map(|gidx| self.expanded[gidx])
            .unwrap_or(true)
    }

    pub fn toggle_group(&mut self, group_key: &str) {
        if let Some(gidx) = self.groups.iter().position(|g| g.group_key == group_key) {
            self.expanded[gidx] = !self.expanded[gidx];
            trace!("Group {group_key} expanded: {}", self.expanded[gidx]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStore, StoreError, StoreResult};
    use std::sync::Arc;

    fn defs(keys: &[&str]) -> Vec<ColumnDefinition> {
        keys.iter()
            .map(|k| ColumnDefinition::new(*k, k.to_uppercase()))
            .collect()
    }

    fn manager(keys: &[&str], persisted: Option<&str>) -> ColumnVisibility {
        let store = match persisted {
            Some(raw) => MemoryStore::with_entry(VISIBILITY_STORAGE_KEY, raw),
            None => MemoryStore::new(),
        };
        ColumnVisibility::new(defs(keys), Vec::new(), Box::new(store))
    }

    fn snapshot(m: &ColumnVisibility) -> Vec<(String, bool)> {
        m.visibility()
            .keys()
            .map(|k| (k.clone(), m.is_visible(k)))
            .collect()
    }

    // Shares its entries with the test so saved payloads can be inspected.
    struct SharedStore(Arc<MemoryStore>);

    impl VisibilityStore for SharedStore {
        fn name(&self) -> &str {
            "SharedStore"
        }
        fn load(&self, key: &str) -> StoreResult<Option<String>> {
            self.0.load(key)
        }
        fn save(&self, key: &str, value: &str) -> StoreResult<()> {
            self.0.save(key, value)
        }
        fn clear(&self, key: &str) -> StoreResult<()> {
            self.0.clear(key)
        }
    }

    struct BrokenStore;

    impl VisibilityStore for BrokenStore {
        fn name(&self) -> &str {
            "BrokenStore"
        }
        fn load(&self, _key: &str) -> StoreResult<Option<String>> {
            Err(StoreError::Unavailable("quota exceeded".into()))
        }
        fn save(&self, _key: &str, _value: &str) -> StoreResult<()> {
            Err(StoreError::Unavailable("quota exceeded".into()))
        }
        fn clear(&self, _key: &str) -> StoreResult<()> {
            Err(StoreError::Unavailable("quota exceeded".into()))
        }
    }

    #[test]
    fn initialize_merges_persisted_state() {
        let m = manager(&["a", "b", "c"], Some(r#"{"a": false, "z": true}"#));
        assert_eq!(
            snapshot(&m),
            vec![
                ("a".to_string(), false),
                ("b".to_string(), true),
                ("c".to_string(), true)
            ]
        );
        assert!(!m.visibility().contains("z"));
    }

    #[test]
    fn initialize_key_set_follows_columns() {
        let persisted = VisibilityMap::decode_persisted(r#"{"x": true, "y": false, "b": false}"#);
        let map = VisibilityMap::initialize(&defs(&["a", "b"]), &persisted);
        let keys: Vec<&String> = map.keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(map.get("b"), Some(false));
    }

    #[test]
    fn malformed_json_falls_back_to_visible() {
        let m = manager(&["a", "b"], Some("{not json"));
        assert_eq!(m.visible_count(), 2);

        let m = manager(&["a", "b"], Some("[false, false]"));
        assert_eq!(m.visible_count(), 2);
    }

    #[test]
    fn non_boolean_entry_is_discarded() {
        let m = manager(&["a", "b"], Some(r#"{"a": "false", "b": false}"#));
        assert!(m.is_visible("a"));
        assert!(!m.is_visible("b"));
    }

    #[test]
    fn apply_preset_replaces_selection() {
        let mut m = manager(&["a", "b", "c"], Some(r#"{"a": false}"#));
        m.apply_preset(Some(&["a", "c"][..]));
        assert_eq!(
            snapshot(&m),
            vec![
                ("a".to_string(), true),
                ("b".to_string(), false),
                ("c".to_string(), true)
            ]
        );
    }

    #[test]
    fn apply_preset_ignores_unknown_keys() {
        let mut m = manager(&["a", "b"], None);
        m.apply_preset(Some(&["b", "nope"][..]));
        assert_eq!(m.visible_count(), 1);
        assert!(m.is_visible("b"));
        assert!(!m.visibility().contains("nope"));
    }

    #[test]
    fn apply_preset_none_equals_select_all() {
        let mut by_preset = manager(&["a", "b", "c"], Some(r#"{"a": false, "b": false}"#));
        let mut by_select = manager(&["a", "b", "c"], Some(r#"{"a": false, "b": false}"#));
        by_preset.apply(&Preset::all("All"));
        by_select.select_all();
        assert_eq!(by_preset.visibility(), by_select.visibility());
        assert_eq!(by_preset.visible_count(), 3);
    }

    #[test]
    fn apply_preset_is_idempotent() {
        let preset = Preset::with_keys("Labels", &["a"]);
        let mut m = manager(&["a", "b"], None);
        m.apply(&preset);
        let once = m.visibility().clone();
        m.apply(&preset);
        assert_eq!(&once, m.visibility());
    }

    #[test]
    fn toggle_twice_restores_state() {
        let mut m = manager(&["a", "b"], Some(r#"{"b": false}"#));
        let before = m.visibility().clone();
        m.toggle("a");
        assert!(!m.is_visible("a"));
        m.toggle("a");
        assert_eq!(&before, m.visibility());
    }

    #[test]
    fn toggle_unknown_key_is_noop() {
        let mut m = manager(&["a"], None);
        let before = m.visibility().clone();
        m.toggle("missing");
        assert_eq!(&before, m.visibility());
    }

    #[test]
    fn visible_count_after_select_and_deselect() {
        let mut m = manager(&["a", "b", "c"], None);
        m.deselect_all();
        assert_eq!(m.visible_count(), 0);
        assert!(!m.can_deselect_all());
        assert!(m.can_select_all());

        m.select_all();
        assert_eq!(m.visible_count(), 3);
        assert!(!m.can_select_all());
        assert!(m.can_deselect_all());
    }

    #[test]
    fn every_mutation_is_persisted() {
        let shared = Arc::new(MemoryStore::new());
        let mut m = ColumnVisibility::new(
            defs(&["a", "b"]),
            Vec::new(),
            Box::new(SharedStore(shared.clone())),
        );
        m.toggle("a");
        let saved = shared.load(VISIBILITY_STORAGE_KEY).unwrap().unwrap();
        assert_eq!(saved, r#"{"a":false,"b":true}"#);

        m.apply_preset(Some(&["a"][..]));
        let saved = shared.load(VISIBILITY_STORAGE_KEY).unwrap().unwrap();
        assert_eq!(saved, r#"{"a":true,"b":false}"#);

        m.deselect_all();
        let saved = shared.load(VISIBILITY_STORAGE_KEY).unwrap().unwrap();
        assert_eq!(saved, r#"{"a":false,"b":false}"#);

        m.select_all();
        let saved = shared.load(VISIBILITY_STORAGE_KEY).unwrap().unwrap();
        assert_eq!(saved, r#"{"a":true,"b":true}"#);

        m.deselect_all();

        // A fresh manager on the same store sees the last state
        let reloaded = ColumnVisibility::new(
            defs(&["a", "b"]),
            Vec::new(),
            Box::new(SharedStore(shared)),
        );
        assert_eq!(reloaded.visibility(), m.visibility());
        assert_eq!(reloaded.visible_count(), 0);
    }

    #[test]
    fn persistence_failure_keeps_memory_state() {
        let mut m = ColumnVisibility::new(defs(&["a", "b"]), Vec::new(), Box::new(BrokenStore));
        assert_eq!(m.visible_count(), 2);
        m.toggle("b");
        assert!(!m.is_visible("b"));
        m.deselect_all();
        assert_eq!(m.visible_count(), 0);
    }

    #[test]
    fn filter_matches_label_or_key_case_insensitive() {
        let columns = vec![
            ColumnDefinition::new("departmentName", "Department"),
            ColumnDefinition::new("quantity", "Qty"),
            ColumnDefinition::new("name", "Asset name"),
        ];
        let m = ColumnVisibility::new(columns, Vec::new(), Box::new(MemoryStore::new()));

        let hits: Vec<&str> = m.filter_columns("NAME").iter().map(|c| c.key.as_str()).collect();
        assert_eq!(hits, vec!["departmentName", "name"]);

        let hits: Vec<&str> = m.filter_columns("qty").iter().map(|c| c.key.as_str()).collect();
        assert_eq!(hits, vec!["quantity"]);

        assert_eq!(m.filter_columns("").len(), 3);
        assert!(m.filter_columns("zzz").is_empty());
    }

    #[test]
    fn grouping_first_group_wins_and_ungrouped_last() {
        let groups = vec![
            ColumnGroup::new("ident", "Identification", &["a", "b"]),
            ColumnGroup::new("other", "Other stuff", &["b", "c"]),
        ];
        let m = ColumnVisibility::new(
            defs(&["a", "b", "c", "d"]),
            groups,
            Box::new(MemoryStore::new()),
        );
        let filtered = m.filter_columns("");
        let buckets = m.group_columns(&filtered);

        assert_eq!(buckets.len(), 3);
        let keys = |b: &ColumnBucket| b.columns.iter().map(|c| c.key.clone()).collect::<Vec<_>>();
        assert_eq!(buckets[0].group.unwrap().group_key, "ident");
        assert_eq!(keys(&buckets[0]), vec!["a", "b"]);
        assert_eq!(keys(&buckets[1]), vec!["c"]);
        assert!(buckets[2].group.is_none());
        assert_eq!(keys(&buckets[2]), vec!["d"]);
    }

    #[test]
    fn grouping_skips_empty_groups_after_filter() {
        let groups = vec![
            ColumnGroup::new("ident", "Identification", &["a"]),
            ColumnGroup::new("stock", "Stock", &["b"]),
        ];
        let m = ColumnVisibility::new(defs(&["a", "b"]), groups, Box::new(MemoryStore::new()));
        let filtered = m.filter_columns("b");
        let buckets = m.group_columns(&filtered);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].label(), "Stock");
    }

    #[test]
    fn groups_expand_independently() {
        let groups = vec![
            ColumnGroup::new("ident", "Identification", &["a"]),
            ColumnGroup::new("stock", "Stock", &["b"]),
        ];
        let mut m = ColumnVisibility::new(defs(&["a", "b"]), groups, Box::new(MemoryStore::new()));
        assert!(m.is_group_expanded("ident"));
        m.toggle_group("ident");
        assert!(!m.is_group_expanded("ident"));
        assert!(m.is_group_expanded("stock"));

        let filtered = m.filter_columns("");
        let buckets = m.group_columns(&filtered);
        assert!(!buckets[0].expanded);
        assert!(buckets[1].expanded);
    }
}
