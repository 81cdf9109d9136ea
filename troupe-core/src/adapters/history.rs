use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::fields::{into_row, object_list, text, timestamp};
use super::{EntityAdapter, EntityStore};
use crate::backend::{Order, Row};
use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EditAction {
    Create,
    #[default]
    Update,
    Delete,
}

impl EditAction {
    pub fn parse(s: &str) -> Self {
        match s {
            "create" => EditAction::Create,
            "delete" => EditAction::Delete,
            _ => EditAction::Update,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EditAction::Create => "create",
            EditAction::Update => "update",
            EditAction::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChange {
    pub field: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

/// Audit log line for an edit made anywhere in the app.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditHistoryEntry {
    pub id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub user: String,
    pub action: EditAction,
    /// What was edited, e.g. a staff name or scenario title.
    pub target: String,
    pub summary: String,
    /// Area of the app: "staff", "scenario", "schedule", ...
    pub category: String,
    pub changes: Vec<FieldChange>,
}

impl EditHistoryEntry {
    pub fn new(
        user: impl Into<String>,
        action: EditAction,
        target: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id: String::new(),
            created_at: None,
            user: user.into(),
            action,
            target: target.into(),
            summary: String::new(),
            category: category.into(),
            changes: Vec::new(),
        }
    }
}

/// Old and new values may be any JSON; they are kept as display strings.
fn change_value(row: &Row, field: &str) -> Option<String> {
    match row.get(field)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl EntityAdapter for EditHistoryEntry {
    const TABLE: &'static str = "edit_history";
    const FALLBACK_KEY: &'static str = "edit_history";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row) -> Self {
        let changes = object_list(row, "changes")
            .into_iter()
            .map(|change| FieldChange {
                field: text(change, "field"),
                old_value: change_value(change, "old_value"),
                new_value: change_value(change, "new_value"),
            })
            .collect();

        Self {
            id: text(row, "id"),
            created_at: timestamp(row, "created_at"),
            user: text(row, "user"),
            action: EditAction::parse(&text(row, "action")),
            target: text(row, "target"),
            summary: text(row, "summary"),
            category: text(row, "category"),
            changes,
        }
    }

    fn to_row(&self) -> Row {
        let changes: Vec<Value> = self
            .changes
            .iter()
            .map(|c| {
                json!({
                    "field": c.field,
                    "old_value": c.old_value,
                    "new_value": c.new_value,
                })
            })
            .collect();
        let mut row = into_row(json!({
            "id": self.id,
            "user": self.user,
            "action": self.action.as_str(),
            "target": self.target,
            "summary": self.summary,
            "category": self.category,
            "changes": changes,
        }));
        if let Some(created_at) = self.created_at {
            row.insert("created_at".to_string(), json!(created_at.to_rfc3339()));
        }
        row
    }

    fn validate(&self) -> Result<(), SyncError> {
        if self.target.trim().is_empty() {
            return Err(SyncError::Validation("history target is required".to_string()));
        }
        Ok(())
    }

    fn order() -> Option<Order> {
        Some(Order::desc("created_at"))
    }
}

impl EntityStore<EditHistoryEntry> {
    pub fn by_category(&self, category: &str) -> Vec<EditHistoryEntry> {
        self.list()
            .into_iter()
            .filter(|e| e.category == category)
            .collect()
    }

    /// The `n` newest entries.
    pub fn recent(&self, n: usize) -> Vec<EditHistoryEntry> {
        let mut entries = self.list();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries.truncate(n);
        entries
    }

    pub fn for_target(&self, target: &str) -> Vec<EditHistoryEntry> {
        self.list()
            .into_iter()
            .filter(|e| e.target == target)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::backend::{Connectivity, MemoryBackend, TableBackend};
    use crate::cache::{LocalCache, MemoryStore};

    #[test]
    fn test_from_row_changes() {
        let entry = EditHistoryEntry::from_row(&into_row(json!({
            "id": "h1",
            "created_at": "2026-10-18T12:00:00Z",
            "user": "admin@example.com",
            "action": "update",
            "target": "Aki",
            "category": "staff",
            "changes": [
                {"field": "role", "old_value": ["gm"], "new_value": ["gm", "manager"]},
                {"field": "phone", "old_value": null, "new_value": "090-0000-0000"},
                "garbage"
            ]
        })));

        assert_eq!(entry.action, EditAction::Update);
        assert_eq!(entry.changes.len(), 2);
        assert_eq!(entry.changes[0].old_value.as_deref(), Some("[\"gm\"]"));
        assert_eq!(entry.changes[1].old_value, None);
        assert_eq!(entry.changes[1].new_value.as_deref(), Some("090-0000-0000"));
    }

    #[test]
    fn test_from_row_without_changes() {
        let entry = EditHistoryEntry::from_row(&into_row(json!({
            "id": "h2",
            "action": "delete",
            "changes": "n/a"
        })));
        assert_eq!(entry.action, EditAction::Delete);
        assert!(entry.changes.is_empty());
        assert!(entry.created_at.is_none());
    }

    #[test]
    fn test_to_row_round_trip() {
        let mut entry = EditHistoryEntry::new("admin", EditAction::Create, "Midnight Manor", "scenario");
        entry.id = "h3".to_string();
        entry.changes.push(FieldChange {
            field: "title".to_string(),
            old_value: None,
            new_value: Some("Midnight Manor".to_string()),
        });
        let row = entry.to_row();
        assert_eq!(row["action"], "create");
        assert_eq!(EditHistoryEntry::from_row(&row), entry);
    }

    #[tokio::test]
    async fn test_helpers() {
        let backend = Arc::new(MemoryBackend::new());
        backend.seed(
            "edit_history",
            vec![
                into_row(json!({"id": "1", "created_at": "2026-10-01T00:00:00Z", "target": "Aki", "category": "staff"})),
                into_row(json!({"id": "2", "created_at": "2026-10-03T00:00:00Z", "target": "Midnight Manor", "category": "scenario"})),
                into_row(json!({"id": "3", "created_at": "2026-10-02T00:00:00Z", "target": "Aki", "category": "staff"})),
            ],
        );
        let history: EntityStore<EditHistoryEntry> = EntityStore::open(
            Some(backend as Arc<dyn TableBackend>),
            Connectivity::new(true),
            LocalCache::new(Arc::new(MemoryStore::new())),
        );
        history.refetch().await;

        assert_eq!(history.by_category("staff").len(), 2);
        assert_eq!(history.for_target("Aki").len(), 2);

        let recent: Vec<String> = history.recent(2).into_iter().map(|e| e.id).collect();
        assert_eq!(recent, vec!["2", "3"]);
        assert_eq!(history.recent(10).len(), 3);
    }
}
