use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::fields::{into_row, opt_text, text, text_list, timestamp};
use super::{EntityAdapter, EntityStore};
use crate::backend::{Order, Row};
use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StaffStatus {
    #[default]
    Active,
    Inactive,
    OnLeave,
}

impl StaffStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "inactive" => StaffStatus::Inactive,
            "on-leave" | "on_leave" => StaffStatus::OnLeave,
            _ => StaffStatus::Active,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StaffStatus::Active => "active",
            StaffStatus::Inactive => "inactive",
            StaffStatus::OnLeave => "on-leave",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Staff {
    pub id: String,
    pub name: String,
    pub line_name: Option<String>,
    /// e.g. "gm", "manager", "support".
    pub role: Vec<String>,
    /// Store ids this member works at.
    pub stores: Vec<String>,
    pub status: StaffStatus,
    pub experience: Option<String>,
    /// Titles of scenarios this member can run.
    pub available_scenarios: Vec<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Staff {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            line_name: None,
            role: Vec::new(),
            stores: Vec::new(),
            status: StaffStatus::Active,
            experience: None,
            available_scenarios: Vec::new(),
            phone: None,
            email: None,
            notes: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.role.iter().any(|r| r == role)
    }

    pub fn can_run(&self, scenario_title: &str) -> bool {
        self.available_scenarios.iter().any(|s| s == scenario_title)
    }
}

impl EntityAdapter for Staff {
    const TABLE: &'static str = "staff";
    const FALLBACK_KEY: &'static str = "staff";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: text(row, "id"),
            name: text(row, "name"),
            line_name: opt_text(row, "line_name"),
            role: text_list(row, "role"),
            stores: text_list(row, "stores"),
            status: StaffStatus::parse(&text(row, "status")),
            experience: opt_text(row, "experience"),
            available_scenarios: text_list(row, "available_scenarios"),
            phone: opt_text(row, "phone"),
            email: opt_text(row, "email"),
            notes: opt_text(row, "notes"),
            created_at: timestamp(row, "created_at"),
            updated_at: timestamp(row, "updated_at"),
        }
    }

    fn to_row(&self) -> Row {
        let mut row = into_row(json!({
            "id": self.id,
            "name": self.name,
            "line_name": self.line_name,
            "role": self.role,
            "stores": self.stores,
            "status": self.status.as_str(),
            "experience": self.experience,
            "available_scenarios": self.available_scenarios,
            "phone": self.phone,
            "email": self.email,
            "notes": self.notes,
        }));
        if let Some(created_at) = self.created_at {
            row.insert("created_at".to_string(), json!(created_at.to_rfc3339()));
        }
        if let Some(updated_at) = self.updated_at {
            row.insert("updated_at".to_string(), json!(updated_at.to_rfc3339()));
        }
        row
    }

    fn validate(&self) -> Result<(), SyncError> {
        if self.name.trim().is_empty() {
            return Err(SyncError::Validation("staff name is required".to_string()));
        }
        Ok(())
    }

    fn order() -> Option<Order> {
        Some(Order::asc("name"))
    }
}

impl EntityStore<Staff> {
    pub fn active(&self) -> Vec<Staff> {
        self.list()
            .into_iter()
            .filter(|s| s.status == StaffStatus::Active)
            .collect()
    }

    pub fn by_role(&self, role: &str) -> Vec<Staff> {
        self.list().into_iter().filter(|s| s.has_role(role)).collect()
    }

    pub fn by_store(&self, store_id: &str) -> Vec<Staff> {
        self.list()
            .into_iter()
            .filter(|s| s.stores.iter().any(|id| id == store_id))
            .collect()
    }

    /// Active members who list the scenario as runnable.
    pub fn can_run(&self, scenario_title: &str) -> Vec<Staff> {
        self.active()
            .into_iter()
            .filter(|s| s.can_run(scenario_title))
            .collect()
    }

    pub fn find_by_name(&self, name: &str) -> Option<Staff> {
        self.list().into_iter().find(|s| s.name == name)
    }
}
