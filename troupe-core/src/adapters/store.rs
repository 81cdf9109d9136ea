use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::fields::{date, integer, into_row, opt_text, text, text_list};
use super::{EntityAdapter, EntityStore};
use crate::backend::{Order, Row};
use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreStatus {
    #[default]
    Active,
    TemporarilyClosed,
    Closed,
}

impl StoreStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "temporarily_closed" => StoreStatus::TemporarilyClosed,
            "closed" => StoreStatus::Closed,
            _ => StoreStatus::Active,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreStatus::Active => "active",
            StoreStatus::TemporarilyClosed => "temporarily_closed",
            StoreStatus::Closed => "closed",
        }
    }
}

/// A venue where sessions are held.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: String,
    pub name: String,
    pub short_name: String,
    pub address: String,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub opening_date: Option<NaiveDate>,
    pub manager_name: Option<String>,
    pub status: StoreStatus,
    pub capacity: i64,
    pub rooms: Vec<String>,
    pub notes: Option<String>,
    /// Calendar color, e.g. "#3b82f6".
    pub color: Option<String>,
}

impl Store {
    pub fn new(name: impl Into<String>, short_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            short_name: short_name.into(),
            address: String::new(),
            phone_number: None,
            email: None,
            opening_date: None,
            manager_name: None,
            status: StoreStatus::Active,
            capacity: 0,
            rooms: Vec::new(),
            notes: None,
            color: None,
        }
    }
}

impl EntityAdapter for Store {
    const TABLE: &'static str = "stores";
    const FALLBACK_KEY: &'static str = "stores";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: text(row, "id"),
            name: text(row, "name"),
            short_name: text(row, "short_name"),
            address: text(row, "address"),
            phone_number: opt_text(row, "phone_number"),
            email: opt_text(row, "email"),
            opening_date: date(row, "opening_date"),
            manager_name: opt_text(row, "manager_name"),
            status: StoreStatus::parse(&text(row, "status")),
            capacity: integer(row, "capacity", 0),
            rooms: text_list(row, "rooms"),
            notes: opt_text(row, "notes"),
            color: opt_text(row, "color"),
        }
    }

    fn to_row(&self) -> Row {
        into_row(json!({
            "id": self.id,
            "name": self.name,
            "short_name": self.short_name,
            "address": self.address,
            "phone_number": self.phone_number,
            "email": self.email,
            "opening_date": self.opening_date.map(|d| d.format("%Y-%m-%d").to_string()),
            "manager_name": self.manager_name,
            "status": self.status.as_str(),
            "capacity": self.capacity,
            "rooms": self.rooms,
            "notes": self.notes,
            "color": self.color,
        }))
    }

    fn validate(&self) -> Result<(), SyncError> {
        if self.name.trim().is_empty() {
            return Err(SyncError::Validation("store name is required".to_string()));
        }
        if self.capacity < 0 {
            return Err(SyncError::Validation("capacity cannot be negative".to_string()));
        }
        Ok(())
    }

    fn order() -> Option<Order> {
        Some(Order::asc("name"))
    }
}

impl EntityStore<Store> {
    pub fn active(&self) -> Vec<Store> {
        self.list()
            .into_iter()
            .filter(|s| s.status == StoreStatus::Active)
            .collect()
    }

    /// Matches either the full or the short name.
    pub fn find_by_name(&self, name: &str) -> Option<Store> {
        self.list()
            .into_iter()
            .find(|s| s.name == name || s.short_name == name)
    }
}
