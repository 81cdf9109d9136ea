use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::fields::{flag, integer, into_row, number, opt_text, text, text_list, timestamp};
use super::{EntityAdapter, EntityStore};
use crate::backend::{Order, Row};
use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    #[default]
    Available,
    Maintenance,
    Retired,
}

impl ScenarioStatus {
    /// Unknown values map to `Available`.
    pub fn parse(s: &str) -> Self {
        match s {
            "maintenance" => ScenarioStatus::Maintenance,
            "retired" => ScenarioStatus::Retired,
            _ => ScenarioStatus::Available,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScenarioStatus::Available => "available",
            ScenarioStatus::Maintenance => "maintenance",
            ScenarioStatus::Retired => "retired",
        }
    }
}

/// A licensed mystery scenario in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: String,
    pub title: String,
    pub author: String,
    pub description: String,
    /// Minutes.
    pub duration: i64,
    pub player_count_min: i64,
    pub player_count_max: i64,
    /// 1 (easy) to 5 (hard).
    pub difficulty: i64,
    pub genre: Vec<String>,
    pub status: ScenarioStatus,
    /// Names of staff who can run this scenario.
    pub available_gms: Vec<String>,
    pub license_amount: i64,
    pub participation_fee: i64,
    pub play_count: i64,
    pub rating: Option<f64>,
    pub has_pre_reading: bool,
    pub notes: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Scenario {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            author: author.into(),
            description: String::new(),
            duration: 180,
            player_count_min: 4,
            player_count_max: 8,
            difficulty: 3,
            genre: Vec::new(),
            status: ScenarioStatus::Available,
            available_gms: Vec::new(),
            license_amount: 0,
            participation_fee: 0,
            play_count: 0,
            rating: None,
            has_pre_reading: false,
            notes: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn players_label(&self) -> String {
        if self.player_count_min == self.player_count_max {
            format!("{}", self.player_count_min)
        } else {
            format!("{}-{}", self.player_count_min, self.player_count_max)
        }
    }
}

impl EntityAdapter for Scenario {
    const TABLE: &'static str = "scenarios";
    const FALLBACK_KEY: &'static str = "scenarios";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row) -> Self {
        let player_count_min = integer(row, "player_count_min", 1);
        Self {
            id: text(row, "id"),
            title: text(row, "title"),
            author: text(row, "author"),
            description: text(row, "description"),
            duration: integer(row, "duration", 0),
            player_count_min,
            player_count_max: integer(row, "player_count_max", player_count_min),
            difficulty: integer(row, "difficulty", 3).clamp(1, 5),
            genre: text_list(row, "genre"),
            status: ScenarioStatus::parse(&text(row, "status")),
            available_gms: text_list(row, "available_gms"),
            license_amount: integer(row, "license_amount", 0),
            participation_fee: integer(row, "participation_fee", 0),
            play_count: integer(row, "play_count", 0),
            rating: row
                .get("rating")
                .filter(|v| !v.is_null())
                .map(|_| number(row, "rating", 0.0)),
            has_pre_reading: flag(row, "has_pre_reading", false),
            notes: opt_text(row, "notes"),
            created_at: timestamp(row, "created_at"),
            updated_at: timestamp(row, "updated_at"),
        }
    }

    fn to_row(&self) -> Row {
        let mut row = into_row(json!({
            "id": self.id,
            "title": self.title,
            "author": self.author,
            "description": self.description,
            "duration": self.duration,
            "player_count_min": self.player_count_min,
            "player_count_max": self.player_count_max,
            "difficulty": self.difficulty,
            "genre": self.genre,
            "status": self.status.as_str(),
            "available_gms": self.available_gms,
            "license_amount": self.license_amount,
            "participation_fee": self.participation_fee,
            "play_count": self.play_count,
            "rating": self.rating,
            "has_pre_reading": self.has_pre_reading,
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
        if self.title.trim().is_empty() {
            return Err(SyncError::Validation("scenario title is required".to_string()));
        }
        if self.player_count_min < 1 || self.player_count_min > self.player_count_max {
            return Err(SyncError::Validation(format!(
                "invalid player count {}",
                self.players_label()
            )));
        }
        if self.duration < 0 {
            return Err(SyncError::Validation("duration cannot be negative".to_string()));
        }
        Ok(())
    }

    fn order() -> Option<Order> {
        Some(Order::asc("title"))
    }
}

impl EntityStore<Scenario> {
    /// Scenarios that can currently be booked.
    pub fn available(&self) -> Vec<Scenario> {
        self.list()
            .into_iter()
            .filter(|s| s.status == ScenarioStatus::Available)
            .collect()
    }

    pub fn by_author(&self, author: &str) -> Vec<Scenario> {
        self.list()
            .into_iter()
            .filter(|s| s.author == author)
            .collect()
    }

    /// Scenarios the named staff member is listed for.
    pub fn with_gm(&self, gm: &str) -> Vec<Scenario> {
        self.list()
            .into_iter()
            .filter(|s| s.available_gms.iter().any(|g| g == gm))
            .collect()
    }

    /// Case-insensitive title search.
    pub fn search(&self, query: &str) -> Vec<Scenario> {
        let needle = query.to_lowercase();
        self.list()
            .into_iter()
            .filter(|s| s.title.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn find_by_title(&self, title: &str) -> Option<Scenario> {
        self.list().into_iter().find(|s| s.title == title)
    }
}
