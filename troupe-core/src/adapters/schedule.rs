use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::fields::{date, flag, into_row, opt_text, text, text_list};
use super::{EntityAdapter, EntityStore};
use crate::backend::{Order, Row};
use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    #[default]
    Open,
    Private,
    GmTest,
    TestPlay,
    Offsite,
}

impl EventCategory {
    pub fn parse(s: &str) -> Self {
        match s {
            "private" => EventCategory::Private,
            "gmtest" => EventCategory::GmTest,
            "testplay" => EventCategory::TestPlay,
            "offsite" => EventCategory::Offsite,
            _ => EventCategory::Open,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Open => "open",
            EventCategory::Private => "private",
            EventCategory::GmTest => "gmtest",
            EventCategory::TestPlay => "testplay",
            EventCategory::Offsite => "offsite",
        }
    }
}

/// One session on the calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEvent {
    pub id: String,
    pub date: Option<NaiveDate>,
    /// Store name the session runs at.
    pub venue: String,
    /// Scenario title.
    pub scenario: String,
    pub gms: Vec<String>,
    /// "HH:MM".
    pub start_time: String,
    pub end_time: String,
    pub category: EventCategory,
    pub reservation_info: Option<String>,
    pub notes: Option<String>,
    pub is_cancelled: bool,
}

impl ScheduleEvent {
    pub fn new(date: NaiveDate, venue: impl Into<String>, scenario: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            date: Some(date),
            venue: venue.into(),
            scenario: scenario.into(),
            gms: Vec::new(),
            start_time: String::new(),
            end_time: String::new(),
            category: EventCategory::Open,
            reservation_info: None,
            notes: None,
            is_cancelled: false,
        }
    }
}

impl EntityAdapter for ScheduleEvent {
    const TABLE: &'static str = "schedule_events";
    const FALLBACK_KEY: &'static str = "schedule";

    fn id(&self) -> &str {
        &self.id
    }

    fn from_row(row: &Row) -> Self {
        Self {
            id: text(row, "id"),
            date: date(row, "date"),
            venue: text(row, "venue"),
            scenario: text(row, "scenario"),
            gms: text_list(row, "gms"),
            start_time: text(row, "start_time"),
            end_time: text(row, "end_time"),
            category: EventCategory::parse(&text(row, "category")),
            reservation_info: opt_text(row, "reservation_info"),
            notes: opt_text(row, "notes"),
            is_cancelled: flag(row, "is_cancelled", false),
        }
    }

    fn to_row(&self) -> Row {
        into_row(json!({
            "id": self.id,
            "date": self.date.map(|d| d.format("%Y-%m-%d").to_string()),
            "venue": self.venue,
            "scenario": self.scenario,
            "gms": self.gms,
            "start_time": self.start_time,
            "end_time": self.end_time,
            "category": self.category.as_str(),
            "reservation_info": self.reservation_info,
            "notes": self.notes,
            "is_cancelled": self.is_cancelled,
        }))
    }

    fn validate(&self) -> Result<(), SyncError> {
        if self.date.is_none() {
            return Err(SyncError::Validation("event date is required".to_string()));
        }
        if self.venue.trim().is_empty() {
            return Err(SyncError::Validation("event venue is required".to_string()));
        }
        Ok(())
    }

    fn order() -> Option<Order> {
        Some(Order::asc("date"))
    }
}

impl EntityStore<ScheduleEvent> {
    pub fn on_date(&self, day: NaiveDate) -> Vec<ScheduleEvent> {
        self.list()
            .into_iter()
            .filter(|e| e.date == Some(day))
            .collect()
    }

    pub fn at_venue(&self, venue: &str) -> Vec<ScheduleEvent> {
        self.list().into_iter().filter(|e| e.venue == venue).collect()
    }

    pub fn in_month(&self, year: i32, month: u32) -> Vec<ScheduleEvent> {
        self.list()
            .into_iter()
            .filter(|e| {
                e.date
                    .is_some_and(|d| d.year() == year && d.month() == month)
            })
            .collect()
    }

    pub fn assigned_to(&self, gm: &str) -> Vec<ScheduleEvent> {
        self.list()
            .into_iter()
            .filter(|e| e.gms.iter().any(|g| g == gm))
            .collect()
    }

    /// Non-cancelled events from `today` on, by date then start time.
    pub fn upcoming(&self, today: NaiveDate) -> Vec<ScheduleEvent> {
        let mut events: Vec<ScheduleEvent> = self
            .list()
            .into_iter()
            .filter(|e| !e.is_cancelled && e.date.is_some_and(|d| d >= today))
            .collect();
        events.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.start_time.cmp(&b.start_time))
        });
        events
    }
}
