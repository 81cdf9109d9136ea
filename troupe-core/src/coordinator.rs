//! Keeps the scenario/staff assignment consistent on both sides.
//!
//! A scenario lists the staff who can run it (`available_gms`) and each staff
//! member lists the scenarios they can run (`available_scenarios`). The
//! coordinator owns both stores, so updating one side always updates the
//! other without any registration step.

use crate::adapters::{EntityStore, Scenario, Staff};
use crate::error::SyncError;

#[derive(Clone)]
pub struct AssignmentCoordinator {
    scenarios: EntityStore<Scenario>,
    staff: EntityStore<Staff>,
}

impl AssignmentCoordinator {
    pub fn new(scenarios: EntityStore<Scenario>, staff: EntityStore<Staff>) -> Self {
        Self { scenarios, staff }
    }

    pub fn scenarios(&self) -> &EntityStore<Scenario> {
        &self.scenarios
    }

    pub fn staff(&self) -> &EntityStore<Staff> {
        &self.staff
    }

    /// Adds `title` to the staff member's runnable scenarios.
    ///
    /// Returns `false` if the member does not exist or already lists it.
    pub async fn link_scenario_to_staff(&self, title: &str, gm: &str) -> Result<bool, SyncError> {
        self.staff.refetch().await;
        self.relink_staff(title, gm, true).await
    }

    /// Removes `title` from the staff member's runnable scenarios.
    pub async fn unlink_scenario_to_staff(
        &self,
        title: &str,
        gm: &str,
    ) -> Result<bool, SyncError> {
        self.staff.refetch().await;
        self.relink_staff(title, gm, false).await
    }

    /// Replaces the scenario's GM list, then links added names and unlinks
    /// removed ones on the staff side.
    pub async fn set_available_gms(
        &self,
        scenario: &Scenario,
        gms: Vec<String>,
    ) -> Result<Scenario, SyncError> {
        let mut updated = scenario.clone();
        updated.available_gms = normalize(gms);
        self.scenarios.save(&updated).await?;

        let (added, removed) = diff(&scenario.available_gms, &updated.available_gms);
        if added.is_empty() && removed.is_empty() {
            return Ok(updated);
        }

        self.staff.refetch().await;
        for gm in &added {
            self.relink_staff(&updated.title, gm, true).await?;
        }
        for gm in &removed {
            self.relink_staff(&updated.title, gm, false).await?;
        }
        tracing::info!(
            "Updated GMs for '{}': +{} -{}",
            updated.title,
            added.len(),
            removed.len()
        );
        Ok(updated)
    }

    /// Replaces the staff member's scenario list, then updates each affected
    /// scenario's GM list.
    pub async fn set_available_scenarios(
        &self,
        member: &Staff,
        titles: Vec<String>,
    ) -> Result<Staff, SyncError> {
        let mut updated = member.clone();
        updated.available_scenarios = normalize(titles);
        self.staff.save(&updated).await?;

        let (added, removed) = diff(&member.available_scenarios, &updated.available_scenarios);
        if added.is_empty() && removed.is_empty() {
            return Ok(updated);
        }

        self.scenarios.refetch().await;
        for title in &added {
            self.relink_scenario(title, &updated.name, true).await?;
        }
        for title in &removed {
            self.relink_scenario(title, &updated.name, false).await?;
        }
        tracing::info!(
            "Updated scenarios for '{}': +{} -{}",
            updated.name,
            added.len(),
            removed.len()
        );
        Ok(updated)
    }

    async fn relink_staff(&self, title: &str, gm: &str, link: bool) -> Result<bool, SyncError> {
        let Some(mut member) = self.staff.find_by_name(gm) else {
            tracing::warn!("No staff member named '{}'", gm);
            return Ok(false);
        };
        if !toggle(&mut member.available_scenarios, title, link) {
            return Ok(false);
        }
        self.staff.save(&member).await?;
        Ok(true)
    }

    async fn relink_scenario(&self, title: &str, gm: &str, link: bool) -> Result<bool, SyncError> {
        let Some(mut scenario) = self.scenarios.find_by_title(title) else {
            tracing::warn!("No scenario titled '{}'", title);
            return Ok(false);
        };
        if !toggle(&mut scenario.available_gms, gm, link) {
            return Ok(false);
        }
        self.scenarios.save(&scenario).await?;
        Ok(true)
    }
}

/// Adds or removes `name`; returns whether the list changed.
fn toggle(list: &mut Vec<String>, name: &str, present: bool) -> bool {
    let has = list.iter().any(|n| n == name);
    if present && !has {
        list.push(name.to_string());
        true
    } else if !present && has {
        list.retain(|n| n != name);
        true
    } else {
        false
    }
}

/// Trims, drops blanks and duplicates, keeps first-seen order.
fn normalize(names: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let name = name.trim();
        if !name.is_empty() && !out.iter().any(|n| n == name) {
            out.push(name.to_string());
        }
    }
    out
}

fn diff(before: &[String], after: &[String]) -> (Vec<String>, Vec<String>) {
    let added = after
        .iter()
        .filter(|n| !before.contains(n))
        .cloned()
        .collect();
    let removed = before
        .iter()
        .filter(|n| !after.contains(n))
        .cloned()
        .collect();
    (added, removed)
}
