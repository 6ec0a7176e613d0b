//! Static catalog of schedulable resources (lawyers) and their constraints.
//!
//! The registry is built once from configuration and is read-only afterwards,
//! so a single instance can be shared by any number of concurrent validation
//! calls.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::config::hhmm;
use crate::error::{Result, SchedulingError};

/// Daily wall-clock working window, e.g. 09:00-17:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

/// A schedulable person and the limits on their calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Unique short code (e.g. "DH").
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: String,
    pub working_hours: WorkingHours,
    /// Minimum idle gap required between consecutive bookings.
    pub break_minutes: u32,
    /// Cap on bookings starting on one calendar day.
    pub max_daily_appointments: u32,
    /// Case-type tags this resource handles.
    #[serde(default)]
    pub specialties: Vec<String>,
}

impl Resource {
    pub fn has_specialty(&self, tag: &str) -> bool {
        self.specialties.iter().any(|s| s == tag)
    }

    /// True if `tag` names this resource by id, name or email.
    ///
    /// The id must match exactly; name and email are compared trimmed and
    /// case-insensitively.
    pub fn matches_tag(&self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() {
            return false;
        }
        tag == self.id
            || tag.eq_ignore_ascii_case(self.name.trim())
            || (!self.email.is_empty() && tag.eq_ignore_ascii_case(self.email.trim()))
    }

    fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(SchedulingError::InvalidInput(
                "resource id must not be empty".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(SchedulingError::InvalidInput(format!(
                "resource {} has no name",
                self.id
            )));
        }
        if self.working_hours.start >= self.working_hours.end {
            return Err(SchedulingError::InvalidInput(format!(
                "resource {} working hours {}-{} are empty",
                self.id,
                self.working_hours.start.format("%H:%M"),
                self.working_hours.end.format("%H:%M"),
            )));
        }
        Ok(())
    }
}

/// Read-only catalog of resources, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    resources: Vec<Resource>,
    by_id: HashMap<String, usize>,
}

impl ResourceRegistry {
    /// Build the registry, validating every profile and id uniqueness.
    ///
    /// # Errors
    /// Returns `SchedulingError::InvalidInput` for a duplicate id, an empty id or
    /// name, or working hours whose start is not before their end.
    pub fn new(resources: Vec<Resource>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(resources.len());
        for (idx, resource) in resources.iter().enumerate() {
            resource.validate()?;
            if by_id.insert(resource.id.clone(), idx).is_some() {
                return Err(SchedulingError::InvalidInput(format!(
                    "duplicate resource id: {}",
                    resource.id
                )));
            }
        }
        Ok(Self { resources, by_id })
    }

    /// Look up a resource by id.
    ///
    /// # Errors
    /// Returns `SchedulingError::NotFound` when no profile has this id.
    pub fn get(&self, id: &str) -> Result<&Resource> {
        self.by_id
            .get(id)
            .map(|&idx| &self.resources[idx])
            .ok_or_else(|| SchedulingError::NotFound(id.to_string()))
    }

    /// All resources in configuration order.
    pub fn list(&self) -> &[Resource] {
        &self.resources
    }

    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// Resources that handle the given case type.
    pub fn with_specialty<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Resource> + 'a {
        self.resources.iter().filter(move |r| r.has_specialty(tag))
    }

    /// Sorted union of every specialty tag in the registry.
    pub fn specialties(&self) -> Vec<&str> {
        let tags: BTreeSet<&str> = self
            .resources
            .iter()
            .flat_map(|r| r.specialties.iter().map(String::as_str))
            .collect();
        tags.into_iter().collect()
    }

    /// Resolve a raw owner tag (id, name or email) to a resource.
    ///
    /// An exact id match wins over a name or email match.
    pub fn resolve_owner(&self, tag: &str) -> Option<&Resource> {
        if let Ok(resource) = self.get(tag.trim()) {
            return Some(resource);
        }
        self.resources.iter().find(|r| r.matches_tag(tag))
    }
}
