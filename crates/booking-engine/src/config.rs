//! Process-wide scheduling configuration.
//!
//! Everything here is fixed at startup: the facility calendar (timezone, lunch
//! window, horizon, slot granularity), the resource roster, the table of
//! location/weekday pairs each resource is unavailable for, and the pair of
//! resources that share virtual-meeting equipment.
//!
//! The whole document is loaded from JSON:
//!
//! ```json
//! {
//!   "facility": { "timezone": "America/Toronto", "lunch": { "start": "13:00", "end": "14:00" },
//!                 "horizon_days": 14, "slot_duration_minutes": 60 },
//!   "resources": [ { "id": "DH", "name": "Dorin Holban", "email": "dh@example.com",
//!                    "working_hours": { "start": "09:00", "end": "17:00" },
//!                    "break_minutes": 15, "max_daily_appointments": 4,
//!                    "specialties": ["divorce", "estate"] } ],
//!   "unavailability": { "DH": [ { "location": "office", "weekday": "Monday" } ] },
//!   "virtual_pair": ["DH", "TG"]
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use chrono::{Duration, NaiveTime, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulingError};
use crate::registry::{Resource, ResourceRegistry};

const DEFAULT_TIMEZONE: Tz = chrono_tz::America::Toronto;
const DEFAULT_TIMEZONE_NAME: &str = "America/Toronto";
const DEFAULT_HORIZON_DAYS: u32 = 14;
const MAX_HORIZON_DAYS: u32 = 366;
const DEFAULT_SLOT_MINUTES: u32 = 60;

/// Serde adapter for `"HH:MM"` wall-clock times.
pub(crate) mod hhmm {
    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map_err(|e| de::Error::custom(format!("invalid time '{}': {}", raw, e)))
    }
}

/// Daily lunch break observed by the whole facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LunchWindow {
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
}

impl Default for LunchWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(13, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(14, 0, 0).unwrap_or_default(),
        }
    }
}

/// Facility-wide calendar constants.
#[derive(Debug, Clone, PartialEq)]
pub struct FacilityConfig {
    pub timezone: Tz,
    pub lunch: LunchWindow,
    /// Rolling look-ahead for slot generation.
    pub horizon_days: u32,
    /// Fixed length of every generated slot.
    pub slot_duration_minutes: u32,
}

impl Default for FacilityConfig {
    fn default() -> Self {
        Self {
            timezone: DEFAULT_TIMEZONE,
            lunch: LunchWindow::default(),
            horizon_days: DEFAULT_HORIZON_DAYS,
            slot_duration_minutes: DEFAULT_SLOT_MINUTES,
        }
    }
}

impl FacilityConfig {
    /// Build a facility calendar from an IANA timezone name.
    ///
    /// # Errors
    /// Returns `SchedulingError::InvalidTimezone` for an unknown timezone and
    /// `SchedulingError::InvalidInput` for an empty lunch window, a horizon
    /// outside 1..=366 days or a zero slot duration.
    pub fn new(
        timezone: &str,
        lunch: LunchWindow,
        horizon_days: u32,
        slot_duration_minutes: u32,
    ) -> Result<Self> {
        let timezone: Tz = timezone
            .parse()
            .map_err(|_| SchedulingError::InvalidTimezone(timezone.to_string()))?;
        let config = Self {
            timezone,
            lunch,
            horizon_days,
            slot_duration_minutes,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn slot_duration(&self) -> Duration {
        Duration::minutes(i64::from(self.slot_duration_minutes))
    }

    fn validate(&self) -> Result<()> {
        if self.lunch.start >= self.lunch.end {
            return Err(SchedulingError::InvalidInput(
                "lunch window start must be before its end".to_string(),
            ));
        }
        if !(1..=MAX_HORIZON_DAYS).contains(&self.horizon_days) {
            return Err(SchedulingError::InvalidInput(format!(
                "horizon_days must be between 1 and {}, got {}",
                MAX_HORIZON_DAYS, self.horizon_days
            )));
        }
        if self.slot_duration_minutes == 0 {
            return Err(SchedulingError::InvalidInput(
                "slot_duration_minutes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One location a resource does not take on one weekday.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnavailableLocation {
    pub location: String,
    pub weekday: Weekday,
}

/// Resource id -> location/weekday pairs where that resource is unavailable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationRules {
    unavailable: HashMap<String, Vec<UnavailableLocation>>,
}

impl LocationRules {
    pub fn new(unavailable: HashMap<String, Vec<UnavailableLocation>>) -> Self {
        Self { unavailable }
    }

    /// True if `resource_id` is marked unavailable for `location` on `weekday`.
    /// Locations compare trimmed and case-insensitively.
    pub fn is_unavailable(&self, resource_id: &str, location: &str, weekday: Weekday) -> bool {
        let location = location.trim();
        self.unavailable.get(resource_id).is_some_and(|entries| {
            entries.iter().any(|entry| {
                entry.weekday == weekday && entry.location.trim().eq_ignore_ascii_case(location)
            })
        })
    }

    fn resource_ids(&self) -> impl Iterator<Item = &str> {
        self.unavailable.keys().map(String::as_str)
    }
}

/// Two resources that share one set of virtual-meeting equipment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualPair {
    first: String,
    second: String,
}

impl VirtualPair {
    /// # Errors
    /// Returns `SchedulingError::InvalidInput` when both ids are the same.
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Result<Self> {
        let (first, second) = (first.into(), second.into());
        if first == second {
            return Err(SchedulingError::InvalidInput(format!(
                "virtual pair needs two distinct resources, got {} twice",
                first
            )));
        }
        Ok(Self { first, second })
    }

    /// The other member of the pair, if `resource_id` belongs to it.
    pub fn partner_of(&self, resource_id: &str) -> Option<&str> {
        if resource_id == self.first {
            Some(&self.second)
        } else if resource_id == self.second {
            Some(&self.first)
        } else {
            None
        }
    }

    pub fn members(&self) -> [&str; 2] {
        [&self.first, &self.second]
    }
}

#[derive(Debug, Deserialize)]
struct FacilityDocument {
    #[serde(default = "default_timezone_name")]
    timezone: String,
    #[serde(default)]
    lunch: LunchWindow,
    #[serde(default = "default_horizon_days")]
    horizon_days: u32,
    #[serde(default = "default_slot_minutes")]
    slot_duration_minutes: u32,
}

impl Default for FacilityDocument {
    fn default() -> Self {
        Self {
            timezone: default_timezone_name(),
            lunch: LunchWindow::default(),
            horizon_days: DEFAULT_HORIZON_DAYS,
            slot_duration_minutes: DEFAULT_SLOT_MINUTES,
        }
    }
}

fn default_timezone_name() -> String {
    DEFAULT_TIMEZONE_NAME.to_string()
}

fn default_horizon_days() -> u32 {
    DEFAULT_HORIZON_DAYS
}

fn default_slot_minutes() -> u32 {
    DEFAULT_SLOT_MINUTES
}

#[derive(Debug, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    facility: FacilityDocument,
    resources: Vec<Resource>,
    #[serde(default)]
    unavailability: LocationRules,
    #[serde(default)]
    virtual_pair: Option<(String, String)>,
}

/// The complete, validated scheduling configuration.
#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    pub facility: FacilityConfig,
    pub registry: ResourceRegistry,
    pub location_rules: LocationRules,
    pub virtual_pair: Option<VirtualPair>,
}

impl SchedulingConfig {
    /// Assemble a configuration, checking that the virtual pair refers to
    /// registered resources.
    ///
    /// # Errors
    /// Returns `SchedulingError::NotFound` when a virtual-pair member is not in
    /// the registry.
    pub fn new(
        facility: FacilityConfig,
        registry: ResourceRegistry,
        location_rules: LocationRules,
        virtual_pair: Option<VirtualPair>,
    ) -> Result<Self> {
        if let Some(pair) = &virtual_pair {
            for member in pair.members() {
                registry.get(member)?;
            }
        }
        for id in location_rules.resource_ids() {
            if !registry.contains(id) {
                tracing::warn!("unavailability entry for unknown resource {id} is ignored");
            }
        }
        Ok(Self {
            facility,
            registry,
            location_rules,
            virtual_pair,
        })
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        let doc: ConfigDocument = serde_json::from_str(json)?;
        let facility = FacilityConfig::new(
            &doc.facility.timezone,
            doc.facility.lunch,
            doc.facility.horizon_days,
            doc.facility.slot_duration_minutes,
        )?;
        let registry = ResourceRegistry::new(doc.resources)?;
        let virtual_pair = doc
            .virtual_pair
            .map(|(first, second)| VirtualPair::new(first, second))
            .transpose()?;
        Self::new(facility, registry, doc.unavailability, virtual_pair)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}
