//! End-to-end slot search: fetch a snapshot, then validate or generate.
//!
//! The calendar itself is an external collaborator reached through
//! [`CalendarSource`]. Every search fetches a fresh snapshot and holds no state
//! between calls; committing the chosen slot (and any locking that requires)
//! belongs to the caller.

use std::convert::Infallible;

use chrono::{DateTime, Duration, NaiveTime, Utc};

use crate::config::SchedulingConfig;
use crate::conflict::{validate_slot, ConflictEngine, RejectionReason, SlotDecision};
use crate::error::{Result, SchedulingError};
use crate::interval::{local_date, local_instant, overlaps, BusyInterval, ProposedSlot};
use crate::slots::generate_slots;
use crate::snapshot::BusySnapshot;

/// Supplies busy intervals for one resource over a time range.
pub trait CalendarSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Whether a fetch returns only the requested resource's intervals.
    ///
    /// When true, intervals without an owner tag are attributed to the resource
    /// they were fetched for. A shared calendar answers every fetch with the
    /// same intervals, so its untagged intervals stay unowned.
    const PER_RESOURCE: bool = true;

    fn fetch_busy_intervals(
        &self,
        resource_id: &str,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> std::result::Result<Vec<BusyInterval>, Self::Error>;
}

/// A calendar held in memory, shared by every resource.
///
/// Every fetch returns all intervals overlapping the range, whatever their
/// owner, the way a single shared office calendar does.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCalendar {
    intervals: Vec<BusyInterval>,
}

impl InMemoryCalendar {
    pub fn new(intervals: Vec<BusyInterval>) -> Self {
        Self { intervals }
    }
}

impl CalendarSource for InMemoryCalendar {
    type Error = Infallible;

    const PER_RESOURCE: bool = false;

    fn fetch_busy_intervals(
        &self,
        _resource_id: &str,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> std::result::Result<Vec<BusyInterval>, Self::Error> {
        Ok(self
            .intervals
            .iter()
            .filter(|i| overlaps(*i, &(range_start, range_end)))
            .cloned()
            .collect())
    }
}

/// How the caller wants the appointment time chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    /// Offer every admissible slot in the horizon.
    Auto,
    /// Check one slot of the facility's slot duration starting at `start`.
    Manual { start: DateTime<Utc> },
}

/// Parameters of one slot search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRequest {
    pub resource_id: String,
    pub location: String,
    pub mode: ScheduleMode,
    /// Reference instant; auto mode searches from here on.
    pub now: DateTime<Utc>,
}

/// Result of a slot search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotSearch {
    /// Admissible slots, ascending by start. The first is the next bookable one.
    Found(Vec<ProposedSlot>),
    /// The manually chosen slot breaks a rule.
    Rejected(RejectionReason),
    /// Nothing admissible in the horizon. Not a failure.
    NoSlotsFound,
}

/// Owns the configuration and runs slot searches against it.
#[derive(Debug, Clone)]
pub struct Scheduler {
    config: SchedulingConfig,
}

impl Scheduler {
    pub fn new(config: SchedulingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchedulingConfig {
        &self.config
    }

    pub fn engine(&self) -> ConflictEngine<'_> {
        ConflictEngine::new(&self.config)
    }

    /// Fetch every resource's intervals over the range and ingest them.
    ///
    /// For a per-resource source, intervals returned without an owner tag are
    /// tagged with the resource they were fetched for.
    ///
    /// # Errors
    /// Returns `SchedulingError::DataUnavailable` as soon as one fetch fails.
    pub fn fetch_snapshot<S: CalendarSource>(
        &self,
        source: &S,
        range_start: DateTime<Utc>,
        range_end: DateTime<Utc>,
    ) -> Result<BusySnapshot> {
        let mut intervals = Vec::new();
        for resource in self.config.registry.list() {
            let fetched = source
                .fetch_busy_intervals(&resource.id, range_start, range_end)
                .map_err(|e| SchedulingError::DataUnavailable {
                    resource: resource.id.clone(),
                    source: Box::new(e),
                })?;
            tracing::debug!(resource = %resource.id, count = fetched.len(), "fetched busy intervals");
            intervals.extend(fetched.into_iter().map(|mut interval| {
                if S::PER_RESOURCE && interval.owner_tag.is_none() {
                    interval.owner_tag = Some(resource.id.clone());
                }
                interval
            }));
        }
        Ok(BusySnapshot::ingest(&self.config.registry, intervals))
    }

    /// Generate candidate slots over the facility horizon starting at
    /// `horizon_start`. The slots are NOT validated.
    ///
    /// # Errors
    /// Returns `SchedulingError::NotFound` for an unknown resource and
    /// `SchedulingError::InvalidInput` for a blank location.
    pub fn generate_slots(
        &self,
        resource_id: &str,
        location: &str,
        snapshot: &BusySnapshot,
        horizon_start: DateTime<Utc>,
    ) -> Result<Vec<ProposedSlot>> {
        let resource = self.config.registry.get(resource_id)?;
        require_location(location)?;
        Ok(generate_slots(
            resource,
            location,
            snapshot,
            horizon_start,
            self.config.facility.horizon_days,
            &self.config.facility,
        ))
    }

    /// Fetch a fresh snapshot and search for admissible slots.
    ///
    /// # Errors
    /// Fails closed on an unknown resource or malformed request, and propagates
    /// calendar fetch failures as `SchedulingError::DataUnavailable`.
    pub fn find_slots<S: CalendarSource>(
        &self,
        request: &SlotRequest,
        source: &S,
    ) -> Result<SlotSearch> {
        self.config.registry.get(&request.resource_id)?;
        require_location(&request.location)?;

        match request.mode {
            ScheduleMode::Manual { start } => self.check_manual(request, start, source),
            ScheduleMode::Auto => self.search_horizon(request, source),
        }
    }

    fn check_manual<S: CalendarSource>(
        &self,
        request: &SlotRequest,
        start: DateTime<Utc>,
        source: &S,
    ) -> Result<SlotSearch> {
        let slot = ProposedSlot::new(
            start,
            start + self.config.facility.slot_duration(),
            request.location.clone(),
        );
        validate_slot(&slot)?;

        // One day either side covers the slot's whole local day and its
        // neighbouring bookings.
        let snapshot = self.fetch_snapshot(
            source,
            slot.start - Duration::days(1),
            slot.end + Duration::days(1),
        )?;

        match self.engine().check_slot(&request.resource_id, &slot, &snapshot)? {
            SlotDecision::Valid => Ok(SlotSearch::Found(vec![slot])),
            SlotDecision::Rejected(reason) => Ok(SlotSearch::Rejected(reason)),
        }
    }

    fn search_horizon<S: CalendarSource>(
        &self,
        request: &SlotRequest,
        source: &S,
    ) -> Result<SlotSearch> {
        let facility = &self.config.facility;
        let first_day = local_date(request.now, facility.timezone);
        let range_start =
            local_instant(facility.timezone, first_day, NaiveTime::default()).unwrap_or(request.now);
        let range_end = range_start + Duration::days(i64::from(facility.horizon_days));

        let snapshot = self.fetch_snapshot(source, range_start, range_end)?;
        let candidates =
            self.generate_slots(&request.resource_id, &request.location, &snapshot, request.now)?;
        let mut valid = self
            .engine()
            .retain_valid(&request.resource_id, candidates, &snapshot)?;
        valid.retain(|slot| slot.start >= request.now);

        if valid.is_empty() {
            tracing::info!(resource = %request.resource_id, "no slots found in horizon");
            return Ok(SlotSearch::NoSlotsFound);
        }
        Ok(SlotSearch::Found(valid))
    }
}

fn require_location(location: &str) -> Result<()> {
    if location.trim().is_empty() {
        return Err(SchedulingError::InvalidInput(
            "location must not be empty".to_string(),
        ));
    }
    Ok(())
}
