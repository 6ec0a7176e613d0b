//! Decide whether a proposed slot is admissible for a resource.
//!
//! Validation runs an ordered, short-circuiting pipeline of independent rules.
//! Each rule sees the proposed slot and the complete busy snapshot (every
//! resource's intervals, not just the requester's) and either passes or names
//! a [`RejectionReason`]. The slot is valid iff every rule passes. Order does
//! not change the verdict, only which reason is reported first.
//!
//! Rules fail open on malformed interval data: an interval with no location
//! or no resolvable owner is skipped by the rules that need that field, and
//! the skip is logged. The entry points fail closed on an unknown resource or
//! a malformed slot.

use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Serialize;

use crate::config::{FacilityConfig, LocationRules, SchedulingConfig, VirtualPair};
use crate::error::{Result, SchedulingError};
use crate::interval::{local_date, overlaps, BusyInterval, LocationKind, ProposedSlot};
use crate::registry::Resource;
use crate::snapshot::BusySnapshot;

/// The conflict rules, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictRule {
    /// Resource does not take this location on this weekday.
    Availability,
    /// Resource already has its daily quota of bookings.
    DailyLimit,
    /// The shared office is already in use.
    OfficeDoubleBooking,
    /// The paired resource is on a virtual meeting with the shared equipment.
    VirtualPair,
    /// Not enough idle time next to the resource's neighbouring bookings.
    BreakBuffer,
    /// The resource already has something booked over the slot.
    OwnDoubleBooking,
}

impl ConflictRule {
    /// Evaluation order of the validation pipeline.
    pub const PIPELINE: [ConflictRule; 6] = [
        ConflictRule::Availability,
        ConflictRule::DailyLimit,
        ConflictRule::OfficeDoubleBooking,
        ConflictRule::VirtualPair,
        ConflictRule::BreakBuffer,
        ConflictRule::OwnDoubleBooking,
    ];

    /// Run this rule alone.
    pub fn check(self, input: &RuleInput<'_>) -> Option<RejectionReason> {
        match self {
            ConflictRule::Availability => availability_conflict(input),
            ConflictRule::DailyLimit => daily_limit_conflict(input),
            ConflictRule::OfficeDoubleBooking => office_conflict(input),
            ConflictRule::VirtualPair => virtual_pair_conflict(input),
            ConflictRule::BreakBuffer => break_conflict(input),
            ConflictRule::OwnDoubleBooking => own_booking_conflict(input),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ConflictRule::Availability => "availability",
            ConflictRule::DailyLimit => "daily_limit",
            ConflictRule::OfficeDoubleBooking => "office_double_booking",
            ConflictRule::VirtualPair => "virtual_pair",
            ConflictRule::BreakBuffer => "break_buffer",
            ConflictRule::OwnDoubleBooking => "own_double_booking",
        }
    }
}

/// Why a slot was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum RejectionReason {
    LocationUnavailable {
        location: String,
        weekday: Weekday,
    },
    DailyLimitReached {
        date: NaiveDate,
        booked: u32,
        limit: u32,
    },
    OfficeOccupied {
        conflicting: BusyInterval,
    },
    VirtualPairBusy {
        partner: String,
        conflicting: BusyInterval,
    },
    InsufficientBreak {
        gap_minutes: i64,
        required_minutes: u32,
    },
    OwnDoubleBooking {
        conflicting: BusyInterval,
    },
}

impl RejectionReason {
    /// The rule that produced this rejection.
    pub fn rule(&self) -> ConflictRule {
        match self {
            RejectionReason::LocationUnavailable { .. } => ConflictRule::Availability,
            RejectionReason::DailyLimitReached { .. } => ConflictRule::DailyLimit,
            RejectionReason::OfficeOccupied { .. } => ConflictRule::OfficeDoubleBooking,
            RejectionReason::VirtualPairBusy { .. } => ConflictRule::VirtualPair,
            RejectionReason::InsufficientBreak { .. } => ConflictRule::BreakBuffer,
            RejectionReason::OwnDoubleBooking { .. } => ConflictRule::OwnDoubleBooking,
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::LocationUnavailable { location, weekday } => {
                write!(f, "unavailable for {} on {}", location, weekday)
            }
            RejectionReason::DailyLimitReached {
                date,
                booked,
                limit,
            } => write!(f, "daily limit reached on {}: {}/{}", date, booked, limit),
            RejectionReason::OfficeOccupied { conflicting } => write!(
                f,
                "office already booked {} to {}",
                conflicting.start, conflicting.end
            ),
            RejectionReason::VirtualPairBusy {
                partner,
                conflicting,
            } => write!(
                f,
                "{} is on a virtual meeting {} to {}",
                partner, conflicting.start, conflicting.end
            ),
            RejectionReason::InsufficientBreak {
                gap_minutes,
                required_minutes,
            } => write!(
                f,
                "only {} min break, {} min required",
                gap_minutes, required_minutes
            ),
            RejectionReason::OwnDoubleBooking { conflicting } => write!(
                f,
                "already booked {} to {}",
                conflicting.start, conflicting.end
            ),
        }
    }
}

/// Outcome of validating one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SlotDecision {
    Valid,
    Rejected(RejectionReason),
}

impl SlotDecision {
    pub fn is_valid(&self) -> bool {
        matches!(self, SlotDecision::Valid)
    }

    pub fn rejection(&self) -> Option<&RejectionReason> {
        match self {
            SlotDecision::Valid => None,
            SlotDecision::Rejected(reason) => Some(reason),
        }
    }
}

/// Everything a single rule may look at.
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    pub resource: &'a Resource,
    pub slot: &'a ProposedSlot,
    pub snapshot: &'a BusySnapshot,
    pub facility: &'a FacilityConfig,
    pub location_rules: &'a LocationRules,
    pub virtual_pair: Option<&'a VirtualPair>,
}

/// Reject a slot whose end is not after its start or whose location is blank.
pub fn validate_slot(slot: &ProposedSlot) -> Result<()> {
    if slot.end <= slot.start {
        return Err(SchedulingError::InvalidInput(format!(
            "slot ends ({}) before it starts ({})",
            slot.end, slot.start
        )));
    }
    if slot.location.trim().is_empty() {
        return Err(SchedulingError::InvalidInput(
            "slot location must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Runs the rule pipeline against a shared configuration.
#[derive(Debug, Clone, Copy)]
pub struct ConflictEngine<'a> {
    config: &'a SchedulingConfig,
}

impl<'a> ConflictEngine<'a> {
    pub fn new(config: &'a SchedulingConfig) -> Self {
        Self { config }
    }

    /// Ingest raw busy intervals against this engine's registry.
    pub fn snapshot<I>(&self, intervals: I) -> BusySnapshot
    where
        I: IntoIterator<Item = BusyInterval>,
    {
        BusySnapshot::ingest(&self.config.registry, intervals)
    }

    /// Validate `slot` for `resource_id`, reporting the first rule that fails.
    ///
    /// # Errors
    /// Returns `SchedulingError::NotFound` for an unknown resource and
    /// `SchedulingError::InvalidInput` for a malformed slot.
    pub fn check_slot(
        &self,
        resource_id: &str,
        slot: &ProposedSlot,
        snapshot: &BusySnapshot,
    ) -> Result<SlotDecision> {
        let resource = self.config.registry.get(resource_id)?;
        validate_slot(slot)?;

        let input = RuleInput {
            resource,
            slot,
            snapshot,
            facility: &self.config.facility,
            location_rules: &self.config.location_rules,
            virtual_pair: self.config.virtual_pair.as_ref(),
        };

        for rule in ConflictRule::PIPELINE {
            if let Some(reason) = rule.check(&input) {
                tracing::debug!(
                    resource = resource_id,
                    rule = rule.name(),
                    start = %slot.start,
                    "slot rejected: {reason}"
                );
                return Ok(SlotDecision::Rejected(reason));
            }
        }
        Ok(SlotDecision::Valid)
    }

    /// Boolean view of [`ConflictEngine::check_slot`].
    pub fn is_valid_slot(
        &self,
        resource_id: &str,
        slot: &ProposedSlot,
        snapshot: &BusySnapshot,
    ) -> Result<bool> {
        self.check_slot(resource_id, slot, snapshot)
            .map(|decision| decision.is_valid())
    }

    /// Keep only the slots that pass every rule, preserving order.
    pub fn retain_valid(
        &self,
        resource_id: &str,
        slots: Vec<ProposedSlot>,
        snapshot: &BusySnapshot,
    ) -> Result<Vec<ProposedSlot>> {
        let mut valid = Vec::with_capacity(slots.len());
        for slot in slots {
            if self.is_valid_slot(resource_id, &slot, snapshot)? {
                valid.push(slot);
            }
        }
        Ok(valid)
    }
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

pub fn availability_conflict(input: &RuleInput<'_>) -> Option<RejectionReason> {
    let weekday = input
        .slot
        .start
        .with_timezone(&input.facility.timezone)
        .weekday();
    input
        .location_rules
        .is_unavailable(&input.resource.id, &input.slot.location, weekday)
        .then(|| RejectionReason::LocationUnavailable {
            location: input.slot.location.clone(),
            weekday,
        })
}

/// Counts every interval of the resource starting on the slot's local date,
/// whatever its location or subject.
pub fn daily_limit_conflict(input: &RuleInput<'_>) -> Option<RejectionReason> {
    let tz = input.facility.timezone;
    let date = local_date(input.slot.start, tz);
    let booked = input
        .snapshot
        .owned_by(&input.resource.id)
        .filter(|interval| local_date(interval.start, tz) == date)
        .count();
    let booked = u32::try_from(booked).unwrap_or(u32::MAX);
    let limit = input.resource.max_daily_appointments;

    (booked >= limit).then_some(RejectionReason::DailyLimitReached {
        date,
        booked,
        limit,
    })
}

/// One shared office: any two office intervals may not overlap, whoever owns
/// them.
pub fn office_conflict(input: &RuleInput<'_>) -> Option<RejectionReason> {
    if LocationKind::classify(&input.slot.location) != LocationKind::Office {
        return None;
    }

    for entry in input.snapshot.entries() {
        let interval = &entry.interval;
        let Some(location) = interval.location.as_deref() else {
            tracing::warn!(
                start = %interval.start,
                "interval without location skipped by office rule"
            );
            continue;
        };
        if LocationKind::classify(location) == LocationKind::Office && overlaps(input.slot, interval)
        {
            return Some(RejectionReason::OfficeOccupied {
                conflicting: interval.clone(),
            });
        }
    }
    None
}

pub fn virtual_pair_conflict(input: &RuleInput<'_>) -> Option<RejectionReason> {
    let partner = input.virtual_pair?.partner_of(&input.resource.id)?;
    if LocationKind::classify(&input.slot.location) != LocationKind::Virtual {
        return None;
    }

    for interval in input.snapshot.owned_by(partner) {
        let Some(location) = interval.location.as_deref() else {
            tracing::warn!(
                partner,
                start = %interval.start,
                "interval without location skipped by virtual pair rule"
            );
            continue;
        };
        if LocationKind::classify(location) == LocationKind::Virtual
            && overlaps(input.slot, interval)
        {
            return Some(RejectionReason::VirtualPairBusy {
                partner: partner.to_string(),
                conflicting: interval.clone(),
            });
        }
    }
    None
}

/// Checks the gap to the resource's latest booking ending at or before the
/// slot and to its earliest booking starting at or after it.
pub fn break_conflict(input: &RuleInput<'_>) -> Option<RejectionReason> {
    let required_minutes = input.resource.break_minutes;
    let required = Duration::minutes(i64::from(required_minutes));
    let slot = input.slot;

    let mut previous: Option<&BusyInterval> = None;
    let mut next: Option<&BusyInterval> = None;
    for interval in input.snapshot.owned_by(&input.resource.id) {
        if interval.end <= slot.start && previous.is_none_or(|p| interval.end > p.end) {
            previous = Some(interval);
        } else if interval.start >= slot.end && next.is_none_or(|n| interval.start < n.start) {
            next = Some(interval);
        }
    }

    let gaps = [
        previous.map(|p| slot.start - p.end),
        next.map(|n| n.start - slot.end),
    ];
    gaps.into_iter()
        .flatten()
        .find(|gap| *gap < required)
        .map(|gap| RejectionReason::InsufficientBreak {
            gap_minutes: gap.num_minutes(),
            required_minutes,
        })
}

pub fn own_booking_conflict(input: &RuleInput<'_>) -> Option<RejectionReason> {
    input
        .snapshot
        .owned_by(&input.resource.id)
        .find(|interval| overlaps(input.slot, *interval))
        .map(|interval| RejectionReason::OwnDoubleBooking {
            conflicting: interval.clone(),
        })
}
