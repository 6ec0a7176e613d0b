//! # booking-engine
//!
//! Deterministic appointment conflict rules and slot generation for a law
//! office whose lawyers share one physical office and one set of
//! virtual-meeting equipment.
//!
//! Given a snapshot of existing busy intervals, the engine decides whether a
//! proposed slot is admissible for a lawyer and enumerates the open slots in a
//! rolling horizon. All computation is synchronous and pure over immutable
//! inputs; fetching calendar data and committing bookings are left to the
//! caller.
//!
//! ## Modules
//!
//! - [`registry`]: Static catalog of resources and their constraints
//! - [`interval`]: Overlap, same-day, lunch and location predicates
//! - [`snapshot`]: Busy intervals with owners resolved once at ingestion
//! - [`conflict`]: Ordered pipeline of conflict rules
//! - [`slots`]: Slot generation across the horizon
//! - [`planner`]: Fetch-then-validate/generate slot search
//! - [`config`]: Facility calendar and JSON configuration loading
//! - [`error`]: Error types

pub mod config;
pub mod conflict;
pub mod error;
pub mod interval;
pub mod planner;
pub mod registry;
pub mod slots;
pub mod snapshot;

pub use config::{FacilityConfig, LocationRules, LunchWindow, SchedulingConfig, VirtualPair};
pub use conflict::{ConflictEngine, ConflictRule, RejectionReason, SlotDecision};
pub use error::SchedulingError;
pub use interval::{overlaps, BusyInterval, LocationKind, ProposedSlot, TimeRange};
pub use planner::{CalendarSource, InMemoryCalendar, ScheduleMode, Scheduler, SlotRequest, SlotSearch};
pub use registry::{Resource, ResourceRegistry, WorkingHours};
pub use slots::{generate_slots, next_available};
pub use snapshot::BusySnapshot;
