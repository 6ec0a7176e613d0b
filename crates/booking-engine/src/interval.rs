//! Pure predicates over time ranges.
//!
//! Every range is half-open: `[start, end)`. Two ranges that merely touch at an
//! endpoint do NOT overlap. Day, weekday and lunch computations happen in the
//! facility's local wall-clock time, never in UTC.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::config::FacilityConfig;

/// Location keywords that mark a meeting as remote.
const VIRTUAL_KEYWORDS: &[&str] = &[
    "phone",
    "tel",
    "telephone",
    "téléphone",
    "teams",
    "ms teams",
    "microsoft teams",
    "microsoft teams meeting",
];

/// Canonical label of the shared physical office.
const OFFICE_LABEL: &str = "office";

/// Anything with a start and an end instant.
pub trait TimeRange {
    fn start(&self) -> DateTime<Utc>;
    fn end(&self) -> DateTime<Utc>;

    /// Length of the range in whole minutes.
    fn duration_minutes(&self) -> i64 {
        (self.end() - self.start()).num_minutes()
    }
}

impl TimeRange for (DateTime<Utc>, DateTime<Utc>) {
    fn start(&self) -> DateTime<Utc> {
        self.0
    }

    fn end(&self) -> DateTime<Utc> {
        self.1
    }
}

/// An existing commitment, as delivered by the calendar data source.
///
/// `location` and `owner_tag` are optional because upstream calendar data is
/// not always complete. Rules that need a missing field skip the interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusyInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
    /// Resource id, name or email of the owner.
    #[serde(default)]
    pub owner_tag: Option<String>,
}

impl BusyInterval {
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        location: impl Into<String>,
        owner_tag: impl Into<String>,
    ) -> Self {
        Self {
            start,
            end,
            location: Some(location.into()),
            owner_tag: Some(owner_tag.into()),
        }
    }
}

impl TimeRange for BusyInterval {
    fn start(&self) -> DateTime<Utc> {
        self.start
    }

    fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

/// A candidate appointment being evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedSlot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub location: String,
}

impl ProposedSlot {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, location: impl Into<String>) -> Self {
        Self {
            start,
            end,
            location: location.into(),
        }
    }
}

impl TimeRange for ProposedSlot {
    fn start(&self) -> DateTime<Utc> {
        self.start
    }

    fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

/// Classification of a free-text location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    /// The single shared physical office.
    Office,
    /// Phone or video meeting.
    Virtual,
    /// Anything else (court, client site, ...).
    Other,
}

impl LocationKind {
    pub fn classify(location: &str) -> Self {
        if location.trim().eq_ignore_ascii_case(OFFICE_LABEL) {
            LocationKind::Office
        } else if is_virtual_location(location) {
            LocationKind::Virtual
        } else {
            LocationKind::Other
        }
    }
}

/// True iff `a.start < b.end && b.start < a.end`.
pub fn overlaps<A, B>(a: &A, b: &B) -> bool
where
    A: TimeRange + ?Sized,
    B: TimeRange + ?Sized,
{
    a.start() < b.end() && b.start() < a.end()
}

/// Calendar date of `instant` in the given timezone.
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// True iff both instants fall on the same local calendar date.
pub fn is_same_day(a: DateTime<Utc>, b: DateTime<Utc>, tz: Tz) -> bool {
    local_date(a, tz) == local_date(b, tz)
}

/// Convert a local wall-clock time on `date` to an instant.
///
/// On a DST fold the earlier of the two instants is used. Returns `None` when
/// the wall-clock time falls inside a DST gap and therefore does not exist.
pub fn local_instant(tz: Tz, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

/// The facility lunch window on the given local date.
pub fn lunch_window(
    date: NaiveDate,
    facility: &FacilityConfig,
) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let start = local_instant(facility.timezone, date, facility.lunch.start)?;
    let end = local_instant(facility.timezone, date, facility.lunch.end)?;
    Some((start, end))
}

/// True iff the slot intersects the lunch window on the slot's local date.
pub fn is_lunch_overlap(
    slot_start: DateTime<Utc>,
    slot_end: DateTime<Utc>,
    facility: &FacilityConfig,
) -> bool {
    let date = local_date(slot_start, facility.timezone);
    match lunch_window(date, facility) {
        Some(lunch) => overlaps(&(slot_start, slot_end), &lunch),
        None => false,
    }
}

/// True if the location text mentions a phone or Teams meeting.
pub fn is_virtual_location(location: &str) -> bool {
    let lowered = location.to_lowercase();
    VIRTUAL_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}
