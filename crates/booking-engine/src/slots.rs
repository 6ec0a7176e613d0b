//! Enumerate open appointment slots across a multi-day horizon.
//!
//! For each weekday in the horizon, sweeps a cursor across the resource's
//! working window, packing fixed-length slots into the gaps between the
//! resource's own bookings (each padded by the break buffer on both sides) and
//! dropping any slot that touches the lunch window.
//!
//! Generation only looks at the resource's own bookings. Office and
//! virtual-pair conflicts depend on other resources' intervals, so callers must
//! still run every generated slot through [`ConflictEngine`] before offering it.
//!
//! [`ConflictEngine`]: crate::conflict::ConflictEngine

use chrono::{DateTime, Datelike, Days, Duration, Utc, Weekday};

use crate::config::FacilityConfig;
use crate::interval::{local_date, local_instant, lunch_window, overlaps, BusyInterval, ProposedSlot};
use crate::registry::Resource;
use crate::snapshot::BusySnapshot;

/// Generate candidate slots for `resource` at `location`, ascending by start.
///
/// Covers the local dates `[date(horizon_start), date(horizon_start) + horizon_days)`.
/// Saturdays, Sundays and days on which the resource already has
/// `max_daily_appointments` bookings produce no slots. Slots are
/// `facility.slot_duration_minutes` long and never overlap the lunch window or
/// leave the working window.
pub fn generate_slots(
    resource: &Resource,
    location: &str,
    snapshot: &BusySnapshot,
    horizon_start: DateTime<Utc>,
    horizon_days: u32,
    facility: &FacilityConfig,
) -> Vec<ProposedSlot> {
    let tz = facility.timezone;
    let first_day = local_date(horizon_start, tz);
    let slot_len = facility.slot_duration();
    let break_len = Duration::minutes(i64::from(resource.break_minutes));

    // Already sorted by start.
    let own: Vec<&BusyInterval> = snapshot.owned_by(&resource.id).collect();

    let mut slots = Vec::new();
    for offset in 0..horizon_days {
        let Some(date) = first_day.checked_add_days(Days::new(u64::from(offset))) else {
            break;
        };
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            continue;
        }

        let booked = own
            .iter()
            .filter(|interval| local_date(interval.start, tz) == date)
            .count();
        if booked >= resource.max_daily_appointments as usize {
            tracing::debug!(resource = %resource.id, %date, booked, "daily limit reached, no slots");
            continue;
        }

        let (Some(work_start), Some(work_end)) = (
            local_instant(tz, date, resource.working_hours.start),
            local_instant(tz, date, resource.working_hours.end),
        ) else {
            tracing::warn!(resource = %resource.id, %date, "working hours do not exist on this date");
            continue;
        };
        let lunch = lunch_window(date, facility);

        let mut packer = SlotPacker {
            slot_len,
            lunch,
            location,
            out: &mut slots,
        };

        let mut cursor = work_start;
        let blocks = own
            .iter()
            .filter(|i| i.start - break_len < work_end && i.end + break_len > work_start);
        for block in blocks {
            packer.pack(cursor, block.start - break_len);
            cursor = cursor.max(block.end + break_len);
        }
        packer.pack(cursor, work_end);
    }

    tracing::debug!(resource = %resource.id, count = slots.len(), "generated candidate slots");
    slots
}

/// The first slot starting at or after `now`.
///
/// Relies on `slots` being ascending by start, as [`generate_slots`] returns them.
pub fn next_available(slots: &[ProposedSlot], now: DateTime<Utc>) -> Option<&ProposedSlot> {
    slots.iter().find(|slot| slot.start >= now)
}

struct SlotPacker<'a> {
    slot_len: Duration,
    lunch: Option<(DateTime<Utc>, DateTime<Utc>)>,
    location: &'a str,
    out: &'a mut Vec<ProposedSlot>,
}

impl SlotPacker<'_> {
    /// Pack contiguous slots into `[from, until)`, skipping lunch.
    fn pack(&mut self, from: DateTime<Utc>, until: DateTime<Utc>) {
        let mut start = from;
        while start + self.slot_len <= until {
            let end = start + self.slot_len;
            let at_lunch = self
                .lunch
                .is_some_and(|lunch| overlaps(&(start, end), &lunch));
            if !at_lunch {
                self.out.push(ProposedSlot::new(start, end, self.location));
            }
            start = end;
        }
    }
}
