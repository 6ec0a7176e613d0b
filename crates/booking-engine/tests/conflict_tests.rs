//! Tests for the conflict rule pipeline.
//!
//! Covers each rule in isolation plus the worked scenarios for office overlap,
//! break buffer, daily limit and the virtual-meeting pair.

use booking_engine::conflict::{
    availability_conflict, break_conflict, daily_limit_conflict, office_conflict,
    own_booking_conflict, virtual_pair_conflict, RuleInput,
};
use booking_engine::{
    BusyInterval, BusySnapshot, ConflictEngine, ConflictRule, ProposedSlot, RejectionReason,
    SchedulingConfig, SchedulingError, SlotDecision,
};
use chrono::{DateTime, TimeZone, Utc, Weekday};
use chrono_tz::America::Toronto;

// ── Helpers ─────────────────────────────────────────────────────────────────

const CONFIG: &str = r#"{
  "facility": { "timezone": "America/Toronto", "lunch": { "start": "13:00", "end": "14:00" } },
  "resources": [
    { "id": "DH", "name": "Dorin Holban", "email": "dh@firm.test",
      "working_hours": { "start": "09:00", "end": "17:00" },
      "break_minutes": 15, "max_daily_appointments": 4, "specialties": ["divorce"] },
    { "id": "TG", "name": "Tim Gagin", "email": "tg@firm.test",
      "working_hours": { "start": "09:00", "end": "17:00" },
      "break_minutes": 15, "max_daily_appointments": 3, "specialties": ["estate"] },
    { "id": "MM", "name": "Michel Mercier", "email": "mm@firm.test",
      "working_hours": { "start": "09:00", "end": "17:00" },
      "break_minutes": 0, "max_daily_appointments": 6, "specialties": ["divorce", "business"] }
  ],
  "unavailability": {
    "DH": [ { "location": "office", "weekday": "Monday" } ],
    "TG": [ { "location": "office", "weekday": "Friday" } ]
  },
  "virtual_pair": ["DH", "TG"]
}"#;

fn config() -> SchedulingConfig {
    SchedulingConfig::from_json(CONFIG).unwrap()
}

/// Instant from a Toronto wall-clock time.
fn at(year: i32, month: u32, day: u32, hour: u32, min: u32) -> DateTime<Utc> {
    Toronto
        .with_ymd_and_hms(year, month, day, hour, min, 0)
        .unwrap()
        .with_timezone(&Utc)
}

/// Slot on Tuesday 2024-06-11.
fn tuesday_slot(start: (u32, u32), end: (u32, u32), location: &str) -> ProposedSlot {
    ProposedSlot::new(
        at(2024, 6, 11, start.0, start.1),
        at(2024, 6, 11, end.0, end.1),
        location,
    )
}

fn busy(start: DateTime<Utc>, end: DateTime<Utc>, location: &str, owner: &str) -> BusyInterval {
    BusyInterval::new(start, end, location, owner)
}

fn decide(
    config: &SchedulingConfig,
    resource: &str,
    slot: &ProposedSlot,
    intervals: Vec<BusyInterval>,
) -> SlotDecision {
    let engine = ConflictEngine::new(config);
    let snapshot = engine.snapshot(intervals);
    engine.check_slot(resource, slot, &snapshot).unwrap()
}

fn rule_input<'a>(
    config: &'a SchedulingConfig,
    resource: &str,
    slot: &'a ProposedSlot,
    snapshot: &'a BusySnapshot,
) -> RuleInput<'a> {
    RuleInput {
        resource: config.registry.get(resource).unwrap(),
        slot,
        snapshot,
        facility: &config.facility,
        location_rules: &config.location_rules,
        virtual_pair: config.virtual_pair.as_ref(),
    }
}

fn rejected_by(decision: &SlotDecision) -> Option<ConflictRule> {
    decision.rejection().map(RejectionReason::rule)
}

// ── Scenario A: office overlap, break buffer, acceptance ───────────────────

#[test]
fn office_slot_overlapping_existing_office_booking_is_rejected() {
    let config = config();
    let existing = vec![busy(at(2024, 6, 11, 10, 0), at(2024, 6, 11, 11, 0), "Office", "DH")];

    let decision = decide(&config, "DH", &tuesday_slot((10, 30), (11, 30), "office"), existing);

    assert_eq!(rejected_by(&decision), Some(ConflictRule::OfficeDoubleBooking));
}

#[test]
fn slot_five_minutes_after_booking_breaks_buffer() {
    let config = config();
    let existing = vec![busy(at(2024, 6, 11, 10, 0), at(2024, 6, 11, 11, 0), "Office", "DH")];

    let decision = decide(&config, "DH", &tuesday_slot((11, 5), (12, 5), "office"), existing);

    assert_eq!(
        decision,
        SlotDecision::Rejected(RejectionReason::InsufficientBreak {
            gap_minutes: 5,
            required_minutes: 15,
        })
    );
}

#[test]
fn slot_exactly_one_break_after_booking_is_accepted() {
    let config = config();
    let existing = vec![busy(at(2024, 6, 11, 10, 0), at(2024, 6, 11, 11, 0), "Office", "DH")];

    let decision = decide(&config, "DH", &tuesday_slot((11, 15), (12, 15), "office"), existing);

    assert_eq!(decision, SlotDecision::Valid);
}

// ── Scenario B: daily limit ─────────────────────────────────────────────────

fn four_monday_bookings() -> Vec<BusyInterval> {
    [(9, 10), (10, 11), (14, 15), (15, 16)]
        .iter()
        .map(|&(s, e)| busy(at(2024, 6, 10, s, 30), at(2024, 6, 10, e, 0), "Teams", "DH"))
        .collect()
}

#[test]
fn fifth_booking_on_a_full_day_is_rejected_whatever_the_location() {
    let config = config();
    for location in ["Phone", "Teams", "Palais de justice"] {
        let slot = ProposedSlot::new(at(2024, 6, 10, 16, 30), at(2024, 6, 10, 17, 30), location);
        let decision = decide(&config, "DH", &slot, four_monday_bookings());
        assert_eq!(
            rejected_by(&decision),
            Some(ConflictRule::DailyLimit),
            "location {location} should hit the daily limit"
        );
    }
}

#[test]
fn daily_limit_rule_alone_rejects_an_office_slot_on_a_full_day() {
    let config = config();
    let engine = ConflictEngine::new(&config);
    let snapshot = engine.snapshot(four_monday_bookings());
    let slot = ProposedSlot::new(at(2024, 6, 10, 7, 0), at(2024, 6, 10, 8, 0), "office");

    let reason = daily_limit_conflict(&rule_input(&config, "DH", &slot, &snapshot));

    assert_eq!(
        reason,
        Some(RejectionReason::DailyLimitReached {
            date: chrono::NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            booked: 4,
            limit: 4,
        })
    );
}

#[test]
fn daily_limit_uses_local_date_not_utc_date() {
    let config = config();
    // 21:00 Toronto is already the next day in UTC.
    let late = vec![
        busy(at(2024, 6, 11, 21, 0), at(2024, 6, 11, 22, 0), "Phone", "TG"),
        busy(at(2024, 6, 11, 22, 0), at(2024, 6, 11, 23, 0), "Phone", "TG"),
        busy(at(2024, 6, 11, 23, 0), at(2024, 6, 11, 23, 30), "Phone", "TG"),
    ];
    let engine = ConflictEngine::new(&config);
    let snapshot = engine.snapshot(late);

    let same_day = ProposedSlot::new(at(2024, 6, 11, 9, 0), at(2024, 6, 11, 10, 0), "Court");
    let next_day = ProposedSlot::new(at(2024, 6, 12, 9, 0), at(2024, 6, 12, 10, 0), "Court");

    assert!(daily_limit_conflict(&rule_input(&config, "TG", &same_day, &snapshot)).is_some());
    assert!(daily_limit_conflict(&rule_input(&config, "TG", &next_day, &snapshot)).is_none());
}

// ── Scenario C: virtual-meeting pair ────────────────────────────────────────

#[test]
fn partner_virtual_meeting_blocks_virtual_slot() {
    let config = config();
    let existing = vec![busy(at(2024, 6, 11, 14, 0), at(2024, 6, 11, 15, 0), "Microsoft Teams Meeting", "DH")];

    let decision = decide(&config, "TG", &tuesday_slot((14, 30), (15, 30), "Phone"), existing);

    match decision {
        SlotDecision::Rejected(RejectionReason::VirtualPairBusy { partner, .. }) => {
            assert_eq!(partner, "DH")
        }
        other => panic!("expected virtual pair rejection, got {other:?}"),
    }
}

#[test]
fn partner_virtual_meeting_does_not_block_in_person_slot() {
    let config = config();
    let existing = vec![busy(at(2024, 6, 11, 14, 0), at(2024, 6, 11, 15, 0), "Teams", "DH")];
    let slot = tuesday_slot((14, 30), (15, 30), "office");

    let engine = ConflictEngine::new(&config);
    let snapshot = engine.snapshot(existing);
    assert!(virtual_pair_conflict(&rule_input(&config, "TG", &slot, &snapshot)).is_none());
    assert_eq!(engine.check_slot("TG", &slot, &snapshot).unwrap(), SlotDecision::Valid);
}

#[test]
fn virtual_rule_ignores_resources_outside_the_pair() {
    let config = config();
    let existing = vec![busy(at(2024, 6, 11, 14, 0), at(2024, 6, 11, 15, 0), "Teams", "DH")];

    let decision = decide(&config, "MM", &tuesday_slot((14, 0), (15, 0), "Teams"), existing);

    assert_eq!(decision, SlotDecision::Valid);
}

#[test]
fn partner_owner_tag_by_name_is_resolved() {
    let config = config();
    let existing = vec![busy(at(2024, 6, 11, 14, 0), at(2024, 6, 11, 15, 0), "phone", "dorin holban")];

    let decision = decide(&config, "TG", &tuesday_slot((14, 0), (15, 0), "Téléphone"), existing);

    assert_eq!(rejected_by(&decision), Some(ConflictRule::VirtualPair));
}

// ── Availability rule ───────────────────────────────────────────────────────

#[test]
fn resource_unavailable_for_office_on_configured_weekday() {
    let config = config();
    let slot = ProposedSlot::new(at(2024, 6, 10, 10, 0), at(2024, 6, 10, 11, 0), "Office");

    let decision = decide(&config, "DH", &slot, vec![]);

    assert_eq!(
        decision,
        SlotDecision::Rejected(RejectionReason::LocationUnavailable {
            location: "Office".to_string(),
            weekday: Weekday::Mon,
        })
    );
}

#[test]
fn availability_rule_only_applies_to_listed_location() {
    let config = config();
    let snapshot = BusySnapshot::default();
    let slot = ProposedSlot::new(at(2024, 6, 10, 10, 0), at(2024, 6, 10, 11, 0), "Phone");

    assert!(availability_conflict(&rule_input(&config, "DH", &slot, &snapshot)).is_none());
    // TG is only restricted on Fridays.
    let office = ProposedSlot::new(at(2024, 6, 10, 10, 0), at(2024, 6, 10, 11, 0), "office");
    assert!(availability_conflict(&rule_input(&config, "TG", &office, &snapshot)).is_none());
}

// ── Office rule ─────────────────────────────────────────────────────────────

#[test]
fn office_booked_by_another_resource_blocks_office_slot() {
    let config = config();
    let existing = vec![busy(at(2024, 6, 11, 10, 0), at(2024, 6, 11, 11, 0), "OFFICE", "MM")];

    let decision = decide(&config, "TG", &tuesday_slot((10, 30), (11, 30), "Office"), existing);

    assert_eq!(rejected_by(&decision), Some(ConflictRule::OfficeDoubleBooking));
}

#[test]
fn touching_office_bookings_do_not_conflict() {
    let config = config();
    let engine = ConflictEngine::new(&config);
    let snapshot = engine.snapshot(vec![busy(
        at(2024, 6, 11, 10, 0),
        at(2024, 6, 11, 11, 0),
        "office",
        "MM",
    )]);
    let slot = tuesday_slot((11, 0), (12, 0), "office");

    assert!(office_conflict(&rule_input(&config, "TG", &slot, &snapshot)).is_none());
}

#[test]
fn office_rule_skips_intervals_without_location() {
    let config = config();
    let engine = ConflictEngine::new(&config);
    let snapshot = engine.snapshot(vec![BusyInterval {
        start: at(2024, 6, 11, 10, 0),
        end: at(2024, 6, 11, 11, 0),
        location: None,
        owner_tag: Some("MM".to_string()),
    }]);
    let slot = tuesday_slot((10, 0), (11, 0), "office");

    assert!(office_conflict(&rule_input(&config, "TG", &slot, &snapshot)).is_none());
}

// ── Unowned and unlocated intervals ─────────────────────────────────────────

fn untagged(start: DateTime<Utc>, end: DateTime<Utc>, location: &str) -> BusyInterval {
    BusyInterval {
        start,
        end,
        location: Some(location.to_string()),
        owner_tag: None,
    }
}

/// Tuesday bookings with no owner tag or an owner tag that names nobody.
fn unowned_tuesday() -> Vec<BusyInterval> {
    let mut intervals: Vec<BusyInterval> = [(8, 9), (9, 10), (11, 12)]
        .iter()
        .map(|&(s, e)| untagged(at(2024, 6, 11, s, 0), at(2024, 6, 11, e, 0), "Court"))
        .collect();
    intervals.extend(
        [(12, 13), (15, 16), (16, 17)]
            .iter()
            .map(|&(s, e)| busy(at(2024, 6, 11, s, 0), at(2024, 6, 11, e, 0), "Court", "Jane Doe")),
    );
    intervals.push(untagged(at(2024, 6, 11, 10, 0), at(2024, 6, 11, 11, 0), "office"));
    intervals
}

#[test]
fn unowned_intervals_do_not_count_toward_daily_limit() {
    let config = config();
    let engine = ConflictEngine::new(&config);
    let snapshot = engine.snapshot(unowned_tuesday());
    let slot = tuesday_slot((14, 0), (15, 0), "Court");

    assert!(snapshot.entries().iter().all(|e| e.owner.is_none()));
    assert!(daily_limit_conflict(&rule_input(&config, "TG", &slot, &snapshot)).is_none());
}

#[test]
fn unowned_intervals_do_not_count_toward_break_buffer() {
    let config = config();
    let engine = ConflictEngine::new(&config);
    let snapshot = engine.snapshot(unowned_tuesday());
    // Touches both the unowned 09:00-10:00 and the unknown owner's 12:00-13:00.
    let slot = tuesday_slot((10, 0), (12, 0), "Court");

    assert!(break_conflict(&rule_input(&config, "DH", &slot, &snapshot)).is_none());
}

#[test]
fn unowned_intervals_are_not_own_bookings() {
    let config = config();
    let engine = ConflictEngine::new(&config);
    let snapshot = engine.snapshot(unowned_tuesday());
    let slot = tuesday_slot((8, 30), (9, 30), "Court");

    assert!(own_booking_conflict(&rule_input(&config, "DH", &slot, &snapshot)).is_none());
}

#[test]
fn unowned_office_interval_still_occupies_the_office() {
    let config = config();
    let slot = tuesday_slot((10, 30), (11, 30), "office");

    let decision = decide(&config, "TG", &slot, unowned_tuesday());

    assert_eq!(rejected_by(&decision), Some(ConflictRule::OfficeDoubleBooking));
}

#[test]
fn virtual_pair_rule_skips_partner_intervals_without_location() {
    let config = config();
    let engine = ConflictEngine::new(&config);
    let snapshot = engine.snapshot(vec![BusyInterval {
        start: at(2024, 6, 11, 10, 0),
        end: at(2024, 6, 11, 11, 0),
        location: None,
        owner_tag: Some("DH".to_string()),
    }]);
    let slot = tuesday_slot((10, 0), (11, 0), "Teams");

    assert!(virtual_pair_conflict(&rule_input(&config, "TG", &slot, &snapshot)).is_none());
}

// ── Break buffer and own bookings ───────────────────────────────────────────

#[test]
fn slot_ending_too_close_to_next_booking_breaks_buffer() {
    let config = config();
    let engine = ConflictEngine::new(&config);
    let snapshot = engine.snapshot(vec![busy(
        at(2024, 6, 11, 12, 0),
        at(2024, 6, 11, 13, 0),
        "Court",
        "DH",
    )]);
    let slot = tuesday_slot((10, 50), (11, 50), "Court");

    assert_eq!(
        break_conflict(&rule_input(&config, "DH", &slot, &snapshot)),
        Some(RejectionReason::InsufficientBreak {
            gap_minutes: 10,
            required_minutes: 15,
        })
    );
}

#[test]
fn other_resources_bookings_do_not_count_for_break() {
    let config = config();
    let existing = vec![busy(at(2024, 6, 11, 10, 0), at(2024, 6, 11, 11, 0), "Court", "TG")];

    let decision = decide(&config, "DH", &tuesday_slot((11, 0), (12, 0), "Court"), existing);

    assert_eq!(decision, SlotDecision::Valid);
}

#[test]
fn zero_break_allows_back_to_back_bookings() {
    let config = config();
    let existing = vec![busy(at(2024, 6, 11, 10, 0), at(2024, 6, 11, 11, 0), "Court", "MM")];

    let decision = decide(&config, "MM", &tuesday_slot((11, 0), (12, 0), "Court"), existing);

    assert_eq!(decision, SlotDecision::Valid);
}

#[test]
fn own_overlapping_booking_elsewhere_is_rejected() {
    let config = config();
    let engine = ConflictEngine::new(&config);
    let snapshot = engine.snapshot(vec![busy(
        at(2024, 6, 11, 10, 0),
        at(2024, 6, 11, 12, 0),
        "Palais de justice",
        "MM",
    )]);
    let slot = tuesday_slot((10, 30), (11, 30), "Phone");

    assert!(own_booking_conflict(&rule_input(&config, "MM", &slot, &snapshot)).is_some());
    assert_eq!(
        rejected_by(&engine.check_slot("MM", &slot, &snapshot).unwrap()),
        Some(ConflictRule::OwnDoubleBooking)
    );
}

// ── Entry-point failures ────────────────────────────────────────────────────

#[test]
fn unknown_resource_is_not_found() {
    let config = config();
    let engine = ConflictEngine::new(&config);
    let result = engine.check_slot(
        "ZZ",
        &tuesday_slot((10, 0), (11, 0), "office"),
        &BusySnapshot::default(),
    );

    assert!(matches!(result, Err(SchedulingError::NotFound(id)) if id == "ZZ"));
}

#[test]
fn inverted_slot_is_invalid_input() {
    let config = config();
    let engine = ConflictEngine::new(&config);
    let result = engine.is_valid_slot(
        "DH",
        &tuesday_slot((11, 0), (10, 0), "office"),
        &BusySnapshot::default(),
    );

    assert!(matches!(result, Err(SchedulingError::InvalidInput(_))));
}

#[test]
fn blank_location_is_invalid_input() {
    let config = config();
    let engine = ConflictEngine::new(&config);
    let result = engine.check_slot(
        "DH",
        &tuesday_slot((10, 0), (11, 0), "  "),
        &BusySnapshot::default(),
    );

    assert!(matches!(result, Err(SchedulingError::InvalidInput(_))));
}

#[test]
fn retain_valid_keeps_order_and_drops_conflicts() {
    let config = config();
    let engine = ConflictEngine::new(&config);
    let snapshot = engine.snapshot(vec![busy(
        at(2024, 6, 11, 10, 0),
        at(2024, 6, 11, 11, 0),
        "office",
        "MM",
    )]);
    let slots = vec![
        tuesday_slot((9, 0), (10, 0), "office"),
        tuesday_slot((10, 0), (11, 0), "office"),
        tuesday_slot((11, 0), (12, 0), "office"),
    ];

    let valid = engine.retain_valid("TG", slots.clone(), &snapshot).unwrap();

    assert_eq!(valid, vec![slots[0].clone(), slots[2].clone()]);
}
