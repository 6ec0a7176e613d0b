//! WASM bindings for booking-engine.
//!
//! Exposes slot validation and slot generation to JavaScript via
//! `wasm-bindgen`. Configuration, busy intervals and results all cross the
//! boundary as JSON strings.
//!
//! ## Build process
//!
//! ```sh
//! cargo build -p booking-engine-wasm --target wasm32-unknown-unknown --release
//! wasm-bindgen --target web --out-dir pkg/ \
//!   target/wasm32-unknown-unknown/release/booking_engine_wasm.wasm
//! ```

use booking_engine::{
    generate_slots as generate, next_available, BusyInterval, ConflictEngine, ProposedSlot,
    SchedulingConfig, TimeRange,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use wasm_bindgen::prelude::*;

// ---------------------------------------------------------------------------
// Serde-friendly DTOs for crossing the WASM boundary as JSON
// ---------------------------------------------------------------------------

/// Busy interval as sent by the calendar add-in.
#[derive(Deserialize)]
struct BusyInput {
    start: String,
    end: String,
    #[serde(default)]
    location: Option<String>,
    /// Resource id, display name or email.
    #[serde(default)]
    owner: Option<String>,
}

#[derive(Deserialize)]
struct SlotInput {
    start: String,
    end: String,
    location: String,
}

#[derive(Serialize)]
struct SlotDto {
    start: String,
    end: String,
    location: String,
    duration_minutes: i64,
}

impl From<&ProposedSlot> for SlotDto {
    fn from(s: &ProposedSlot) -> Self {
        Self {
            start: s.start.to_rfc3339(),
            end: s.end.to_rfc3339(),
            location: s.location.clone(),
            duration_minutes: s.duration_minutes(),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse an ISO 8601 datetime string into `DateTime<Utc>`.
///
/// Accepts RFC 3339 with an offset, or a naive datetime read as UTC.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, JsValue> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .map(|ndt| ndt.and_utc())
        .map_err(|e| JsValue::from_str(&format!("Invalid datetime '{}': {}", s, e)))
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn parse_config(json: &str) -> Result<SchedulingConfig, JsValue> {
    SchedulingConfig::from_json(json).map_err(js_err)
}

fn parse_busy_json(json: &str) -> Result<Vec<BusyInterval>, JsValue> {
    let inputs: Vec<BusyInput> = serde_json::from_str(json)
        .map_err(|e| JsValue::from_str(&format!("Invalid busy intervals JSON: {}", e)))?;

    inputs
        .into_iter()
        .map(|input| {
            Ok(BusyInterval {
                start: parse_datetime(&input.start)?,
                end: parse_datetime(&input.end)?,
                location: input.location,
                owner_tag: input.owner,
            })
        })
        .collect()
}

fn parse_slot_json(json: &str) -> Result<ProposedSlot, JsValue> {
    let input: SlotInput = serde_json::from_str(json)
        .map_err(|e| JsValue::from_str(&format!("Invalid slot JSON: {}", e)))?;
    Ok(ProposedSlot::new(
        parse_datetime(&input.start)?,
        parse_datetime(&input.end)?,
        input.location,
    ))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Generate and validate every slot in the facility horizon.
fn valid_slots(
    config: &SchedulingConfig,
    resource_id: &str,
    location: &str,
    busy_json: &str,
    horizon_start: &str,
) -> Result<Vec<ProposedSlot>, JsValue> {
    let horizon_start = parse_datetime(horizon_start)?;
    let engine = ConflictEngine::new(config);
    let snapshot = engine.snapshot(parse_busy_json(busy_json)?);
    let resource = config.registry.get(resource_id).map_err(js_err)?;

    let candidates = generate(
        resource,
        location,
        &snapshot,
        horizon_start,
        config.facility.horizon_days,
        &config.facility,
    );
    engine
        .retain_valid(resource_id, candidates, &snapshot)
        .map_err(js_err)
}

// ---------------------------------------------------------------------------
// WASM exports
// ---------------------------------------------------------------------------

/// Validate one proposed slot.
///
/// Returns the decision as JSON: `{"status":"valid"}` or
/// `{"status":"rejected","reason":{"rule":"office_occupied",...}}`.
///
/// # Arguments
/// - `config_json` -- scheduling configuration document
/// - `resource_id` -- the resource the slot is for
/// - `slot_json` -- `{start, end, location}`
/// - `busy_json` -- array of `{start, end, location?, owner?}` for every resource
#[wasm_bindgen(js_name = "checkSlot")]
pub fn check_slot(
    config_json: &str,
    resource_id: &str,
    slot_json: &str,
    busy_json: &str,
) -> Result<String, JsValue> {
    let config = parse_config(config_json)?;
    let engine = ConflictEngine::new(&config);
    let slot = parse_slot_json(slot_json)?;
    let snapshot = engine.snapshot(parse_busy_json(busy_json)?);

    let decision = engine
        .check_slot(resource_id, &slot, &snapshot)
        .map_err(js_err)?;
    to_json(&decision)
}

/// Boolean form of [`check_slot`].
#[wasm_bindgen(js_name = "isValidSlot")]
pub fn is_valid_slot(
    config_json: &str,
    resource_id: &str,
    slot_json: &str,
    busy_json: &str,
) -> Result<bool, JsValue> {
    let config = parse_config(config_json)?;
    let engine = ConflictEngine::new(&config);
    let slot = parse_slot_json(slot_json)?;
    let snapshot = engine.snapshot(parse_busy_json(busy_json)?);

    engine
        .is_valid_slot(resource_id, &slot, &snapshot)
        .map_err(js_err)
}

/// Generate the valid slots for a resource across the configured horizon.
///
/// Returns a JSON array of `{start, end, location, duration_minutes}` in
/// ascending order. Every returned slot has passed the full rule pipeline.
#[wasm_bindgen(js_name = "generateSlots")]
pub fn generate_slots(
    config_json: &str,
    resource_id: &str,
    location: &str,
    busy_json: &str,
    horizon_start: &str,
) -> Result<String, JsValue> {
    let config = parse_config(config_json)?;
    let slots = valid_slots(&config, resource_id, location, busy_json, horizon_start)?;

    let dtos: Vec<SlotDto> = slots.iter().map(SlotDto::from).collect();
    to_json(&dtos)
}

/// The first valid slot starting at or after `now`, or `null`.
#[wasm_bindgen(js_name = "nextAvailableSlot")]
pub fn next_available_slot(
    config_json: &str,
    resource_id: &str,
    location: &str,
    busy_json: &str,
    now: &str,
) -> Result<String, JsValue> {
    let config = parse_config(config_json)?;
    let slots = valid_slots(&config, resource_id, location, busy_json, now)?;
    let now = parse_datetime(now)?;

    to_json(&next_available(&slots, now).map(SlotDto::from))
}
