//! Normalizes raw hotspot records into [`GeoPoint`] values.
//!
//! Records come from a generic row store and are loosely typed: coordinates may be
//! numbers or strings, and strings may use a comma as the decimal separator. Field
//! names vary between the admin form and older imports, so each field is looked up
//! under a short list of aliases.
//!
//! A record whose coordinates do not parse to finite, in-range numbers is dropped.
//! It is never defaulted to `0,0`.

use log::debug;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::sync::LazyLock;

use crate::{GeoPoint, HotspotRecord, LatLng, PointId};

const LAT_FIELDS: &[&str] = &["LATITUDE", "latitude", "lat"];
const LNG_FIELDS: &[&str] = &["LONGITUDE", "longitude", "lng"];
const KEY_FIELDS: &[&str] = &["Id", "ID", "id"];
const NAME_FIELDS: &[&str] = &["NOME-WIFI", "nome", "name"];
const CLIENT_FIELDS: &[&str] = &["NOME-CLIENTE", "cliente", "client"];
const PASSWORD_2G_FIELDS: &[&str] = &["SENHA-WIFI-2G", "password_2g"];
const PASSWORD_5G_FIELDS: &[&str] = &["SENHA-WIFI-5G", "password_5g"];

/// Envelope keys under which list endpoints nest their rows.
const ENVELOPE_KEYS: &[&str] = &["list", "records", "data"];

/// Outcome counts from a normalization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub accepted: usize,
    pub dropped: usize,
}

/// Normalizes a list of raw records into points, skipping malformed ones.
///
/// Normalization is idempotent: feeding [`GeoPoint::to_record`] output back in
/// yields the same points.
#[must_use]
pub fn normalize(records: &[Value]) -> Vec<GeoPoint> {
    normalize_with_report(records).0
}

/// Like [`normalize`], also reporting how many records were dropped.
pub fn normalize_with_report(records: &[Value]) -> (Vec<GeoPoint>, NormalizeReport) {
    let points: Vec<GeoPoint> = records.iter().filter_map(normalize_record).collect();

    let report = NormalizeReport {
        accepted: points.len(),
        dropped: records.len() - points.len(),
    };
    if report.dropped > 0 {
        debug!(
            "[Normalize] Dropped {} of {} records with unusable coordinates",
            report.dropped,
            records.len()
        );
    }

    (points, report)
}

/// Normalizes a single record.
fn normalize_record(record: &Value) -> Option<GeoPoint> {
    let obj = record.as_object()?;

    let lat = field(obj, LAT_FIELDS).and_then(parse_coordinate)?;
    let lng = field(obj, LNG_FIELDS).and_then(parse_coordinate)?;
    if !LatLng::new(lat, lng).is_valid() {
        return None;
    }

    let key = field(obj, KEY_FIELDS).and_then(text_value);
    let id = match &key {
        Some(k) => PointId::new(k.clone()),
        None => PointId::from_coords(lat, lng),
    };

    Some(GeoPoint {
        id,
        lat,
        lng,
        payload: HotspotRecord {
            key,
            name: field(obj, NAME_FIELDS).and_then(text_value).unwrap_or_default(),
            client: field(obj, CLIENT_FIELDS).and_then(text_value),
            password_2g: field(obj, PASSWORD_2G_FIELDS).and_then(text_value),
            password_5g: field(obj, PASSWORD_5G_FIELDS).and_then(text_value),
        },
    })
}

/// First non-null value among the aliases.
fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| obj.get(*name))
        .find(|v| !v.is_null())
}

/// Text form of a scalar; empty strings count as absent.
fn text_value(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    Some(text).filter(|s| !s.is_empty())
}

/// Parses a coordinate from a JSON number or a string using `.` or `,` as the
/// decimal separator. Returns `None` for anything that is not a finite number.
///
/// ```rust
/// use hotspot_locator::parse_coordinate;
/// use serde_json::json;
///
/// assert_eq!(parse_coordinate(&json!("-20,3")), Some(-20.3));
/// assert_eq!(parse_coordinate(&json!(-40.4)), Some(-40.4));
/// assert_eq!(parse_coordinate(&json!("")), None);
/// ```
pub fn parse_coordinate(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().replace(',', ".").parse::<f64>().ok()?,
        _ => return None,
    };
    Some(parsed).filter(|v| v.is_finite())
}

/// Unwraps a list response into its rows.
///
/// Accepts a bare array, an object nesting the rows under `list`, `records` or
/// `data`, or a single row object (which becomes a one-element list). Anything
/// else yields an empty list.
pub fn ensure_array(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => {
            for key in ENVELOPE_KEYS {
                if matches!(obj.get(*key), Some(Value::Array(_))) {
                    if let Some(Value::Array(items)) = obj.remove(*key) {
                        return items;
                    }
                }
            }
            vec![Value::Object(obj)]
        }
        _ => Vec::new(),
    }
}

// ============================================================================
// Map link import
// ============================================================================

/// Extracts a coordinate from a pasted map link.
///
/// Recognized forms, tried in order:
/// - `.../@-20.123456,-40.123456,17z`
/// - `...!3d-20.123456!4d-40.123456`
/// - `...?q=-20.123456,-40.123456` / `&q=`
/// - `...?ll=-20.123456,-40.123456` / `&ll=`
/// - any two decimal numbers separated by non-numeric text, if in range
///
/// ```rust
/// use hotspot_locator::parse_maps_url;
///
/// let c = parse_maps_url("https://www.google.com/maps/@-20.123456,-40.654321,17z").unwrap();
/// assert_eq!((c.lat, c.lng), (-20.123456, -40.654321));
/// ```
pub fn parse_maps_url(url: &str) -> Option<LatLng> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }
    let decoded = percent_decode(trimmed)?;

    [&*AT_FORM, &*DATA_FORM, &*QUERY_FORM, &*LL_FORM]
        .into_iter()
        .find_map(|form| {
            form.captures_iter(&decoded)
                .find_map(|caps| capture_pair(&caps).filter(LatLng::is_valid))
        })
        .or_else(|| {
            // Only the first loose match counts
            LOOSE_FORM
                .captures(&decoded)
                .and_then(|caps| capture_pair(&caps))
                .filter(LatLng::is_valid)
        })
}

static AT_FORM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(-?[0-9]+\.[0-9]+),(-?[0-9]+\.[0-9]+)").unwrap());

static DATA_FORM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!3d(-?[0-9]+\.[0-9]+)!4d(-?[0-9]+\.[0-9]+)").unwrap());

static QUERY_FORM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]q=(-?[0-9]+\.[0-9]+),(-?[0-9]+\.[0-9]+)").unwrap());

static LL_FORM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[?&]ll=(-?[0-9]+\.[0-9]+),(-?[0-9]+\.[0-9]+)").unwrap());

static LOOSE_FORM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(-?[0-9]+\.[0-9]+)[^0-9-]+(-?[0-9]+\.[0-9]+)").unwrap());

static PERCENT_ESCAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%([0-9A-Fa-f]{2})").unwrap());

fn capture_pair(caps: &Captures<'_>) -> Option<LatLng> {
    let lat = caps.get(1)?.as_str().parse().ok()?;
    let lng = caps.get(2)?.as_str().parse().ok()?;
    Some(LatLng::new(lat, lng))
}

/// Decodes `%XX` escapes. A stray `%` or invalid UTF-8 yields `None`.
fn percent_decode(input: &str) -> Option<String> {
    if PERCENT_ESCAPE.find_iter(input).count() != input.matches('%').count() {
        return None;
    }
    let mut out = Vec::with_capacity(input.len());
    let mut last = 0;
    for caps in PERCENT_ESCAPE.captures_iter(input) {
        let escape = caps.get(0)?;
        out.extend_from_slice(input[last..escape.start()].as_bytes());
        out.push(u8::from_str_radix(caps.get(1)?.as_str(), 16).ok()?);
        last = escape.end();
    }
    out.extend_from_slice(input[last..].as_bytes());
    String::from_utf8(out).ok()
}
