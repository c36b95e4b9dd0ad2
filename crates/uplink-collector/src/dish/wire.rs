//! Descriptor-less protobuf wire-format parsing.
//!
//! When the reflection service is unavailable the raw response bytes are
//! walked field by field (varint, 32-bit, 64-bit, length-delimited) and a
//! small set of known field numbers is mapped to semantic names. When even
//! structured walking fails, a heuristic scan extracts IEEE-754 floats from
//! the byte stream and assigns them by value range — results of that branch
//! must be marked `heuristic` in provenance.

use serde_json::{Map, Number, Value};

/// Known status field numbers on the wire.
const FIELD_POP_PING_LATENCY_MS: u32 = 13;
const FIELD_POP_PING_DROP_RATE: u32 = 14;
const FIELD_FRACTION_OBSTRUCTED: u32 = 15;
const FIELD_SNR: u32 = 16;

/// Device-info strings sit at the low field numbers.
const FIELD_DEVICE_ID: u32 = 1;
const FIELD_HARDWARE_VERSION: u32 = 2;
const FIELD_SOFTWARE_VERSION: u32 = 3;
const FIELD_COUNTRY_CODE: u32 = 4;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum WireValue {
    Varint(u64),
    Fixed32(u32),
    Fixed64(u64),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct WireField {
    pub number: u32,
    pub value: WireValue,
}

/// Walk a complete protobuf message. `None` on any malformed field.
pub(crate) fn walk(bytes: &[u8]) -> Option<Vec<WireField>> {
    let mut fields = Vec::new();
    let mut buf = bytes;
    while !buf.is_empty() {
        let key = decode_varint(&mut buf)?;
        let number = u32::try_from(key >> 3).ok()?;
        if number == 0 {
            return None;
        }
        let value = match key & 0x7 {
            0 => WireValue::Varint(decode_varint(&mut buf)?),
            1 => {
                if buf.len() < 8 {
                    return None;
                }
                let (raw, rest) = buf.split_at(8);
                buf = rest;
                WireValue::Fixed64(u64::from_le_bytes(raw.try_into().ok()?))
            }
            2 => {
                let len = usize::try_from(decode_varint(&mut buf)?).ok()?;
                if buf.len() < len {
                    return None;
                }
                let (raw, rest) = buf.split_at(len);
                buf = rest;
                WireValue::Bytes(raw.to_vec())
            }
            5 => {
                if buf.len() < 4 {
                    return None;
                }
                let (raw, rest) = buf.split_at(4);
                buf = rest;
                WireValue::Fixed32(u32::from_le_bytes(raw.try_into().ok()?))
            }
            _ => return None,
        };
        fields.push(WireField { number, value });
    }
    Some(fields)
}

fn decode_varint(buf: &mut &[u8]) -> Option<u64> {
    let mut value: u64 = 0;
    for i in 0..10 {
        let byte = *buf.get(i)?;
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            *buf = &buf[i + 1..];
            return Some(value);
        }
    }
    None
}

/// Map a walked response onto status field names.
///
/// An already-unwrapped status message is recognized directly; otherwise
/// the response wraps the status variant in one length-delimited field and
/// each embedded message is tried in turn.
pub(crate) fn status_from_wire(bytes: &[u8]) -> Option<Map<String, Value>> {
    let top = walk(bytes)?;
    let top_map = map_known_fields(top.clone());
    if has_status_floats(&top_map) {
        return Some(top_map);
    }
    for field in &top {
        if let WireValue::Bytes(inner) = &field.value {
            if let Some(inner_fields) = walk(inner) {
                let map = map_known_fields(inner_fields);
                if has_status_floats(&map) {
                    return Some(map);
                }
            }
        }
    }
    if top_map.is_empty() {
        None
    } else {
        Some(top_map)
    }
}

fn has_status_floats(map: &Map<String, Value>) -> bool {
    [
        "popPingLatencyMs",
        "popPingDropRate",
        "fractionObstructed",
        "snr",
    ]
    .iter()
    .any(|key| map.contains_key(*key))
}

fn map_known_fields(fields: Vec<WireField>) -> Map<String, Value> {
    let mut map = Map::new();
    for field in fields {
        match (field.number, &field.value) {
            (FIELD_POP_PING_LATENCY_MS, _) => {
                insert_float(&mut map, "popPingLatencyMs", &field.value);
            }
            (FIELD_POP_PING_DROP_RATE, _) => {
                insert_float(&mut map, "popPingDropRate", &field.value);
            }
            (FIELD_FRACTION_OBSTRUCTED, _) => {
                insert_float(&mut map, "fractionObstructed", &field.value);
            }
            (FIELD_SNR, _) => {
                insert_float(&mut map, "snr", &field.value);
            }
            (FIELD_DEVICE_ID, WireValue::Bytes(raw)) => {
                insert_string(&mut map, "id", raw);
            }
            (FIELD_HARDWARE_VERSION, WireValue::Bytes(raw)) => {
                insert_string(&mut map, "hardwareVersion", raw);
            }
            (FIELD_SOFTWARE_VERSION, WireValue::Bytes(raw)) => {
                insert_string(&mut map, "softwareVersion", raw);
            }
            (FIELD_COUNTRY_CODE, WireValue::Bytes(raw)) => {
                insert_string(&mut map, "countryCode", raw);
            }
            _ => {}
        }
    }
    map
}

fn insert_float(map: &mut Map<String, Value>, key: &str, value: &WireValue) {
    let float = match value {
        WireValue::Fixed32(bits) => Some(f64::from(f32::from_bits(*bits))),
        WireValue::Fixed64(bits) => Some(f64::from_bits(*bits)),
        _ => None,
    };
    if let Some(f) = float.filter(|f| f.is_finite()) {
        if let Some(n) = Number::from_f64(f) {
            map.insert(key.to_string(), Value::Number(n));
        }
    }
}

fn insert_string(map: &mut Map<String, Value>, key: &str, raw: &[u8]) {
    if let Ok(s) = std::str::from_utf8(raw) {
        let s = s.trim();
        if !s.is_empty() && s.chars().all(|c| !c.is_control()) {
            map.insert(key.to_string(), Value::String(s.to_string()));
        }
    }
}

/// Last-resort scan: find little-endian IEEE-754 singles in the byte stream
/// and assign them to fields by plausible value range. A value in `(0, 1)`
/// is a fraction, `10..=200` is latency in ms, under 20 is SNR in dB.
pub(crate) fn heuristic_scan(bytes: &[u8]) -> Option<Map<String, Value>> {
    let mut fraction = None;
    let mut latency = None;
    let mut snr = None;

    for window in bytes.windows(4) {
        let v = f64::from(f32::from_le_bytes(window.try_into().ok()?));
        if !v.is_finite() || v <= 0.0 {
            continue;
        }
        if v < 1.0 {
            fraction.get_or_insert(v);
        } else if (10.0..=200.0).contains(&v) {
            latency.get_or_insert(v);
        } else if v < 20.0 {
            snr.get_or_insert(v);
        }
    }

    if fraction.is_none() && latency.is_none() && snr.is_none() {
        return None;
    }
    let mut map = Map::new();
    if let Some(f) = fraction.and_then(Number::from_f64) {
        map.insert("fractionObstructed".into(), Value::Number(f));
    }
    if let Some(l) = latency.and_then(Number::from_f64) {
        map.insert("popPingLatencyMs".into(), Value::Number(l));
    }
    if let Some(s) = snr.and_then(Number::from_f64) {
        map.insert("snr".into(), Value::Number(s));
    }
    Some(map)
}
