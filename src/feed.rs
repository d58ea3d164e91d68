//! ==============================================================================
//! feed.rs - search query construction and response decoding
//! ==============================================================================
//!
//! purpose:
//!     turns a FeedConfig into the JSON search body, and a search response
//!     back into a PollRecord. only `hits.hits[0]._source` is ever read;
//!     the query sorts newest first.
//!
//! relationships:
//!     - used by: source.rs (SearchSource::fetch)
//!     - reads: config.rs (FeedConfig, FieldMap)
//!     - produces: domain.rs (PollRecord)
//!
//! ==============================================================================

use crate::config::FeedConfig;
use crate::domain::{Coordinate, PollRecord, SignalStatus, TimestampToken};
use crate::error::PollError;
use serde_json::{json, Map, Value};

/// build the search request body for a feed
pub fn search_body(feed: &FeedConfig) -> Value {
    let ts = feed.fields.timestamp.as_str();

    let mut range = Map::new();
    range.insert(ts.to_string(), json!({ "gte": feed.lookback }));

    let mut sort = Map::new();
    sort.insert(ts.to_string(), json!({ "order": "desc" }));

    json!({
        "size": feed.size,
        "_source": feed.fields.source_fields(),
        "query": { "range": Value::Object(range) },
        "sort": [Value::Object(sort)],
    })
}

/// decode the newest hit into a record
///
/// `anchor` is used as the position when the feed has no coordinate fields.
pub fn decode_response(body: &Value, feed: &FeedConfig, anchor: Coordinate) -> Result<PollRecord, PollError> {
    let hits = body
        .pointer("/hits/hits")
        .and_then(Value::as_array)
        .ok_or_else(|| PollError::malformed("missing hits.hits"))?;

    let source = hits
        .first()
        .ok_or_else(|| PollError::malformed("no hits in range"))?
        .get("_source")
        .and_then(Value::as_object)
        .ok_or_else(|| PollError::malformed("hit has no _source"))?;

    decode_source(source, feed, anchor)
}

fn decode_source(source: &Map<String, Value>, feed: &FeedConfig, anchor: Coordinate) -> Result<PollRecord, PollError> {
    let fields = &feed.fields;

    let timestamp = source
        .get(&fields.timestamp)
        .and_then(timestamp_token)
        .ok_or_else(|| PollError::malformed(format!("missing or invalid {}", fields.timestamp)))?;

    let position = match (&fields.latitude, &fields.longitude) {
        (Some(lat), Some(lon)) => Coordinate::new(required_number(source, lat)?, required_number(source, lon)?),
        _ => anchor,
    };

    let source_id = fields
        .id
        .as_deref()
        .and_then(|f| source.get(f))
        .and_then(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| feed.name.clone());

    let signal_status = optional(source, fields.status.as_deref())
        .and_then(Value::as_str)
        .map(SignalStatus::parse)
        .unwrap_or_default();

    Ok(PollRecord {
        source_id,
        position,
        heading_linestring: optional(source, fields.linestring.as_deref()).and_then(decode_linestring),
        speed: optional(source, fields.speed.as_deref()).and_then(number),
        signal_status,
        remaining_seconds: optional(source, fields.remaining.as_deref()).and_then(number),
        status_sentence: optional(source, fields.sentence.as_deref())
            .and_then(Value::as_str)
            .map(str::to_string),
        timestamp,
    })
}

fn optional<'a>(source: &'a Map<String, Value>, field: Option<&str>) -> Option<&'a Value> {
    field.and_then(|f| source.get(f)).filter(|v| !v.is_null())
}

fn required_number(source: &Map<String, Value>, field: &str) -> Result<f64, PollError> {
    source
        .get(field)
        .and_then(number)
        .ok_or_else(|| PollError::malformed(format!("missing or invalid {}", field)))
}

/// finite number, or a string holding one
fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn timestamp_token(value: &Value) -> Option<TimestampToken> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(TimestampToken::from_text(s.as_str())),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(TimestampToken::from_epoch_millis),
        _ => None,
    }
}

/// `[[lat, lon], ..]` or a GeoJSON LineString (`[lon, lat]` pairs)
fn decode_linestring(value: &Value) -> Option<Vec<Coordinate>> {
    match value {
        Value::Array(points) => points
            .iter()
            .map(|p| pair(p).map(|(a, b)| Coordinate::new(a, b)))
            .collect(),
        Value::Object(obj) if obj.get("type").and_then(Value::as_str) == Some("LineString") => obj
            .get("coordinates")?
            .as_array()?
            .iter()
            .map(|p| pair(p).map(|(lon, lat)| Coordinate::new(lat, lon)))
            .collect(),
        _ => None,
    }
}

fn pair(value: &Value) -> Option<(f64, f64)> {
    match value.as_array()?.as_slice() {
        [a, b] => Some((number(a)?, number(b)?)),
        _ => None,
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeedsConfig;

    fn feeds() -> FeedsConfig {
        FeedsConfig::default()
    }

    fn wrap(source: Value) -> Value {
        json!({ "hits": { "hits": [ { "_source": source } ] } })
    }

    #[test]
    fn test_search_body_shape() {
        let body = search_body(&feeds().train);
        assert_eq!(body["size"], 10);
        assert_eq!(body["query"]["range"]["HOT_data_timestamp"]["gte"], "now-15m");
        assert_eq!(body["sort"][0]["HOT_data_timestamp"]["order"], "desc");
        let fields: Vec<&str> = body["_source"].as_array().unwrap().iter().filter_map(Value::as_str).collect();
        assert!(fields.contains(&"train_id"));
        assert!(fields.contains(&"train_linestring"));
        assert_eq!(fields.last(), Some(&"HOT_data_timestamp"));
    }

    #[test]
    fn test_decode_train_hit() {
        let body = wrap(json!({
            "train_id": "BNSF-4410",
            "HOT_latitude": 38.43,
            "HOT_longitude": -104.29,
            "HOT_speed_mph": 42.5,
            "HOT_data_timestamp": "2025-06-01T10:00:00Z",
            "train_linestring": [[38.42, -104.30], [38.425, -104.295]]
        }));
        let record = decode_response(&body, &feeds().train, Coordinate::default()).unwrap();
        assert_eq!(record.source_id, "BNSF-4410");
        assert_eq!(record.position, Coordinate::new(38.43, -104.29));
        assert_eq!(record.speed, Some(42.5));
        assert_eq!(record.heading_linestring.as_ref().map(Vec::len), Some(2));
        assert_eq!(record.signal_status, SignalStatus::Unknown);
        assert_eq!(record.timestamp.as_str(), "2025-06-01T10:00:00Z");
    }

    #[test]
    fn test_decode_only_reads_first_hit() {
        let body = json!({ "hits": { "hits": [
            { "_source": { "prediction_timestamp": "2025-06-01T10:00:02Z", "remaining_time": 12 } },
            { "_source": { "prediction_timestamp": "2025-06-01T10:00:01Z", "remaining_time": 13 } }
        ] } });
        let record = decode_response(&body, &feeds().signal, Coordinate::default()).unwrap();
        assert_eq!(record.remaining_seconds, Some(12.0));
    }

    #[test]
    fn test_decode_signal_hit_uses_anchor() {
        let anchor = Coordinate::new(38.422040, -104.338302);
        let body = wrap(json!({
            "light_status": "GREEN",
            "remaining_time": "30",
            "sentence": "Crossing is clear",
            "prediction_timestamp": 1_748_772_000_000i64
        }));
        let record = decode_response(&body, &feeds().signal, anchor).unwrap();
        assert_eq!(record.position, anchor);
        assert_eq!(record.source_id, "signal");
        assert_eq!(record.signal_status, SignalStatus::Green);
        assert_eq!(record.remaining_seconds, Some(30.0));
        assert_eq!(record.status_sentence.as_deref(), Some("Crossing is clear"));
        assert!(record.timestamp.instant().is_some());
    }

    #[test]
    fn test_geojson_linestring_swaps_axes() {
        let body = wrap(json!({
            "train_id": 7,
            "HOT_latitude": 38.0,
            "HOT_longitude": -104.0,
            "HOT_data_timestamp": "2025-06-01T10:00:00Z",
            "train_linestring": { "type": "LineString", "coordinates": [[-104.5, 38.5]] }
        }));
        let record = decode_response(&body, &feeds().train, Coordinate::default()).unwrap();
        assert_eq!(record.source_id, "7");
        assert_eq!(record.heading_linestring, Some(vec![Coordinate::new(38.5, -104.5)]));
    }

    #[test]
    fn test_bad_linestring_is_dropped_not_fatal() {
        let body = wrap(json!({
            "HOT_latitude": 38.0,
            "HOT_longitude": -104.0,
            "HOT_data_timestamp": "2025-06-01T10:00:00Z",
            "train_linestring": [[1.0, 2.0, 3.0]]
        }));
        let record = decode_response(&body, &feeds().train, Coordinate::default()).unwrap();
        assert!(record.heading_linestring.is_none());
        assert_eq!(record.source_id, "train");
    }

    #[test]
    fn test_empty_hits_is_malformed() {
        let body = json!({ "hits": { "hits": [] } });
        let err = decode_response(&body, &feeds().train, Coordinate::default()).unwrap_err();
        assert!(matches!(err, PollError::Malformed(_)));
    }

    #[test]
    fn test_missing_timestamp_is_malformed() {
        let body = wrap(json!({ "HOT_latitude": 38.0, "HOT_longitude": -104.0 }));
        assert!(matches!(
            decode_response(&body, &feeds().train, Coordinate::default()),
            Err(PollError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_coordinates_is_malformed() {
        let body = wrap(json!({ "HOT_latitude": 38.0, "HOT_data_timestamp": "2025-06-01T10:00:00Z" }));
        assert!(decode_response(&body, &feeds().train, Coordinate::default()).is_err());
    }

    #[test]
    fn test_not_a_search_response() {
        let body = json!({ "error": "index_not_found_exception" });
        assert!(matches!(
            decode_response(&body, &feeds().signal, Coordinate::default()),
            Err(PollError::Malformed(_))
        ));
    }
}
