//! Item normalization
//!
//! Upstream records differ per kind: movies carry `release_date` and
//! sometimes `revenue`, tv shows carry `first_air_date`, people carry neither.
//! Everything is reduced to the same comparison surface here; the raw record
//! rides along untouched for the caller.

use serde_json::Value;

use crate::models::{ChronoKey, Kind, NormalizedItem, RawItem};

fn number(raw: &Value, field: &str) -> f64 {
    match raw.get(field) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        // Some payloads quote numerics.
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    }
}

fn date_field(raw: &Value, field: &str) -> ChronoKey {
    ChronoKey::parse(raw.get(field).and_then(Value::as_str))
}

/// Normalize a record whose kind is known from the endpoint it came from.
///
/// Returns `None` when the record has no usable numeric `id`.
pub fn normalize(kind: Kind, raw: RawItem) -> Option<NormalizedItem> {
    let id = raw.get("id").and_then(Value::as_u64)?;
    let popularity = number(&raw, "popularity");

    let (quality, chrono_key, monetary_key) = match kind {
        Kind::Movie => {
            let chrono = match date_field(&raw, "release_date") {
                ChronoKey::Unknown => date_field(&raw, "primary_release_date"),
                known => known,
            };
            (number(&raw, "vote_average"), chrono, number(&raw, "revenue"))
        }
        Kind::Tv => (
            number(&raw, "vote_average"),
            date_field(&raw, "first_air_date"),
            0.0,
        ),
        Kind::Person => (0.0, ChronoKey::Unknown, 0.0),
    };

    Some(NormalizedItem {
        id,
        kind,
        popularity,
        quality,
        chrono_key,
        monetary_key,
        raw,
    })
}

/// Work out the kind of a mixed search result.
///
/// An explicit `media_type` wins. Otherwise the record's shape decides:
/// `title` means movie, `name` without `known_for` means tv, and
/// `known_for`/`known_for_department` means person.
pub fn infer_kind(raw: &Value) -> Option<Kind> {
    if let Some(kind) = raw.get("media_type").and_then(Value::as_str).and_then(Kind::parse) {
        return Some(kind);
    }

    let has = |field: &str| raw.get(field).map_or(false, |v| !v.is_null());

    if has("title") {
        Some(Kind::Movie)
    } else if has("name") && !has("known_for") {
        Some(Kind::Tv)
    } else if has("known_for") || has("known_for_department") {
        Some(Kind::Person)
    } else {
        None
    }
}

/// Normalize every record of one listing page, dropping records without an id.
pub fn normalize_page(kind: Kind, raw_items: Vec<RawItem>) -> Vec<NormalizedItem> {
    raw_items
        .into_iter()
        .filter_map(|raw| normalize(kind, raw))
        .collect()
}

/// Normalize a mixed search page, tagging each record with its inferred kind.
pub fn normalize_mixed(raw_items: Vec<RawItem>) -> Vec<NormalizedItem> {
    raw_items
        .into_iter()
        .filter_map(|raw| {
            let kind = infer_kind(&raw)?;
            normalize(kind, raw)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn test_normalize_movie() {
        let item = normalize(
            Kind::Movie,
            json!({
                "id": 603,
                "title": "The Matrix",
                "popularity": 83.5,
                "vote_average": 8.2,
                "release_date": "1999-03-31",
                "revenue": 463517383
            }),
        )
        .unwrap();

        assert_eq!(item.identity(), (Kind::Movie, 603));
        assert_eq!(item.popularity, 83.5);
        assert_eq!(item.quality, 8.2);
        assert_eq!(item.monetary_key, 463517383.0);
        assert_eq!(
            item.chrono_key,
            ChronoKey::Known(NaiveDate::from_ymd_opt(1999, 3, 31).unwrap())
        );
        assert_eq!(item.raw["title"], "The Matrix");
    }

    #[test]
    fn test_normalize_tv_has_no_monetary_key() {
        let item = normalize(
            Kind::Tv,
            json!({
                "id": 1399,
                "name": "Game of Thrones",
                "popularity": 300.1,
                "first_air_date": "2011-04-17",
                "revenue": 12345
            }),
        )
        .unwrap();

        assert_eq!(item.monetary_key, 0.0);
        assert_eq!(item.quality, 0.0);
        assert!(matches!(item.chrono_key, ChronoKey::Known(_)));
    }

    #[test]
    fn test_missing_and_bad_dates_are_unknown() {
        let blank = normalize(Kind::Movie, json!({"id": 1, "release_date": ""})).unwrap();
        let bad = normalize(Kind::Tv, json!({"id": 2, "first_air_date": "2011-13-45"})).unwrap();
        let missing = normalize(Kind::Movie, json!({"id": 3})).unwrap();

        assert_eq!(blank.chrono_key, ChronoKey::Unknown);
        assert_eq!(bad.chrono_key, ChronoKey::Unknown);
        assert_eq!(missing.chrono_key, ChronoKey::Unknown);
        assert_eq!(missing.popularity, 0.0);
    }

    #[test]
    fn test_record_without_id_is_dropped() {
        let items = normalize_page(
            Kind::Movie,
            vec![json!({"title": "no id"}), json!({"id": "7"}), json!({"id": 8})],
        );
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, 8);
    }

    #[test]
    fn test_quoted_numbers() {
        let item = normalize(Kind::Movie, json!({"id": 4, "popularity": "12.5"})).unwrap();
        assert_eq!(item.popularity, 12.5);
    }

    #[test]
    fn test_infer_kind() {
        assert_eq!(infer_kind(&json!({"media_type": "tv", "title": "x"})), Some(Kind::Tv));
        assert_eq!(infer_kind(&json!({"title": "Heat"})), Some(Kind::Movie));
        assert_eq!(infer_kind(&json!({"name": "Lost"})), Some(Kind::Tv));
        assert_eq!(
            infer_kind(&json!({"name": "Keanu Reeves", "known_for": []})),
            Some(Kind::Person)
        );
        assert_eq!(
            infer_kind(&json!({"known_for_department": "Acting"})),
            Some(Kind::Person)
        );
        assert_eq!(infer_kind(&json!({"id": 5})), None);
    }

    #[test]
    fn test_normalize_mixed_tags_kinds() {
        let items = normalize_mixed(vec![
            json!({"id": 1, "media_type": "movie", "title": "Heat"}),
            json!({"id": 2, "name": "Lost", "first_air_date": "2004-09-22"}),
            json!({"id": 3, "name": "Al Pacino", "known_for": []}),
            json!({"id": 4}),
        ]);

        let kinds: Vec<Kind> = items.iter().map(|i| i.kind).collect();
        assert_eq!(kinds, vec![Kind::Movie, Kind::Tv, Kind::Person]);
    }
}
