//! Deterministic merge of normalized items from several upstream sources
//!
//! # Ordering Key (Total Order)
//!
//! Items are ordered by a 3-level key:
//! 1. **Primary**: the field selected by the `SortOption`, in its direction
//! 2. **Secondary**: `kind` ascending (movie < tv < person)
//! 3. **Tertiary**: `id` ascending
//!
//! Levels 2 and 3 do not follow the requested direction. Since `(kind, id)` is
//! unique after deduplication the order is total, so any permutation of the
//! same input produces the same output.
//!
//! # Missing Values
//!
//! Missing numeric fields were already normalized to `0`. A missing or
//! unparsable date is `ChronoKey::Unknown`, which is smaller than every known
//! date: it sorts **after** all known dates when descending and **before** them
//! when ascending. This is a policy of this layer, not something the upstream
//! guarantees.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::{Kind, NormalizedItem};
use crate::sort::{SortDirection, SortField, SortOption};

// =============================================================================
// COMPARATOR
// =============================================================================

fn primary(a: &NormalizedItem, b: &NormalizedItem, field: SortField) -> Ordering {
    match field {
        SortField::Popularity => a.popularity.total_cmp(&b.popularity),
        SortField::Quality => a.quality.total_cmp(&b.quality),
        SortField::Chrono => a.chrono_key.cmp(&b.chrono_key),
        SortField::Monetary => a.monetary_key.total_cmp(&b.monetary_key),
    }
}

/// Full comparator for `sort`, including the `(kind, id)` tie-break.
pub fn compare(a: &NormalizedItem, b: &NormalizedItem, sort: SortOption) -> Ordering {
    let ord = primary(a, b, sort.field);
    let ord = match sort.direction {
        SortDirection::Asc => ord,
        SortDirection::Desc => ord.reverse(),
    };
    ord.then_with(|| a.identity().cmp(&b.identity()))
}

// =============================================================================
// MERGE
// =============================================================================

/// Drop repeated `(kind, id)` pairs, keeping the first occurrence.
pub fn dedupe(items: impl IntoIterator<Item = NormalizedItem>) -> Vec<NormalizedItem> {
    let mut seen: HashSet<(Kind, u64)> = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.identity()))
        .collect()
}

/// Order items in place with the full comparator.
pub fn sort_items(items: &mut [NormalizedItem], sort: SortOption) {
    items.sort_by(|a, b| compare(a, b, sort));
}

/// Combine rounds of normalized items into one ordered, duplicate-free sequence.
///
/// Rounds are consumed in order, so "first occurrence" means the earliest
/// round and, within a round, the earliest position.
pub fn merge_rounds<I>(rounds: I, sort: SortOption) -> Vec<NormalizedItem>
where
    I: IntoIterator,
    I::Item: IntoIterator<Item = NormalizedItem>,
{
    let mut merged = dedupe(rounds.into_iter().flatten());
    sort_items(&mut merged, sort);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChronoKey;
    use chrono::NaiveDate;
    use serde_json::json;

    fn item(kind: Kind, id: u64, popularity: f64) -> NormalizedItem {
        NormalizedItem {
            id,
            kind,
            popularity,
            quality: 0.0,
            chrono_key: ChronoKey::Unknown,
            monetary_key: 0.0,
            raw: json!({ "id": id }),
        }
    }

    fn dated(kind: Kind, id: u64, date: Option<(i32, u32, u32)>) -> NormalizedItem {
        let mut it = item(kind, id, 1.0);
        it.chrono_key = date
            .and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
            .map(ChronoKey::Known)
            .unwrap_or(ChronoKey::Unknown);
        it
    }

    fn ids(items: &[NormalizedItem]) -> Vec<(Kind, u64)> {
        items.iter().map(NormalizedItem::identity).collect()
    }

    #[test]
    fn test_popularity_desc_with_tie_break() {
        let merged = merge_rounds(
            vec![
                vec![item(Kind::Tv, 2, 50.0), item(Kind::Movie, 9, 10.0)],
                vec![item(Kind::Movie, 3, 50.0), item(Kind::Tv, 1, 70.0)],
            ],
            SortOption::POPULARITY_DESC,
        );

        assert_eq!(
            ids(&merged),
            vec![(Kind::Tv, 1), (Kind::Movie, 3), (Kind::Tv, 2), (Kind::Movie, 9)]
        );
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let mut first = item(Kind::Movie, 7, 5.0);
        first.raw = json!({ "id": 7, "from": "first" });
        let mut second = item(Kind::Movie, 7, 99.0);
        second.raw = json!({ "id": 7, "from": "second" });

        let merged = merge_rounds(
            vec![vec![first, item(Kind::Tv, 7, 1.0)], vec![second]],
            SortOption::POPULARITY_DESC,
        );

        assert_eq!(merged.len(), 2);
        let movie = merged.iter().find(|i| i.kind == Kind::Movie).unwrap();
        assert_eq!(movie.raw["from"], "first");
        assert_eq!(movie.popularity, 5.0);
    }

    #[test]
    fn test_shuffled_input_gives_identical_order() {
        let base: Vec<NormalizedItem> = (0..12u64)
            .map(|i| {
                let kind = if i % 2 == 0 { Kind::Movie } else { Kind::Tv };
                item(kind, i / 2, (i % 4) as f64)
            })
            .collect();

        let expected = ids(&merge_rounds(vec![base.clone()], SortOption::POPULARITY_DESC));

        let mut reversed = base.clone();
        reversed.reverse();
        let mut rotated = base.clone();
        rotated.rotate_left(5);
        let mut interleaved: Vec<NormalizedItem> =
            base.iter().step_by(2).chain(base.iter().skip(1).step_by(2)).cloned().collect();
        interleaved.swap(0, 3);

        for shuffled in [reversed, rotated, interleaved] {
            let got = merge_rounds(vec![shuffled], SortOption::POPULARITY_DESC);
            assert_eq!(ids(&got), expected);
        }
    }

    #[test]
    fn test_unknown_dates_sort_last_descending_first_ascending() {
        let items = vec![
            dated(Kind::Movie, 1, Some((2001, 1, 1))),
            dated(Kind::Movie, 2, None),
            dated(Kind::Tv, 3, Some((2010, 6, 1))),
        ];

        let desc = merge_rounds(
            vec![items.clone()],
            SortOption::new(SortField::Chrono, SortDirection::Desc),
        );
        assert_eq!(ids(&desc), vec![(Kind::Tv, 3), (Kind::Movie, 1), (Kind::Movie, 2)]);

        let asc = merge_rounds(
            vec![items],
            SortOption::new(SortField::Chrono, SortDirection::Asc),
        );
        assert_eq!(ids(&asc), vec![(Kind::Movie, 2), (Kind::Movie, 1), (Kind::Tv, 3)]);
    }

    #[test]
    fn test_monetary_sort_treats_tv_as_zero() {
        let mut movie = item(Kind::Movie, 1, 1.0);
        movie.monetary_key = 1_000.0;
        let tv = item(Kind::Tv, 1, 99.0);

        let asc = merge_rounds(
            vec![vec![movie.clone(), tv.clone()]],
            SortOption::new(SortField::Monetary, SortDirection::Asc),
        );
        assert_eq!(ids(&asc), vec![(Kind::Tv, 1), (Kind::Movie, 1)]);

        let desc = merge_rounds(
            vec![vec![tv, movie]],
            SortOption::new(SortField::Monetary, SortDirection::Desc),
        );
        assert_eq!(ids(&desc), vec![(Kind::Movie, 1), (Kind::Tv, 1)]);
    }

    #[test]
    fn test_ties_break_ascending_even_when_descending() {
        let merged = merge_rounds(
            vec![vec![
                item(Kind::Tv, 4, 1.0),
                item(Kind::Movie, 8, 1.0),
                item(Kind::Movie, 2, 1.0),
            ]],
            SortOption::POPULARITY_DESC,
        );
        assert_eq!(ids(&merged), vec![(Kind::Movie, 2), (Kind::Movie, 8), (Kind::Tv, 4)]);
    }
}
