//! Sort options and the per-kind native sort translation
//!
//! Callers pick one of eight `SortOption`s. Each upstream listing only
//! understands its own `sort_by` vocabulary, so `translate` maps the option
//! onto the closest native key. When a kind cannot express the field at all
//! the translation falls back to that kind's default and the merge layer is
//! responsible for the final order.

use serde::{Deserialize, Serialize};

use crate::models::Kind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Popularity,
    Quality,
    Chrono,
    Monetary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortOption {
    pub field: SortField,
    pub direction: SortDirection,
}

impl Default for SortOption {
    fn default() -> Self {
        Self::POPULARITY_DESC
    }
}

impl SortOption {
    pub const POPULARITY_DESC: SortOption = SortOption {
        field: SortField::Popularity,
        direction: SortDirection::Desc,
    };

    pub const fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::POPULARITY_DESC
    }

    /// Parse the upstream-style wire name (`vote_average.desc`,
    /// `first_air_date.asc`, ...). Both date spellings map to the chrono field.
    pub fn parse(s: &str) -> Option<Self> {
        let (field, direction) = s.trim().rsplit_once('.')?;
        let field = match field {
            "popularity" => SortField::Popularity,
            "vote_average" => SortField::Quality,
            "primary_release_date" | "release_date" | "first_air_date" => SortField::Chrono,
            "revenue" => SortField::Monetary,
            _ => return None,
        };
        let direction = match direction {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            _ => return None,
        };
        Some(Self { field, direction })
    }

    /// Canonical wire name, as used by the movie listing.
    pub fn as_wire(&self) -> String {
        let field = match self.field {
            SortField::Popularity => "popularity",
            SortField::Quality => "vote_average",
            SortField::Chrono => "primary_release_date",
            SortField::Monetary => "revenue",
        };
        format!("{}.{}", field, self.direction.as_str())
    }
}

impl std::fmt::Display for SortOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_wire())
    }
}

/// Sort key in one upstream listing's own vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeSort {
    pub key: &'static str,
    pub direction: SortDirection,
    /// Set when the requested field was not expressible for the kind.
    pub fallback: bool,
}

impl NativeSort {
    /// Default listing order of every upstream kind.
    pub const POPULARITY_DESC: NativeSort = NativeSort {
        key: "popularity",
        direction: SortDirection::Desc,
        fallback: false,
    };

    fn fallback() -> Self {
        Self {
            fallback: true,
            ..Self::POPULARITY_DESC
        }
    }

    /// Value for the upstream `sort_by` parameter.
    pub fn sort_by(&self) -> String {
        format!("{}.{}", self.key, self.direction.as_str())
    }

    pub fn is_quality(&self) -> bool {
        self.key == "vote_average"
    }
}

/// Map a requested sort onto the nearest native key for `kind`.
pub fn translate(kind: Kind, requested: SortOption) -> NativeSort {
    let key = match (kind, requested.field) {
        (_, SortField::Popularity) => Some("popularity"),
        (Kind::Movie, SortField::Quality) | (Kind::Tv, SortField::Quality) => Some("vote_average"),
        (Kind::Movie, SortField::Chrono) => Some("primary_release_date"),
        (Kind::Tv, SortField::Chrono) => Some("first_air_date"),
        (Kind::Movie, SortField::Monetary) => Some("revenue"),
        _ => None,
    };

    match key {
        Some(_) if kind == Kind::Person && requested.direction == SortDirection::Asc => {
            NativeSort::fallback()
        }
        Some(key) => NativeSort {
            key,
            direction: requested.direction,
            fallback: false,
        },
        None => NativeSort::fallback(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wire_names() {
        assert_eq!(SortOption::parse("popularity.desc"), Some(SortOption::POPULARITY_DESC));
        assert_eq!(
            SortOption::parse("first_air_date.asc"),
            Some(SortOption::new(SortField::Chrono, SortDirection::Asc))
        );
        assert_eq!(
            SortOption::parse("primary_release_date.desc"),
            Some(SortOption::new(SortField::Chrono, SortDirection::Desc))
        );
        assert_eq!(SortOption::parse("revenue.sideways"), None);
        assert_eq!(SortOption::parse("title.asc"), None);
        assert_eq!(SortOption::parse("popularity"), None);
    }

    #[test]
    fn test_wire_name_round_trip() {
        let option = SortOption::new(SortField::Quality, SortDirection::Asc);
        assert_eq!(option.as_wire(), "vote_average.asc");
        assert_eq!(SortOption::parse(&option.as_wire()), Some(option));
    }

    #[test]
    fn test_translate_movie_supports_everything() {
        let native = translate(
            Kind::Movie,
            SortOption::new(SortField::Monetary, SortDirection::Asc),
        );
        assert_eq!(native.sort_by(), "revenue.asc");
        assert!(!native.fallback);
    }

    #[test]
    fn test_translate_tv_dates_and_revenue_fallback() {
        let chrono = translate(Kind::Tv, SortOption::new(SortField::Chrono, SortDirection::Desc));
        assert_eq!(chrono.sort_by(), "first_air_date.desc");
        assert!(!chrono.fallback);

        let revenue = translate(Kind::Tv, SortOption::new(SortField::Monetary, SortDirection::Asc));
        assert_eq!(revenue.sort_by(), "popularity.desc");
        assert!(revenue.fallback);
    }

    #[test]
    fn test_translate_person_only_knows_popularity() {
        let quality = translate(
            Kind::Person,
            SortOption::new(SortField::Quality, SortDirection::Desc),
        );
        assert!(quality.fallback);
        assert_eq!(quality.sort_by(), "popularity.desc");

        let asc = translate(
            Kind::Person,
            SortOption::new(SortField::Popularity, SortDirection::Asc),
        );
        assert!(asc.fallback);
        assert_eq!(
            translate(Kind::Person, SortOption::POPULARITY_DESC),
            NativeSort::POPULARITY_DESC
        );
    }
}
