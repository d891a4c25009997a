//! Sorting, filtering and paging of catalog queries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};

/// Sort direction.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

impl FromStr for SortDirection {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Ok(SortDirection::Asc),
            "DESC" => Ok(SortDirection::Desc),
            _ => Err(CatalogError::UnknownQueryField {
                kind: "sort direction",
                name: s.to_string(),
            }),
        }
    }
}

/// Sortable fields of validation reports.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportSort {
    /// Time the report was produced.
    #[serde(rename = "VALIDATION_TIME")]
    ValidationTime,
}

impl ReportSort {
    /// Name used by API callers.
    pub fn name(&self) -> &'static str {
        match self {
            ReportSort::ValidationTime => "VALIDATION_TIME",
        }
    }

    /// Direction used when the caller gives none.
    pub fn default_direction(&self) -> SortDirection {
        match self {
            ReportSort::ValidationTime => SortDirection::Desc,
        }
    }
}

impl fmt::Display for ReportSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReportSort {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VALIDATION_TIME" => Ok(ReportSort::ValidationTime),
            _ => Err(CatalogError::UnknownQueryField {
                kind: "sort",
                name: s.to_string(),
            }),
        }
    }
}

/// One sort key.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SortBy {
    /// Field to sort on.
    pub field: ReportSort,
    /// Explicit direction, or the field's default.
    pub direction: Option<SortDirection>,
}

impl SortBy {
    /// Sort on `field` in its default direction.
    pub fn new(field: ReportSort) -> Self {
        Self {
            field,
            direction: None,
        }
    }

    /// Sort on `field` in `direction`.
    pub fn with_direction(field: ReportSort, direction: SortDirection) -> Self {
        Self {
            field,
            direction: Some(direction),
        }
    }

    /// The direction that applies.
    pub fn effective_direction(&self) -> SortDirection {
        self.direction
            .unwrap_or_else(|| self.field.default_direction())
    }
}

/// Filterable predicates on validation reports.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportFilter {
    /// Validation time strictly after the parameter.
    ValidationTimeGt,
    /// Validation time strictly before the parameter.
    ValidationTimeLt,
    /// Validation time equal to the parameter.
    ValidationTimeEq,
}

impl ReportFilter {
    /// Name used by API callers.
    pub fn name(&self) -> &'static str {
        match self {
            ReportFilter::ValidationTimeGt => "VALIDATION_TIME_GT",
            ReportFilter::ValidationTimeLt => "VALIDATION_TIME_LT",
            ReportFilter::ValidationTimeEq => "VALIDATION_TIME_EQ",
        }
    }
}

impl fmt::Display for ReportFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ReportFilter {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "VALIDATION_TIME_GT" => Ok(ReportFilter::ValidationTimeGt),
            "VALIDATION_TIME_LT" => Ok(ReportFilter::ValidationTimeLt),
            "VALIDATION_TIME_EQ" => Ok(ReportFilter::ValidationTimeEq),
            _ => Err(CatalogError::UnknownQueryField {
                kind: "filter",
                name: s.to_string(),
            }),
        }
    }
}

/// One filter with its raw parameter, an epoch-milliseconds string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterBy {
    /// The predicate.
    pub filter: ReportFilter,
    /// Unparsed parameter as supplied by the caller.
    pub param: String,
}

impl FilterBy {
    /// Creates a filter.
    pub fn new(filter: ReportFilter, param: impl Into<String>) -> Self {
        Self {
            filter,
            param: param.into(),
        }
    }

    /// Binds the parameter as a timestamp.
    pub fn timestamp(&self) -> CatalogResult<DateTime<Utc>> {
        let invalid = |reason: &str| CatalogError::InvalidFilter {
            filter: self.filter.to_string(),
            param: self.param.clone(),
            reason: reason.to_string(),
        };
        let millis: i64 = self
            .param
            .trim()
            .parse()
            .map_err(|_| invalid("expected epoch milliseconds"))?;
        DateTime::from_timestamp_millis(millis).ok_or_else(|| invalid("timestamp out of range"))
    }

    /// Returns true if `time` satisfies the predicate at `bound`.
    pub(crate) fn accepts(&self, time: &DateTime<Utc>, bound: &DateTime<Utc>) -> bool {
        match self.filter {
            ReportFilter::ValidationTimeGt => time > bound,
            ReportFilter::ValidationTimeLt => time < bound,
            ReportFilter::ValidationTimeEq => time == bound,
        }
    }
}

/// A page of results plus the total number of matches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo<T> {
    /// Matches before paging.
    pub count: u64,
    /// The requested page.
    pub items: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_defaults_to_desc() {
        let sort = SortBy::new(ReportSort::ValidationTime);
        assert_eq!(sort.effective_direction(), SortDirection::Desc);
        let asc = SortBy::with_direction(ReportSort::ValidationTime, SortDirection::Asc);
        assert_eq!(asc.effective_direction(), SortDirection::Asc);
    }

    #[test]
    fn test_names_round_trip() {
        assert_eq!("VALIDATION_TIME".parse::<ReportSort>().unwrap(), ReportSort::ValidationTime);
        for filter in [
            ReportFilter::ValidationTimeGt,
            ReportFilter::ValidationTimeLt,
            ReportFilter::ValidationTimeEq,
        ] {
            assert_eq!(filter.name().parse::<ReportFilter>().unwrap(), filter);
        }
        assert!(matches!(
            "CREATED".parse::<ReportSort>(),
            Err(CatalogError::UnknownQueryField { kind: "sort", .. })
        ));
        assert_eq!("desc".parse::<SortDirection>().unwrap(), SortDirection::Desc);
    }

    #[test]
    fn test_filter_binds_epoch_millis() {
        let f = FilterBy::new(ReportFilter::ValidationTimeGt, "1700000000123");
        assert_eq!(f.timestamp().unwrap().timestamp_millis(), 1_700_000_000_123);
    }

    #[test]
    fn test_filter_rejects_garbage() {
        let f = FilterBy::new(ReportFilter::ValidationTimeEq, "yesterday");
        match f.timestamp() {
            Err(CatalogError::InvalidFilter { filter, param, .. }) => {
                assert_eq!(filter, "VALIDATION_TIME_EQ");
                assert_eq!(param, "yesterday");
            }
            other => panic!("expected InvalidFilter, got {:?}", other),
        }
    }
}
