//! Validation reports and their facade.
//!
//! The facade is the catalog's table of data-validation reports, scoped by
//! feature group. Persisting is best effort: a record that breaks a
//! constraint is logged and dropped, never reported to the caller.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CatalogError, CatalogResult};
use crate::query::{CollectionInfo, FilterBy, SortBy, SortDirection};

/// Outcome of the ingestion that triggered a validation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestionResult {
    /// Data was written.
    Ingested,
    /// Data was rejected by the validation.
    Rejected,
    /// Validation ran outside an ingestion.
    Unknown,
}

/// One data-validation report of a feature group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Assigned on persist.
    pub id: Option<i32>,
    /// Feature group the report belongs to.
    pub featuregroup_id: i32,
    /// When the validation ran.
    pub validation_time: DateTime<Utc>,
    /// Overall success flag.
    pub success: bool,
    /// Name of the full report file on the filesystem.
    pub file_name: String,
    /// Statistics section of the report, as JSON.
    pub statistics: String,
    /// Free-form meta section, as JSON.
    pub meta: String,
    /// What happened to the data.
    pub ingestion_result: IngestionResult,
}

impl ValidationReport {
    /// A not yet persisted report.
    pub fn new(featuregroup_id: i32, validation_time: DateTime<Utc>, success: bool) -> Self {
        Self {
            id: None,
            featuregroup_id,
            validation_time,
            success,
            file_name: format!("report-{}.json", validation_time.timestamp_millis()),
            statistics: "{}".to_string(),
            meta: "{}".to_string(),
            ingestion_result: IngestionResult::Unknown,
        }
    }

    fn check_constraints(&self) -> CatalogResult<()> {
        if self.featuregroup_id <= 0 {
            return Err(CatalogError::ConstraintViolation(format!(
                "featuregroup id must be positive, got {}",
                self.featuregroup_id
            )));
        }
        if self.file_name.trim().is_empty() {
            return Err(CatalogError::ConstraintViolation(
                "file name must not be empty".to_string(),
            ));
        }
        for (field, json) in [("statistics", &self.statistics), ("meta", &self.meta)] {
            if serde_json::from_str::<serde_json::Value>(json).is_err() {
                return Err(CatalogError::ConstraintViolation(format!(
                    "{} is not valid JSON",
                    field
                )));
            }
        }
        Ok(())
    }
}

#[derive(Default)]
struct Table {
    next_id: i32,
    rows: BTreeMap<i32, ValidationReport>,
}

/// Table of validation reports.
#[derive(Default)]
pub struct ValidationReportFacade {
    table: RwLock<Table>,
}

impl ValidationReportFacade {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `report` and assigns its id.
    ///
    /// Constraint violations (bad fields, a duplicate file name within the
    /// feature group) are logged and leave `report.id` unset.
    pub fn persist(&self, report: &mut ValidationReport) {
        if let Err(e) = self.insert(report) {
            warn!(
                featuregroup = report.featuregroup_id,
                error = %e,
                "could not persist the new validation report"
            );
        }
    }

    fn insert(&self, report: &mut ValidationReport) -> CatalogResult<()> {
        report.check_constraints()?;
        let mut table = self.table.write();
        let duplicate = table.rows.values().any(|row| {
            row.featuregroup_id == report.featuregroup_id && row.file_name == report.file_name
        });
        if duplicate {
            return Err(CatalogError::ConstraintViolation(format!(
                "report {} already exists for featuregroup {}",
                report.file_name, report.featuregroup_id
            )));
        }
        table.next_id += 1;
        let id = table.next_id;
        report.id = Some(id);
        table.rows.insert(id, report.clone());
        debug!(id, featuregroup = report.featuregroup_id, "validation report persisted");
        Ok(())
    }

    /// Looks a report up by id.
    pub fn find_by_id(&self, id: i32) -> Option<ValidationReport> {
        self.table.read().rows.get(&id).cloned()
    }

    /// A page of the reports of a feature group.
    ///
    /// Every filter must hold. `count` is the number of matches before
    /// `offset` and `limit` are applied. Without sorts, reports come in
    /// insertion order.
    pub fn find(
        &self,
        offset: Option<usize>,
        limit: Option<usize>,
        sorts: &[SortBy],
        filters: &[FilterBy],
        featuregroup_id: i32,
    ) -> CatalogResult<CollectionInfo<ValidationReport>> {
        let bound = filters
            .iter()
            .map(|f| f.timestamp().map(|t| (f, t)))
            .collect::<CatalogResult<Vec<_>>>()?;

        let mut matches: Vec<ValidationReport> = self
            .table
            .read()
            .rows
            .values()
            .filter(|r| r.featuregroup_id == featuregroup_id)
            .filter(|r| bound.iter().all(|(f, t)| f.accepts(&r.validation_time, t)))
            .cloned()
            .collect();

        for sort in sorts.iter().rev() {
            let direction = sort.effective_direction();
            matches.sort_by(|a, b| {
                let ord = a.validation_time.cmp(&b.validation_time);
                match direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }

        let count = matches.len() as u64;
        let items = matches
            .into_iter()
            .skip(offset.unwrap_or(0))
            .take(limit.unwrap_or(usize::MAX))
            .collect();
        Ok(CollectionInfo { count, items })
    }

    /// The most recent report of a feature group.
    pub fn find_latest(&self, featuregroup_id: i32) -> Option<ValidationReport> {
        self.table
            .read()
            .rows
            .values()
            .filter(|r| r.featuregroup_id == featuregroup_id)
            .max_by(|a, b| {
                a.validation_time
                    .cmp(&b.validation_time)
                    .then_with(|| a.id.cmp(&b.id))
            })
            .cloned()
    }
}
