#![warn(missing_docs)]

//! Catalog collaborators of the fstore gateway: the validation report table
//! and the feature group documents stored as extended attributes.

pub mod error;
pub mod query;
pub mod report;
pub mod xattr;

pub use error::{CatalogError, CatalogResult};
pub use query::{CollectionInfo, FilterBy, ReportFilter, ReportSort, SortBy, SortDirection};
pub use report::{IngestionResult, ValidationReport, ValidationReportFacade};
pub use xattr::{
    attach_featuregroup_xattr, read_featuregroup_xattr, FeaturegroupXAttr, FgType, SimpleFeature,
    SimplifiedFeaturegroupXAttr, FEATURESTORE_XATTR,
};
