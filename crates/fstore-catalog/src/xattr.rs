//! Feature group documents kept as extended attributes.
//!
//! A feature group directory carries a JSON document under
//! [`FEATURESTORE_XATTR`]. Training datasets embed the simplified form of
//! the feature groups they were built from.

use chrono::{DateTime, Utc};
use fstore_dfs::{DfsPath, DfsSession};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CatalogResult;

/// Name of the attribute holding the feature store document.
pub const FEATURESTORE_XATTR: &str = "provenance.featurestore";

/// Kind of feature group.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FgType {
    /// Computed at read time from an external source.
    OnDemand,
    /// Materialized in the feature store.
    Cached,
    /// Fed by a stream.
    Stream,
}

/// Name and description of one feature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleFeature {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl SimpleFeature {
    /// A feature with an optional description.
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            name: name.into(),
            description,
        }
    }

    /// Feature name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Feature description, if any.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Document attached to a feature group directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeaturegroupXAttr {
    featurestore_id: i32,
    description: Option<String>,
    create_date: Option<i64>,
    creator: Option<String>,
    fg_type: Option<FgType>,
    #[serde(rename = "fg_features", default)]
    features: Vec<SimpleFeature>,
}

impl FeaturegroupXAttr {
    /// Builds the document; `create_date` is stored as epoch milliseconds.
    pub fn new(
        featurestore_id: i32,
        description: Option<String>,
        create_date: DateTime<Utc>,
        creator: impl Into<String>,
        fg_type: Option<FgType>,
        features: Vec<SimpleFeature>,
    ) -> Self {
        Self {
            featurestore_id,
            description,
            create_date: Some(create_date.timestamp_millis()),
            creator: Some(creator.into()),
            fg_type,
            features,
        }
    }

    /// Owning feature store.
    pub fn featurestore_id(&self) -> i32 {
        self.featurestore_id
    }

    /// Description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Creation time in epoch milliseconds.
    pub fn create_date(&self) -> Option<i64> {
        self.create_date
    }

    /// Creator's user name.
    pub fn creator(&self) -> Option<&str> {
        self.creator.as_deref()
    }

    /// Feature group kind.
    pub fn fg_type(&self) -> Option<FgType> {
        self.fg_type
    }

    /// Features in schema order.
    pub fn features(&self) -> &[SimpleFeature] {
        &self.features
    }

    /// Serializes to the attribute value.
    pub fn to_json(&self) -> CatalogResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parses an attribute value.
    pub fn from_json(bytes: &[u8]) -> CatalogResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Compact reference to a feature group, embedded in training dataset
/// documents.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimplifiedFeaturegroupXAttr {
    featurestore_id: i32,
    name: String,
    version: i32,
    #[serde(rename = "fg_features", default)]
    features: Vec<String>,
}

impl SimplifiedFeaturegroupXAttr {
    /// Builds the reference.
    pub fn new(
        featurestore_id: i32,
        name: impl Into<String>,
        version: i32,
        features: Vec<String>,
    ) -> Self {
        Self {
            featurestore_id,
            name: name.into(),
            version,
            features,
        }
    }

    /// Owning feature store.
    pub fn featurestore_id(&self) -> i32 {
        self.featurestore_id
    }

    /// Feature group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Feature group version.
    pub fn version(&self) -> i32 {
        self.version
    }

    /// Names of the features used.
    pub fn features(&self) -> &[String] {
        &self.features
    }
}

impl From<(&str, i32, &FeaturegroupXAttr)> for SimplifiedFeaturegroupXAttr {
    fn from((name, version, full): (&str, i32, &FeaturegroupXAttr)) -> Self {
        Self::new(
            full.featurestore_id,
            name,
            version,
            full.features.iter().map(|f| f.name.clone()).collect(),
        )
    }
}

/// Writes `doc` onto `path`, replacing any previous document.
pub fn attach_featuregroup_xattr(
    session: &DfsSession,
    path: &DfsPath,
    doc: &FeaturegroupXAttr,
) -> CatalogResult<()> {
    let value = doc.to_json()?;
    session.set_xattr(path, FEATURESTORE_XATTR, &value)?;
    debug!(path = %path, featurestore = doc.featurestore_id, "featuregroup xattr attached");
    Ok(())
}

/// Reads the document on `path`; `None` when the directory has none.
pub fn read_featuregroup_xattr(
    session: &DfsSession,
    path: &DfsPath,
) -> CatalogResult<Option<FeaturegroupXAttr>> {
    match session.get_xattr(path, FEATURESTORE_XATTR)? {
        Some(bytes) => Ok(Some(FeaturegroupXAttr::from_json(&bytes)?)),
        None => Ok(None),
    }
}
