//! Catalog behaviour against the in-memory filesystem and report table.

use std::sync::{Arc, Once};

use chrono::{DateTime, Utc};
use fstore_catalog::{
    attach_featuregroup_xattr, read_featuregroup_xattr, CatalogError, FeaturegroupXAttr,
    FgType, FilterBy, ReportFilter, ReportSort, SimpleFeature, SortBy, ValidationReport,
    ValidationReportFacade, FEATURESTORE_XATTR,
};
use fstore_dfs::{
    DfsConfig, DfsPath, DfsSession, FsPermission, MemoryConnector, MemoryNamespace,
    SessionFactory, UserIdentity,
};

const URI: &str = "hopsfs://namenode.test:8020";

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn p(s: &str) -> DfsPath {
    DfsPath::parse(s).unwrap()
}

fn at(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap()
}

fn session(user: &str) -> DfsSession {
    init_tracing();
    let ns = Arc::new(MemoryNamespace::new(URI, "hdfs").unwrap());
    let factory = SessionFactory::new(Arc::new(MemoryConnector::with_namespace(ns)));
    let config = DfsConfig {
        default_fs: URI.to_string(),
        ..Default::default()
    };
    let admin = factory
        .open(&UserIdentity::new("hdfs").unwrap(), config.clone())
        .unwrap();
    admin.mkdirs(&p("/fs"), FsPermission::from_mode(0o777)).unwrap();
    admin.close();
    factory
        .open(&UserIdentity::new(user).unwrap(), config)
        .unwrap()
}

#[test]
fn test_latest_report_is_most_recent() {
    init_tracing();
    let facade = ValidationReportFacade::new();
    assert!(facade.find_latest(11).is_none());

    let mut older = ValidationReport::new(11, at(1_000), true);
    let mut newer = ValidationReport::new(11, at(2_000), false);
    facade.persist(&mut newer);
    facade.persist(&mut older);

    let latest = facade.find_latest(11).unwrap();
    assert_eq!(latest.id, newer.id);
    assert_eq!(latest.validation_time, at(2_000));
}

#[test]
fn test_find_pages_after_filtering_and_sorting() {
    let facade = ValidationReportFacade::new();
    for t in 1..=10 {
        facade.persist(&mut ValidationReport::new(4, at(t * 100), t % 2 == 0));
    }
    facade.persist(&mut ValidationReport::new(5, at(550), true));

    let sorts = ["VALIDATION_TIME".parse::<ReportSort>().map(SortBy::new).unwrap()];
    let filters = [FilterBy::new("VALIDATION_TIME_GT".parse::<ReportFilter>().unwrap(), "300")];
    let page = facade.find(Some(2), Some(3), &sorts, &filters, 4).unwrap();

    assert_eq!(page.count, 7);
    let times: Vec<i64> = page
        .items
        .iter()
        .map(|r| r.validation_time.timestamp_millis())
        .collect();
    assert_eq!(times, vec![800, 700, 600]);
}

#[test]
fn test_unknown_filter_name_is_rejected() {
    assert!(matches!(
        "SUCCESS_EQ".parse::<ReportFilter>(),
        Err(CatalogError::UnknownQueryField { kind: "filter", .. })
    ));
}

#[test]
fn test_featuregroup_document_on_directory() {
    let s = session("alice");
    let dir = p("/fs/featurestore/sales_1");
    s.mkdirs(&dir, FsPermission::dir_default()).unwrap();
    assert!(read_featuregroup_xattr(&s, &dir).unwrap().is_none());

    let doc = FeaturegroupXAttr::new(
        9,
        None,
        at(1_650_000_000_000),
        "alice",
        Some(FgType::Stream),
        vec![SimpleFeature::new("id", None)],
    );
    attach_featuregroup_xattr(&s, &dir, &doc).unwrap();
    assert_eq!(read_featuregroup_xattr(&s, &dir).unwrap(), Some(doc));
    assert!(s.get_xattrs(&dir).unwrap().contains_key(FEATURESTORE_XATTR));
}

#[test]
fn test_corrupt_document_surfaces_json_error() {
    let s = session("alice");
    let dir = p("/fs/fg");
    s.mkdirs(&dir, FsPermission::dir_default()).unwrap();
    s.set_xattr(&dir, FEATURESTORE_XATTR, b"not json").unwrap();
    assert!(matches!(
        read_featuregroup_xattr(&s, &dir),
        Err(CatalogError::Json(_))
    ));
}

#[test]
fn test_missing_directory_surfaces_dfs_error() {
    let s = session("alice");
    assert!(matches!(
        read_featuregroup_xattr(&s, &p("/fs/absent")),
        Err(CatalogError::Dfs(_))
    ));
}
