use std::fs;

use assert_matches::assert_matches;

use sref_fetch::config::{ConfigLoader, ConfigOverrides};
use sref_fetch::domain::{CleanupPolicy, RunParameters};
use sref_fetch::error::SrefError;

#[test]
fn resolve_reads_explicit_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("sref.json");
    fs::write(
        &path,
        r#"{
            "init_time": "2016010315",
            "bbox": {"left": -110.0, "right": -100.0, "top": 45.0, "bottom": 35.0},
            "perts": ["ctl", "p1"],
            "cleanup": "all",
            "base_url": "http://mirror.example/filter_srefbc.pl",
            "converter": "/opt/wgrib2/bin/wgrib2",
            "timeout_secs": 30
        }"#,
    )
    .unwrap();

    let resolved =
        ConfigLoader::resolve(path.to_str(), ConfigOverrides::default()).unwrap();
    assert_eq!(resolved.source.as_deref(), Some(path.as_path()));
    assert_eq!(resolved.params.init_time.to_string(), "2016010315");
    assert_eq!(resolved.params.bbox.left, -110.0);
    assert_eq!(resolved.params.cores, RunParameters::default().cores);
    assert_eq!(resolved.params.perts.members(), ["ctl", "p1"]);
    assert_eq!(resolved.cleanup, CleanupPolicy::All);
    assert_eq!(
        resolved.params.base_url,
        "http://mirror.example/filter_srefbc.pl"
    );
    assert_eq!(resolved.timeout_secs, 30);
    assert!(resolved.converter.is_some());
}

#[test]
fn missing_explicit_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    assert_matches!(
        ConfigLoader::resolve(path.to_str(), ConfigOverrides::default()),
        Err(SrefError::ConfigRead(_))
    );
}

#[test]
fn malformed_file_is_a_parse_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("sref.json");
    fs::write(&path, r#"{"init_time": "2016010399"}"#).unwrap();
    assert_matches!(
        ConfigLoader::resolve(path.to_str(), ConfigOverrides::default()),
        Err(SrefError::ConfigParse(_))
    );
}

#[test]
fn empty_axis_override_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("sref.json");
    fs::write(&path, "{}").unwrap();
    let overrides = ConfigOverrides {
        cores: Some(Vec::new()),
        ..ConfigOverrides::default()
    };
    assert_matches!(
        ConfigLoader::resolve(path.to_str(), overrides),
        Err(SrefError::EmptyAxis("core"))
    );
}
