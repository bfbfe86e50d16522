#![cfg(unix)]

use std::fs;

use assert_matches::assert_matches;

use sref_fetch::error::SrefError;
use sref_fetch::wgrib2::{Converter, Wgrib2Converter};

// `sh -c <script> sh <raw> -netcdf <out>` stands in for wgrib2: $1 is the
// raw file and $3 the NetCDF output.
fn shell(script: &str) -> Wgrib2Converter {
    Wgrib2Converter::with_command(
        "/bin/sh",
        vec!["-c".to_string(), script.to_string(), "sh".to_string()],
    )
}

#[test]
fn converter_succeeds_with_output() {
    let temp = tempfile::tempdir().unwrap();
    let raw = temp.path().join("sref_arw_ctl.grb2");
    let out = temp.path().join("sref_arw_ctl.nc");
    fs::write(&raw, b"GRIB").unwrap();

    shell(r#"test "$2" = "-netcdf" && cat "$1" > "$3""#)
        .convert(&raw, &out)
        .unwrap();
    assert_eq!(fs::read(&out).unwrap(), b"GRIB");
}

#[test]
fn converter_failure_leaves_no_partial_output() {
    let temp = tempfile::tempdir().unwrap();
    let raw = temp.path().join("sref_arw_ctl.grb2");
    let out = temp.path().join("sref_arw_ctl.nc");
    fs::write(&raw, b"GRIB").unwrap();

    let err = shell(r#"printf partial > "$3"; echo "bad grib" >&2; exit 8"#)
        .convert(&raw, &out)
        .unwrap_err();
    assert_matches!(err, SrefError::Conversion(ref message) if message == "bad grib");
    assert!(!out.exists());
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
}

#[test]
fn failed_reconversion_keeps_prior_output() {
    let temp = tempfile::tempdir().unwrap();
    let raw = temp.path().join("sref_arw_ctl.grb2");
    let out = temp.path().join("sref_arw_ctl.nc");
    fs::write(&raw, b"GRIB").unwrap();
    fs::write(&out, b"PRIOR-NETCDF").unwrap();

    let err = shell("exit 8").convert(&raw, &out).unwrap_err();
    assert_matches!(err, SrefError::Conversion(_));
    assert_eq!(fs::read(&out).unwrap(), b"PRIOR-NETCDF");

    let err = shell(r#": > "$3""#).convert(&raw, &out).unwrap_err();
    assert_matches!(err, SrefError::EmptyConversionOutput(_));
    assert_eq!(fs::read(&out).unwrap(), b"PRIOR-NETCDF");
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 2);
}

#[test]
fn successful_reconversion_replaces_prior_output() {
    let temp = tempfile::tempdir().unwrap();
    let raw = temp.path().join("sref_nmb_n2.grb2");
    let out = temp.path().join("sref_nmb_n2.nc");
    fs::write(&raw, b"GRIB").unwrap();
    fs::write(&out, b"PRIOR-NETCDF").unwrap();

    shell(r#"printf fresh > "$3""#).convert(&raw, &out).unwrap();
    assert_eq!(fs::read(&out).unwrap(), b"fresh");
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 2);
}

#[test]
fn converter_rejects_empty_output() {
    let temp = tempfile::tempdir().unwrap();
    let raw = temp.path().join("sref_nmb_p1.grb2");
    let out = temp.path().join("sref_nmb_p1.nc");
    fs::write(&raw, b"GRIB").unwrap();

    let err = shell(r#": > "$3""#).convert(&raw, &out).unwrap_err();
    assert_matches!(err, SrefError::EmptyConversionOutput(_));
    assert!(!out.exists());
}

#[test]
fn missing_program_fails_before_running() {
    let temp = tempfile::tempdir().unwrap();
    let converter = Wgrib2Converter::with_program(temp.path().join("no-such-wgrib2"));
    assert!(!converter.is_available());
    let err = converter
        .convert(&temp.path().join("a.grb2"), &temp.path().join("a.nc"))
        .unwrap_err();
    assert_matches!(err, SrefError::MissingTool(_));
    assert!(shell("exit 0").is_available());
}
