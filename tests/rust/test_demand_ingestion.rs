/// Integration tests for loading demand profiles from disk.
use scalesim_core::config::SimConfig;
use scalesim_core::demand::{load_profile, write_profile, DemandError, DemandProfile};
use std::path::PathBuf;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("scalesim-{}-{}", std::process::id(), name))
}

fn write_file(name: &str, content: &str) -> PathBuf {
    let path = temp_path(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn bundled_profile() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../profiles/requests_per_minute.txt")
}

#[test]
fn test_bundled_profile_is_one_day_of_minutes() {
    let samples = load_profile(&bundled_profile(), "text").unwrap();
    assert_eq!(samples.len(), 1440);
    assert!(samples.iter().all(|v| *v > 0.0));

    let profile = DemandProfile::new(samples, 60.0).unwrap();
    assert_eq!(profile.duration_secs(), 86_400.0);
}

#[test]
fn test_text_and_json_agree() {
    let text = write_file(
        "agree.txt",
        "# header\n\n10 20, 30\n  40\t50 # trailing comment\n",
    );
    let json = write_file("agree.json", "[10, 20, 30,\n 40, 50]\n");

    let from_text = load_profile(&text, "text").unwrap();
    let from_json = load_profile(&json, "json").unwrap();
    assert_eq!(from_text, vec![10.0, 20.0, 30.0, 40.0, 50.0]);
    assert_eq!(from_text, from_json);

    std::fs::remove_file(text).ok();
    std::fs::remove_file(json).ok();
}

#[test]
fn test_bad_sample_reports_line() {
    let path = write_file("bad.txt", "# header\n1 2 3\n4 -5 6\n");
    let err = load_profile(&path, "text").unwrap_err();
    match err {
        DemandError::InvalidSample { line, value } => {
            assert_eq!(line, 3);
            assert_eq!(value, "-5");
        }
        other => panic!("unexpected error: {}", other),
    }
    std::fs::remove_file(path).ok();
}

#[test]
fn test_malformed_json_reports_line() {
    let path = write_file("bad.json", "[1, 2,\n 3,\n oops]\n");
    let err = load_profile(&path, "json").unwrap_err();
    match err {
        DemandError::JsonParse { line, .. } => assert_eq!(line, 3),
        other => panic!("unexpected error: {}", other),
    }
    std::fs::remove_file(path).ok();
}

#[test]
fn test_comment_only_file_is_empty() {
    let path = write_file("empty.txt", "# nothing here\n\n");
    assert!(matches!(
        load_profile(&path, "text"),
        Err(DemandError::Empty)
    ));
    std::fs::remove_file(path).ok();
}

#[test]
fn test_unsupported_format() {
    let path = write_file("profile.csv", "1,2,3\n");
    let err = load_profile(&path, "csv").unwrap_err();
    assert!(matches!(err, DemandError::UnsupportedFormat(ref f) if f == "csv"));
    std::fs::remove_file(path).ok();
}

#[test]
fn test_missing_file_is_io_error() {
    let err = load_profile(&temp_path("does-not-exist.txt"), "text").unwrap_err();
    assert!(matches!(err, DemandError::Io(_)));
}

#[test]
fn test_written_profile_loads_back() {
    let samples: Vec<f64> = (0..25).map(|i| (i * 7 % 11) as f64).collect();
    let path = temp_path("written.txt");
    write_profile(&samples, &path).unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with('#'));
    // Header plus three rows of at most ten values.
    assert_eq!(content.lines().count(), 4);

    assert_eq!(load_profile(&path, "text").unwrap(), samples);
    std::fs::remove_file(path).ok();
}

#[test]
fn test_config_loads_profile_from_path() {
    let path = write_file("config-profile.json", "[120, 240, 360]");
    let config = SimConfig::from_str(&format!(
        r#"
[demand]
path = "{}"
format = "json"
bucket_secs = 30
"#,
        path.display()
    ))
    .unwrap();

    let profile = config.load_profile().unwrap();
    assert_eq!(profile.samples(), &[120.0, 240.0, 360.0]);
    assert_eq!(profile.bucket_secs(), 30.0);
    assert_eq!(config.horizon_secs(&profile), 90.0);
    std::fs::remove_file(path).ok();
}

#[test]
fn test_config_without_profile_source_fails() {
    let config = SimConfig::from_str("[demand]\nmultiplier = 2.0\n").unwrap();
    assert!(config.load_profile().is_err());
}
