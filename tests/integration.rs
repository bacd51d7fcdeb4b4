use serde_json::Value;
use std::{fs, path::PathBuf, process::Command};

const PULL_REQUESTS: &str = r#"[
  {"id": 1, "number": 1, "title": "Add parser", "user_login": "alice", "state": "closed",
   "created_at": "2024-01-05T00:00:00Z", "merged_at": "2024-01-07T00:00:00Z", "repository_id": 1},
  {"id": 2, "number": 2, "title": "Fix parser", "user_login": "bob", "state": "closed",
   "created_at": "2024-01-20 00:00:00", "merged_at": "2024-01-21 00:00:00.250", "repository_id": 1},
  {"id": 3, "number": 3, "title": "Refactor", "user_login": "alice", "state": "closed",
   "created_at": "2024-02-10T00:00:00Z", "merged_at": "2024-02-15T00:00:00Z", "repository_id": 1},
  {"id": 4, "number": 1, "title": "Docs", "user_login": "carol", "state": "closed",
   "created_at": "2024-03-04T00:00:00Z", "merged_at": "2024-03-05T00:00:00Z", "repository_id": 2},
  {"id": 5, "number": 2, "title": "Drop feature", "user_login": "carol", "state": "closed",
   "created_at": "2024-03-20T00:00:00Z", "closed_at": "2024-03-22T00:00:00Z", "repository_id": 2},
  null,
  {"id": 6, "number": 3, "title": "Broken", "user_login": "dave", "state": "closed",
   "created_at": "20/03/2024", "repository_id": 2}
]"#;

struct TestDir {
    path: PathBuf,
}

impl TestDir {
    fn new(name: &str) -> Self {
        let path = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join(name);
        fs::remove_dir_all(&path).ok();
        fs::create_dir_all(&path).expect("failed to create test directory");
        fs::write(path.join("prs.json"), PULL_REQUESTS).expect("failed to write input file");
        Self { path }
    }

    fn path_str(&self, file: &str) -> String {
        self.path
            .join(file)
            .to_str()
            .expect("failed to convert path to string")
            .to_string()
    }

    fn read_json(&self, file: &str) -> Value {
        let contents = fs::read_to_string(self.path.join(file)).expect("failed to read report");
        serde_json::from_str(&contents).expect("failed to parse report")
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        fs::remove_dir_all(&self.path).ok();
    }
}

fn run_bin(args: &[&str]) -> bool {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_prtrend"));

    let output = Command::new(bin)
        .args(args)
        .output()
        .expect("failed to execute command");

    if !output.status.success() {
        eprintln!(
            "binary failed with {args:?}\nstdout:\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    output.status.success()
}

#[test]
fn lead_times_and_summary() {
    let dir = TestDir::new("lead_times_and_summary");
    let input = dir.path_str("prs.json");

    let out = dir.path_str("lead_times.json");
    assert!(run_bin(&["--input", &input, "--output", &out, "lead-times"]));
    let report = dir.read_json("lead_times.json");
    let records = report["records"].as_array().expect("records must be an array");
    assert_eq!(records.len(), 5);
    assert_eq!(records[0]["lead_time_hours"], 48.0);
    assert_eq!(records[1]["lead_time_hours"], 24.0);
    assert_eq!(records[4]["end_type"], "closed");
    let skipped = report["skipped"].as_array().expect("skipped must be an array");
    assert_eq!(skipped.len(), 2);
    assert_eq!(skipped[0]["index"], 5);
    assert_eq!(skipped[1]["index"], 6);

    let out = dir.path_str("summary.json");
    assert!(run_bin(&["--input", &input, "--output", &out, "summary"]));
    let report = dir.read_json("summary.json");
    assert_eq!(report["processed"], 5);
    assert_eq!(report["errors"], 2);
    assert_eq!(report["outliers"]["original_stats"]["count"], 5);
    assert_eq!(report["outliers"]["outlier_method"], "iqr");
    assert_eq!(report["median_readable"], "2 days");
}

#[test]
fn monthly_trend() {
    let dir = TestDir::new("monthly_trend");
    let input = dir.path_str("prs.json");

    let out = dir.path_str("trend.json");
    assert!(run_bin(&[
        "--input",
        &input,
        "--output",
        &out,
        "--granularity",
        "monthly",
        "trend",
    ]));
    let report = dir.read_json("trend.json");
    assert_eq!(report["period_type"], "monthly");
    assert_eq!(report["total_periods"], 3);
    assert_eq!(report["period_statistics"]["2024-01"]["count"], 2);
    assert_eq!(report["period_statistics"]["2024-01"]["average_lead_time_hours"], 36.0);

    let trend = &report["trend_statistics"];
    assert_eq!(trend["2024-01"]["trend_direction"], "stable");
    assert_eq!(trend["2024-01"]["previous_period"], Value::Null);
    assert_eq!(trend["2024-02"]["trend_direction"], "worsening");
    let change_rate = trend["2024-02"]["change_rate"].as_f64().expect("change rate");
    assert!((change_rate - 233.33).abs() < 0.01);
    assert_eq!(trend["2024-03"]["trend_direction"], "improving");
    assert_eq!(trend["2024-03"]["moving_averages"]["3"], 64.0);
}

#[test]
fn weekly_gap_filling_from_config() {
    let dir = TestDir::new("weekly_gap_filling_from_config");
    let input = dir.path_str("prs.json");
    let config = dir.path_str("config.toml");
    let config_contents = String::new()
        + "granularity = \"weekly\"\n"
        + "moving_average_windows = [2]\n"
        + "fill_gaps = true\n"
        + "\n"
        + "[filter]\n"
        + "end_date = \"2024-02-29\"\n";
    fs::write(&config, config_contents).expect("failed to write config file");

    let out = dir.path_str("trend.json");
    assert!(run_bin(&[
        "--input", &input, "--config", &config, "--output", &out, "trend",
    ]));
    let report = dir.read_json("trend.json");
    assert_eq!(report["total_prs"], 3);
    assert_eq!(report["total_periods"], 3);

    let trend = report["trend_statistics"]
        .as_object()
        .expect("trend statistics must be an object");
    let weeks: Vec<&str> = trend.keys().map(String::as_str).collect();
    assert_eq!(
        weeks,
        vec!["2024-W01", "2024-W02", "2024-W03", "2024-W04", "2024-W05", "2024-W06"]
    );
    assert_eq!(trend["2024-W02"]["is_empty_period"], true);
    assert_eq!(trend["2024-W02"]["trend_direction"], "no_data");
    assert_eq!(trend["2024-W03"]["previous_period"], "2024-W02");
    assert_eq!(trend["2024-W03"]["change_rate"], 0.0);
    assert_eq!(trend["2024-W06"]["previous_period"], "2024-W05");
    assert_eq!(trend["2024-W06"]["moving_averages"]["2"], 60.0);
}

#[test]
fn multi_repository_comparison() {
    let dir = TestDir::new("multi_repository_comparison");
    let input = dir.path_str("prs.json");

    let out = dir.path_str("compare.json");
    assert!(run_bin(&[
        "--input",
        &input,
        "--output",
        &out,
        "--granularity",
        "monthly",
        "compare",
    ]));
    let report = dir.read_json("compare.json");
    assert_eq!(report["combined_trend"]["repository_count"], 2);
    assert_eq!(report["combined_trend"]["total_prs"], 5);
    assert_eq!(report["individual_trends"]["1"]["total_periods"], 2);
    assert_eq!(report["individual_trends"]["2"]["total_periods"], 1);
    assert_eq!(report["repository_summary"]["2"]["total_prs"], 2);
    assert_eq!(report["repository_summary"]["2"]["average_lead_time"], 36.0);
}

#[test]
fn unsupported_granularity_fails() {
    let dir = TestDir::new("unsupported_granularity_fails");
    let input = dir.path_str("prs.json");

    assert!(!run_bin(&["--input", &input, "--granularity", "daily", "trend"]));
}
