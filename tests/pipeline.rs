//! End-to-end pipeline tests against the mock LM.

mod common;

use common::{mock_lm_command, sample_export, RawReview, Workspace};
use serde_json::{json, Value};

fn titles(reviews: &Value) -> Vec<&str> {
    reviews
        .as_array()
        .expect("review array")
        .iter()
        .map(|review| review["reviewTitle"].as_str().expect("title"))
        .collect()
}

/// Workspace with processed reviews and a discovered vocabulary.
fn prepared_workspace(batch_size: usize, max_batches: Option<usize>) -> Workspace {
    let workspace = Workspace::new();
    workspace.init(batch_size, max_batches);
    workspace.write_raw_export(&sample_export());
    let lm = mock_lm_command();
    workspace.jlens_ok(&["preprocess"]);
    workspace.jlens_ok(&["sample", "--seed", "3"]);
    workspace.jlens_ok(&["discover", "--lm", &lm]);
    workspace
}

#[test]
fn run_drops_the_failed_batch_and_aggregates_the_rest() {
    let workspace = Workspace::new();
    workspace.init(2, None);
    workspace.write_raw_export(&sample_export());
    let lm = mock_lm_command();

    let stdout = workspace.jlens_ok(&["run", "--seed", "1", "--lm", &lm]);
    assert!(stdout.contains("classified 3 of 5 reviews"), "{stdout}");
    assert!(stdout.contains("dropped batch 1 (reviews 2..4)"), "{stdout}");

    let processed = workspace.single_artifact("pre-processed-raw-data");
    assert_eq!(processed[0]["reviewDateOfExperience"], "2024-01-05");
    assert_eq!(processed[4]["reviewDateOfExperience"], "sometime in March");
    assert!(processed[0].get("reviewUrl").is_none());

    let summarized = workspace.single_artifact("summarized-reviews");
    assert_eq!(
        titles(&summarized),
        vec!["Easy to find", "Smooth checkout", "Helpful agent"]
    );
    assert!(summarized[0].get("reviewDescription").is_none());
    assert_eq!(summarized[0]["reviewSummary"], "Mock summary.");

    let ratings = workspace.single_artifact("ratings-by-step");
    assert_eq!(
        serde_json::to_string(&ratings).expect("serialize"),
        r#"{"journeySteps":{"Discovery":{"4":1},"Purchase":{"5":1},"Delivery":{},"Support":{"3":1}}}"#
    );

    let lm_log = std::fs::read_to_string(workspace.root.join("lm_log.jsonl")).expect("lm log");
    let entries: Vec<Value> = lm_log
        .lines()
        .map(|line| serde_json::from_str(line).expect("log entry"))
        .collect();
    // Discovery plus reviews 0, 1, 2 and 4; review 3 is never sent.
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[0]["kind"], "journey_discovery");
    assert_eq!(
        entries.iter().filter(|entry| entry["outcome"] == "failed").count(),
        1
    );
}

#[test]
fn batch_cap_limits_work_and_output() {
    let workspace = prepared_workspace(2, Some(1));
    let lm = mock_lm_command();

    let stdout = workspace.jlens_ok(&["classify", "--lm", &lm, "--json"]);
    let report: Value = serde_json::from_str(&stdout).expect("classify report JSON");

    assert_eq!(report["planned_batches"], 1);
    assert_eq!(report["attempted_batches"], 1);
    assert_eq!(report["classified_reviews"], 2);
    assert_eq!(report["output_written"], true);
    assert_eq!(report["dropped_batches"], json!([]));

    let summarized = workspace.single_artifact("summarized-reviews");
    assert_eq!(titles(&summarized), vec!["Easy to find", "Smooth checkout"]);
}

#[test]
fn abort_policy_keeps_only_batches_before_the_failure() {
    let workspace = prepared_workspace(2, None);
    let lm = mock_lm_command();

    let stdout = workspace.jlens_ok(&[
        "classify",
        "--lm",
        &lm,
        "--on-failed-batch",
        "abort",
        "--json",
    ]);
    let report: Value = serde_json::from_str(&stdout).expect("classify report JSON");

    assert_eq!(report["aborted"], true);
    assert_eq!(report["attempted_batches"], 2);
    assert_eq!(report["dropped_batches"][0]["failed_review"], 2);

    let summarized = workspace.single_artifact("summarized-reviews");
    assert_eq!(titles(&summarized), vec!["Easy to find", "Smooth checkout"]);
}

#[test]
fn nothing_is_written_when_every_batch_fails() {
    let workspace = Workspace::new();
    workspace.init(5, None);
    workspace.write_raw_export(&[RawReview {
        date: "May 1, 2024",
        title: "Only one",
        description: "FAILME nothing to see.",
        rating: 2,
    }]);
    let lm = mock_lm_command();
    workspace.jlens_ok(&["preprocess"]);
    workspace.jlens_ok(&["sample"]);
    workspace.jlens_ok(&["discover", "--lm", &lm]);

    let stdout = workspace.jlens_ok(&["classify", "--lm", &lm, "--json"]);
    let report: Value = serde_json::from_str(&stdout).expect("classify report JSON");

    assert_eq!(report["output_written"], false);
    assert_eq!(workspace.artifact_count("summarized-reviews"), 0);
}

#[test]
fn unknown_steps_are_skipped_in_aggregation_and_report() {
    let workspace = Workspace::new();
    workspace.init(5, None);
    workspace.write_raw_export(&[
        RawReview {
            date: "May 1, 2024",
            title: "Odd",
            description: "They promised to teleport the package.",
            rating: 1,
        },
        RawReview {
            date: "May 2, 2024",
            title: "Great",
            description: "I bought two and both work.",
            rating: 5,
        },
        RawReview {
            date: "May 3, 2024",
            title: "Fine",
            description: "I bought one, it is fine.",
            rating: 4,
        },
    ]);
    let lm = mock_lm_command();
    workspace.jlens_ok(&["preprocess"]);
    workspace.jlens_ok(&["sample"]);
    workspace.jlens_ok(&["discover", "--lm", &lm]);
    workspace.jlens_ok(&["classify", "--lm", &lm]);

    let stdout = workspace.jlens_ok(&["aggregate"]);
    assert!(stdout.contains("skipped 1 reviews"), "{stdout}");

    let report: Value =
        serde_json::from_str(&workspace.jlens_ok(&["report", "--json"])).expect("report JSON");
    let steps = report["steps"].as_array().expect("steps");
    let names: Vec<_> = steps.iter().map(|step| step["step"].clone()).collect();
    assert_eq!(
        names,
        vec![
            json!("Discovery"),
            json!("Purchase"),
            json!("Delivery"),
            json!("Support")
        ]
    );
    assert_eq!(steps[1]["total"], 2);
    assert_eq!(steps[1]["average"], 4.5);
    assert_eq!(steps[1]["normalized"], 0.8);
    assert_eq!(steps[0]["total"], 0);
    assert!(steps[0].get("average").is_none());
}

#[test]
fn classify_without_processed_reviews_reports_not_found() {
    let workspace = Workspace::new();
    workspace.init(5, None);
    let lm = mock_lm_command();

    let output = workspace.jlens(&["classify", "--lm", &lm]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("no processed review file found"), "{stderr}");
}

#[test]
fn init_preserves_raw_data_and_outputs() {
    let workspace = Workspace::new();
    workspace.init(5, None);
    workspace.write_raw_export(&sample_export());
    workspace.jlens_ok(&["preprocess"]);
    assert_eq!(workspace.artifact_count("pre-processed-raw-data"), 1);

    workspace.jlens_ok(&["init"]);

    assert_eq!(workspace.artifact_count("pre-processed-raw-data"), 0);
    assert_eq!(workspace.artifact_count("raw-review-data"), 1);
    let config = common::read_json(&workspace.root.join("config.json"));
    assert_eq!(config["max_retries"], 0, "init keeps an existing config");
}
