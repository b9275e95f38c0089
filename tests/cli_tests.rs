use poolforge::loader;
use poolforge::validity::is_valid;
use regex::Regex;
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

struct TestContext {
    dir: TempDir,
}

impl TestContext {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        let mut file = File::create(&path).unwrap();
        write!(file, "{}", content).unwrap();
        path
    }
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_poolforge"))
        .args(args)
        .output()
        .expect("Failed to execute binary")
}

#[test]
fn test_design_writes_valid_solution() {
    let ctx = TestContext::new();
    let out = ctx.path("design.json");
    let csv = ctx.path("design.csv");

    let output = run(&[
        "design",
        "--num-peptides",
        "30",
        "--peptides-per-pool",
        "5",
        "--num-replicates",
        "3",
        "--seed",
        "7",
        "--attempts",
        "2",
        "-o",
        out.to_str().unwrap(),
        "--csv",
        csv.to_str().unwrap(),
    ]);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        output.status.success(),
        "design failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let re = Regex::new(r"History \(\d+ entries\)").unwrap();
    assert!(re.is_match(&stdout), "no history line in:\n{}", stdout);

    let solution = loader::load_solution(&out).unwrap();
    assert!(is_valid(&solution));
    assert_eq!(solution.num_replicates(), 3);
    assert_eq!(solution.peptides().len(), 30);

    let rows = fs::read_to_string(&csv).unwrap();
    let mut lines = rows.lines();
    assert_eq!(lines.next(), Some("replicate,pool,peptide"));
    assert_eq!(lines.count(), 90);
}

#[test]
fn test_validate_exit_codes() {
    let ctx = TestContext::new();
    let good = ctx.write(
        "good.json",
        r#"{"max_peptides_per_pool": 2, "invalid_neighbors": [],
            "assignments": {"0": {"0": [0, 1], "1": [2, 3]},
                            "1": {"0": [0, 2], "1": [1, 3]}}}"#,
    );
    let bad = ctx.write(
        "bad.json",
        r#"{"max_peptides_per_pool": 2, "invalid_neighbors": [],
            "assignments": {"0": {"0": [0, 1], "1": [2, 3]},
                            "1": {"0": [0, 1], "1": [2, 3]}}}"#,
    );

    let output = run(&["validate", "--solution", good.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0));

    let output = run(&["validate", "--solution", bad.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));

    let missing = ctx.path("missing.json");
    let output = run(&["validate", "--solution", missing.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_validate_checks_extra_excluded_pairs() {
    let ctx = TestContext::new();
    let solution = ctx.write(
        "solution.json",
        r#"{"max_peptides_per_pool": 2, "invalid_neighbors": [],
            "assignments": {"0": {"0": [0, 1], "1": [2, 3]}}}"#,
    );
    let pairs = ctx.write("pairs.csv", "a,b\n1,0\n");

    let output = run(&[
        "validate",
        "-s",
        solution.to_str().unwrap(),
        "--invalid-pairs",
        pairs.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_config_file_with_cli_override() {
    let ctx = TestContext::new();
    let config = ctx.write(
        "config.json",
        r#"{"design": {"num_peptides": 12, "peptides_per_pool": 6, "num_replicates": 2},
            "search": {"max_iters": 300}}"#,
    );
    let out = ctx.path("solution.json");

    let output = run(&[
        "design",
        "--config-file",
        config.to_str().unwrap(),
        "--peptides-per-pool",
        "3",
        "-S",
        "1",
        "-o",
        out.to_str().unwrap(),
    ]);
    assert!(output.status.success());

    let solution = loader::load_solution(&out).unwrap();
    assert_eq!(solution.max_peptides_per_pool(), 3);
    assert_eq!(solution.num_replicates(), 2);
    assert_eq!(solution.peptides().len(), 12);
}

#[test]
fn test_design_keeps_excluded_pairs_apart() {
    let ctx = TestContext::new();
    let pairs = ctx.write("pairs.csv", "peptide_a,peptide_b\n0,1\n2,3\n4,5\n");
    let out = ctx.path("solution.json");

    let output = run(&[
        "design",
        "--num-peptides",
        "20",
        "--peptides-per-pool",
        "4",
        "--num-replicates",
        "2",
        "--invalid-pairs",
        pairs.to_str().unwrap(),
        "-S",
        "3",
        "-o",
        out.to_str().unwrap(),
    ]);
    assert!(output.status.success());

    let solution = loader::load_solution(&out).unwrap();
    assert_eq!(solution.invalid_neighbors().len(), 3);
    for pools in solution.assignments().values() {
        for pool in pools.values() {
            for (a, b) in [(0, 1), (2, 3), (4, 5)] {
                assert!(!(pool.contains(&a) && pool.contains(&b)));
            }
        }
    }
}

#[test]
fn test_bad_settings_exit_with_config_error() {
    let output = run(&["design", "--peptides-per-pool", "0"]);
    assert_eq!(output.status.code(), Some(2));
}
