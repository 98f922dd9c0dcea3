use std::process::Command;

fn bench_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_rendezvous-bench"))
}

const SMALL_RUN: [&str; 12] = [
    "--experiments",
    "1",
    "--latency-trials",
    "5",
    "--throughput-mb",
    "1",
    "--capacity-mb",
    "1",
    "--capacity-rounds",
    "1",
    "--poll",
    "yield",
];

#[test]
fn test_run_with_child_process() {
    let dir = tempfile::tempdir().unwrap();
    let region = dir.path().join("cli.region");

    let output = bench_bin()
        .args(["run", "--backend", "all", "--process", "--path"])
        .arg(&region)
        .args(SMALL_RUN)
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Results for method: file"));
    assert!(stdout.contains("Results for method: shared memory"));
    assert!(!region.exists());
}

#[test]
fn test_run_with_thread_peer() {
    let output = bench_bin()
        .args(["run", "--backend", "shm"])
        .args(SMALL_RUN)
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("| Capacity   |"));
    assert!(!stdout.contains("Results for method: file"));
}

#[test]
fn test_invalid_config_fails() {
    let output = bench_bin()
        .args(["run", "--backend", "file", "--experiments", "0"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_echo_missing_region_fails() {
    let output = bench_bin()
        .args(["echo", "--backend", "shm", "--region", "/rendezvous_missing_segment"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_cache_table() {
    let output = bench_bin()
        .args(["cache", "--experiments", "1", "--size", "4096", "--seed", "7"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("|  Sequential   |"));
    assert!(stdout.contains("4096 |"));
}
