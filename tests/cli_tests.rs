
use std::process::Output;

use test_harness::{marker_line, output_line, FakeDocker};
use tokio::process::Command;

// The session name is random, so log lines use a placeholder service prefix.
const SERVICE: &str = "swarm-exec_cli";

fn workload_logs(fake: &FakeDocker) {
    fake.set_replicas(1, 1);
    fake.set_logs(&[output_line(SERVICE, 1, "hi"), marker_line(SERVICE, 1)]);
}

async fn swarm_exec(fake: &FakeDocker, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_swarm-exec"))
        .args(args)
        .arg("--docker")
        .arg(fake.binary())
        .arg("echo hi")
        .env_remove("RUST_LOG")
        .output()
        .await
        .expect("run swarm-exec")
}

fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_quiet_with_logs_keeps_workload_output() {
    let fake = FakeDocker::new();
    workload_logs(&fake);

    let output = swarm_exec(&fake, &["-q", "--logs"]).await;
    let lines = stdout_lines(&output);

    assert!(output.status.success(), "{:?}", output);
    assert!(
        !lines.iter().any(|l| l.starts_with("OUT:") || l.starts_with("ERR:")),
        "{:?}",
        lines
    );
    assert!(lines.iter().any(|l| l.starts_with("LOG:") && l.contains("hi")), "{:?}", lines);
    assert!(lines.iter().any(|l| l == "Command finished."), "{:?}", lines);
}

#[tokio::test]
async fn test_platform_output_echoed_without_quiet() {
    let fake = FakeDocker::new();
    workload_logs(&fake);

    let output = swarm_exec(&fake, &["--logs", "--rm"]).await;
    let lines = stdout_lines(&output);

    assert!(output.status.success(), "{:?}", output);
    assert!(lines.iter().any(|l| l.starts_with("OUT: fake-service-id-")), "{:?}", lines);
    assert!(lines.iter().any(|l| l.starts_with("ERR: overall progress")), "{:?}", lines);
    assert!(lines.iter().any(|l| l == "Command finished."), "{:?}", lines);
    assert_eq!(fake.calls_with_prefix("service rm").len(), 1);
    assert!(!fake.service_exists());
}
