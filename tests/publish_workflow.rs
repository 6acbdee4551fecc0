//! Publish workflow tests driven by a scripted command runner.

use bundle_cli::cli::OutputManager;
use bundle_cli::cli::commands::{PublishOpts, run_publish};
use bundle_cli::process::{CommandRunner, ProcessOutcome, ProcessRequest};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Mutex;

#[derive(Default)]
struct FakeState {
    rules: Vec<(String, VecDeque<ProcessOutcome>)>,
    calls: Vec<String>,
}

/// Command runner that matches invocations by substring and replays scripted
/// outcomes. Rules are checked in insertion order; exhausted rules are
/// skipped; unmatched commands succeed with empty output.
#[derive(Default)]
struct FakeRunner {
    state: Mutex<FakeState>,
}

impl FakeRunner {
    fn on(self, needle: &str, outcome: ProcessOutcome) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            if let Some((_, queue)) = state
                .rules
                .iter_mut()
                .find(|(existing, _)| existing == needle)
            {
                queue.push_back(outcome);
            } else {
                state
                    .rules
                    .push((needle.to_string(), VecDeque::from([outcome])));
            }
        }
        self
    }

    fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }
}

impl CommandRunner for FakeRunner {
    async fn run(&self, request: ProcessRequest) -> std::io::Result<ProcessOutcome> {
        let line = request.command_line();
        let mut state = self.state.lock().unwrap();
        state.calls.push(line.clone());
        for (needle, queue) in &mut state.rules {
            if line.contains(needle.as_str()) {
                if let Some(outcome) = queue.pop_front() {
                    return Ok(outcome);
                }
            }
        }
        Ok(ProcessOutcome::default())
    }
}

fn ok_with_stdout(stdout: &str) -> ProcessOutcome {
    ProcessOutcome {
        code: 0,
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

fn failed(code: i32) -> ProcessOutcome {
    ProcessOutcome {
        code,
        ..ProcessOutcome::default()
    }
}

fn write_bundle(dir: &Path, microservices: &str) {
    fs::write(
        dir.join("bundle.json"),
        format!(
            r#"{{
                "name": "my-bundle",
                "version": "0.0.1",
                "microfrontends": [],
                "microservices": {microservices}
            }}"#
        ),
    )
    .unwrap();
}

fn write_node_microservice(dir: &Path, name: &str, version: &str) {
    let ms_dir = dir.join("microservices").join(name);
    fs::create_dir_all(&ms_dir).unwrap();
    fs::write(
        ms_dir.join("package.json"),
        format!(r#"{{ "name": "{name}", "version": "{version}" }}"#),
    )
    .unwrap();
}

fn quiet() -> OutputManager {
    OutputManager::new(true)
}

#[tokio::test]
async fn publish_without_organization_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), "[]");
    let runner = FakeRunner::default();

    let error = run_publish(&runner, dir.path(), &PublishOpts::default(), &quiet())
        .await
        .unwrap_err();
    assert_eq!(
        error.to_string(),
        "No configured Docker organization found. Please run the command with --org flag."
    );
    // it must fail before touching the engine
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn missing_images_trigger_a_single_pack_run() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), "[]");

    let runner = FakeRunner::default()
        .on("image ls", ok_with_stdout(""))
        .on("image ls", ok_with_stdout("myorg/my-bundle:0.0.1\n"))
        .on("push", ok_with_stdout("0.0.1: digest: sha256:abc size: 1\n"));

    let opts = PublishOpts {
        org: Some("myorg".to_string()),
        registry: None,
    };
    let report = run_publish(&runner, dir.path(), &opts, &quiet())
        .await
        .unwrap();

    assert_eq!(
        report.bundle.name,
        "registry.hub.docker.com/myorg/my-bundle:0.0.1"
    );
    assert_eq!(report.bundle.digest, "sha256:abc");
    assert!(report.microservices.is_empty());
    assert!(!report.render().contains("Microservices"));

    let calls = runner.calls();
    let builds: Vec<&String> = calls
        .iter()
        .filter(|call| call.contains("build --platform linux/amd64"))
        .collect();
    assert_eq!(builds.len(), 1, "pack must build the bundle image once");
    let pushes: Vec<&String> = calls.iter().filter(|call| call.contains("push")).collect();
    assert_eq!(pushes.len(), 1);
}

#[tokio::test]
async fn images_push_in_order_bundle_first() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(
        dir.path(),
        r#"[
            { "name": "ms-a", "stack": "node" },
            { "name": "ms-b", "stack": "node" }
        ]"#,
    );
    write_node_microservice(dir.path(), "ms-a", "1.0.0");
    write_node_microservice(dir.path(), "ms-b", "2.0.0");

    let runner = FakeRunner::default()
        .on(
            "image ls",
            ok_with_stdout("myorg/my-bundle:0.0.1\nmyorg/ms-a:1.0.0\nmyorg/ms-b:2.0.0\n"),
        )
        .on("push", ok_with_stdout("digest: sha256:bundle size: 1\n"))
        .on("push", ok_with_stdout("digest: sha256:aaa size: 1\n"))
        .on("push", ok_with_stdout("digest: sha256:bbb size: 1\n"));

    let opts = PublishOpts {
        org: Some("myorg".to_string()),
        registry: Some("my-registry.io".to_string()),
    };
    let report = run_publish(&runner, dir.path(), &opts, &quiet())
        .await
        .unwrap();

    assert_eq!(report.bundle.name, "my-registry.io/myorg/my-bundle:0.0.1");
    assert_eq!(report.bundle.digest, "sha256:bundle");
    let names: Vec<&str> = report
        .microservices
        .iter()
        .map(|image| image.name.as_str())
        .collect();
    assert_eq!(
        names,
        [
            "my-registry.io/myorg/ms-a:1.0.0",
            "my-registry.io/myorg/ms-b:2.0.0"
        ]
    );
    assert_eq!(report.microservices[0].digest, "sha256:aaa");
    assert_eq!(report.microservices[1].digest, "sha256:bbb");

    // registry prefix applied via retag, one per image
    assert_eq!(calls_containing(&runner, " tag ").len(), 3);

    let pushes: Vec<String> = runner
        .calls()
        .into_iter()
        .filter(|call| call.contains(" push "))
        .collect();
    assert!(pushes[0].contains("my-registry.io/myorg/my-bundle:0.0.1"));
    assert!(pushes[1].contains("my-registry.io/myorg/ms-a:1.0.0"));
    assert!(pushes[2].contains("my-registry.io/myorg/ms-b:2.0.0"));
}

#[tokio::test]
async fn organization_change_retags_instead_of_packing() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), "[]");
    fs::create_dir_all(dir.path().join(".bundle")).unwrap();
    fs::write(
        dir.path().join(".bundle/config.json"),
        r#"{ "docker-organization": "old-org" }"#,
    )
    .unwrap();

    let runner = FakeRunner::default()
        .on("reference=new-org/my-bundle:0.0.1", ok_with_stdout(""))
        .on(
            "reference=old-org/my-bundle:0.0.1",
            ok_with_stdout("old-org/my-bundle:0.0.1\n"),
        )
        .on("push", ok_with_stdout("digest: sha256:abc size: 1\n"));

    let opts = PublishOpts {
        org: Some("new-org".to_string()),
        registry: None,
    };
    let report = run_publish(&runner, dir.path(), &opts, &quiet())
        .await
        .unwrap();

    assert_eq!(
        report.bundle.name,
        "registry.hub.docker.com/new-org/my-bundle:0.0.1"
    );
    let calls = runner.calls();
    assert!(
        calls
            .iter()
            .any(|call| call.contains("tag old-org/my-bundle:0.0.1 new-org/my-bundle:0.0.1")),
        "expected an organization retag, got: {calls:?}"
    );
    assert!(
        !calls
            .iter()
            .any(|call| call.contains("build --platform")),
        "retag path must not run pack"
    );
}

#[tokio::test]
async fn failed_authentication_falls_back_to_interactive_login() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), "[]");

    // auth check fails, the login's stored-credential attempt fails, the
    // interactive retry succeeds
    let runner = FakeRunner::default()
        .on("image ls", ok_with_stdout("myorg/my-bundle:0.0.1\n"))
        .on("login", failed(1))
        .on("login", failed(1))
        .on("login", ok_with_stdout("Login Succeeded\n"))
        .on("push", ok_with_stdout("digest: sha256:abc size: 1\n"));

    let opts = PublishOpts {
        org: Some("myorg".to_string()),
        registry: None,
    };
    run_publish(&runner, dir.path(), &opts, &quiet())
        .await
        .unwrap();

    assert_eq!(calls_containing(&runner, "login").len(), 3);
}

#[tokio::test]
async fn second_login_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), "[]");

    let runner = FakeRunner::default()
        .on("image ls", ok_with_stdout("myorg/my-bundle:0.0.1\n"))
        .on("login", failed(1))
        .on("login", failed(1))
        .on("login", failed(1));

    let opts = PublishOpts {
        org: Some("myorg".to_string()),
        registry: None,
    };
    let error = run_publish(&runner, dir.path(), &opts, &quiet())
        .await
        .unwrap_err();
    assert_eq!(error.to_string(), "Docker login failed");
    assert!(calls_containing(&runner, "push").is_empty());
}

#[tokio::test]
async fn push_failure_aborts_the_workflow() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), "[]");

    let runner = FakeRunner::default()
        .on("image ls", ok_with_stdout("myorg/my-bundle:0.0.1\n"))
        .on("push", failed(1));

    let opts = PublishOpts {
        org: Some("myorg".to_string()),
        registry: None,
    };
    let error = run_publish(&runner, dir.path(), &opts, &quiet())
        .await
        .unwrap_err();
    assert!(error.to_string().contains("Unable to push Docker image"));
}

fn calls_containing(runner: &FakeRunner, needle: &str) -> Vec<String> {
    runner
        .calls()
        .into_iter()
        .filter(|call| call.contains(needle))
        .collect()
}
