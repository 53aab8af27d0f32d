use assert_cmd::Command;
use compose_extends::test_utils::ComposeProject;
use predicates::prelude::*;

/// The binary, isolated from the user's configuration.
fn compose_extends(project: &ComposeProject) -> Command {
    let mut cmd = Command::cargo_bin("compose-extends").unwrap();
    cmd.current_dir(project.path())
        .env_remove("COMPOSE_EXTENDS_CONFIG")
        .env_remove("RUST_LOG")
        .env("XDG_CONFIG_HOME", project.path().join(".config"))
        .env("NO_COLOR", "1");
    cmd
}

fn write_stack(project: &ComposeProject) {
    project
        .write(
            "compose.yml",
            r#"
services:
  web:
    extends: {file: common/base.yml, service: app}
    ports: ["80:80"]
  worker:
    extends: web
    command: [work]
"#,
        )
        .unwrap();
    project
        .write("common/base.yml", "services:\n  app:\n    image: app:1\n    environment: {LOG: info}\n")
        .unwrap();
}

#[test]
fn test_resolve_yaml() {
    let project = ComposeProject::new().unwrap();
    write_stack(&project);

    let output = compose_extends(&project).args(["resolve", "--no-git"]).output().unwrap();
    assert!(output.status.success());

    let doc: serde_yaml::Mapping = serde_yaml::from_slice(&output.stdout).unwrap();
    let worker: serde_yaml::Value =
        serde_yaml::from_str("{image: 'app:1', environment: {LOG: info}, ports: ['80:80'], command: [work]}").unwrap();
    assert_eq!(doc["services"]["worker"], worker);
}

#[test]
fn test_resolve_json_single_service() {
    let project = ComposeProject::new().unwrap();
    write_stack(&project);

    let output = compose_extends(&project)
        .args(["resolve", "-f", "compose.yml", "--format", "json", "--service", "web"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["services"]["web"]["image"], "app:1");
    assert_eq!(json["services"]["web"]["ports"][0], "80:80");
    assert!(json["services"].get("worker").is_none());
}

#[test]
fn test_project_directory() {
    let project = ComposeProject::new().unwrap();
    write_stack(&project);
    let elsewhere = ComposeProject::new().unwrap();

    compose_extends(&elsewhere)
        .arg("resolve")
        .arg("--project-directory")
        .arg(project.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("app:1"));
}

#[test]
fn test_missing_base_fails_with_suggestion() {
    let project = ComposeProject::new().unwrap();
    project
        .write("compose.yml", "services:\n  base: {image: a}\n  web: {extends: bsae}\n")
        .unwrap();

    compose_extends(&project)
        .arg("resolve")
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("service \"bsae\" not found"))
        .stderr(predicate::str::contains("Did you mean \"base\""));
}

#[test]
fn test_cycle_fails() {
    let project = ComposeProject::new().unwrap();
    project.write("compose.yml", "services:\n  a: {extends: b}\n  b: {extends: a}\n").unwrap();

    compose_extends(&project)
        .arg("resolve")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("circular reference"))
        .stderr(predicate::str::contains(":a ->"));
}

#[test]
fn test_no_compose_file() {
    let project = ComposeProject::new().unwrap();

    compose_extends(&project)
        .arg("resolve")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no configuration file provided"));
}

#[test]
fn test_max_depth_from_config_and_flag() {
    let project = ComposeProject::new().unwrap();
    project
        .write("compose.yml", "services:\n  a: {image: x}\n  b: {extends: a}\n  c: {extends: b}\n")
        .unwrap();
    let config = project.write("resolver.toml", "max_depth = 1\n\n[git]\nenabled = false\n").unwrap();

    compose_extends(&project)
        .arg("-c")
        .arg(&config)
        .arg("resolve")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("exceeds maximum depth of 1"));

    compose_extends(&project)
        .arg("-c")
        .arg(&config)
        .args(["resolve", "--max-depth", "2"])
        .assert()
        .success();
}

#[test]
fn test_config_from_environment() {
    let project = ComposeProject::new().unwrap();
    project.write("compose.yml", "services:\n  a: {image: x}\n").unwrap();
    let config = project.write("resolver.toml", "max_depth = 0\n").unwrap();

    compose_extends(&project)
        .env("COMPOSE_EXTENDS_CONFIG", &config)
        .arg("resolve")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("max_depth must be at least 1"));
}

#[test]
fn test_unknown_service_filter() {
    let project = ComposeProject::new().unwrap();
    project.write("compose.yml", "services:\n  a: {image: x}\n").unwrap();

    compose_extends(&project)
        .args(["resolve", "--service", "b"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no such service: b"));
}

#[test]
fn test_skip_validation_flag() {
    let project = ComposeProject::new().unwrap();
    project.write("compose.yml", "services:\n  a: {ports: ['80:80']}\n").unwrap();

    compose_extends(&project).arg("resolve").assert().code(1);
    compose_extends(&project).args(["resolve", "--skip-validation"]).assert().success();
}
