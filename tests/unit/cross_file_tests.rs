use compose_extends::core::ExtendsError;
use compose_extends::extends::ChainEntry;
use compose_extends::test_utils::{ComposeProject, MemoryLoader, options_with_memory};
use serde_yaml::Value;
use std::sync::Arc;

fn yaml(text: &str) -> Value {
    serde_yaml::from_str(text).unwrap()
}

#[test]
fn test_extends_service_from_other_file() {
    let project = ComposeProject::new().unwrap();
    project
        .write(
            "compose.yml",
            r#"
services:
  web:
    extends: {file: common.yml, service: app}
    environment: {ROLE: web}
"#,
        )
        .unwrap();
    project
        .write("common.yml", "services:\n  app: {image: app, environment: {LOG: info}}\n  other: {image: o}\n")
        .unwrap();

    let doc = project.load(&["compose.yml"]).unwrap();
    assert_eq!(doc["services"]["web"], yaml("{image: app, environment: {LOG: info, ROLE: web}}"));
    // Only the requested service is pulled in.
    assert!(doc["services"].get("app").is_none());
    assert!(doc["services"].get("other").is_none());
}

#[test]
fn test_nested_extends_resolve_relative_to_fetched_file() {
    let project = ComposeProject::new().unwrap();
    project
        .write("compose.yml", "services:\n  web:\n    extends: {file: sub/base.yml, service: app}\n")
        .unwrap();
    project
        .write(
            "sub/base.yml",
            r#"
services:
  app:
    extends: {file: core.yml, service: core}
    environment: {B: "2"}
"#,
        )
        .unwrap();
    project
        .write("sub/core.yml", "services:\n  core: {image: alpine, environment: {A: \"1\"}}\n")
        .unwrap();

    let doc = project.load(&["compose.yml"]).unwrap();
    assert_eq!(doc["services"]["web"], yaml("{image: alpine, environment: {A: '1', B: '2'}}"));
}

#[test]
fn test_fetched_file_is_not_validated_on_its_own() {
    let project = ComposeProject::new().unwrap();
    project
        .write(
            "compose.yml",
            "services:\n  web:\n    image: web\n    extends: {file: partial.yml, service: fragment}\n",
        )
        .unwrap();
    // No image or build here: fine as a fragment, invalid as a whole file.
    project.write("partial.yml", "services:\n  fragment: {ports: ['80:80']}\n").unwrap();

    let doc = project.load(&["compose.yml"]).unwrap();
    assert_eq!(doc["services"]["web"], yaml("{ports: ['80:80'], image: web}"));
}

#[test]
fn test_broken_sibling_in_fetched_file_is_ignored() {
    let project = ComposeProject::new().unwrap();
    project
        .write("compose.yml", "services:\n  web:\n    extends: {file: common.yml, service: app}\n")
        .unwrap();
    // `broken` would fail if the fetched file were resolved as a whole.
    project
        .write("common.yml", "services:\n  app: {image: a}\n  broken: {extends: nowhere}\n")
        .unwrap();

    let doc = project.load(&["compose.yml"]).unwrap();
    assert_eq!(doc["services"]["web"], yaml("{image: a}"));
}

#[test]
fn test_missing_service_in_other_file() {
    let project = ComposeProject::new().unwrap();
    project
        .write("compose.yml", "services:\n  web:\n    extends: {file: common.yml, service: ap}\n")
        .unwrap();
    project.write("common.yml", "services:\n  app: {image: a}\n").unwrap();

    match project.load(&["compose.yml"]).unwrap_err() {
        ExtendsError::ServiceNotFound {
            service,
            target,
            file,
            suggestion,
        } => {
            assert_eq!(service, "web");
            assert_eq!(target, "ap");
            assert_eq!(file, "common.yml");
            assert_eq!(suggestion.as_deref(), Some("app"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_file_has_no_loader() {
    let project = ComposeProject::new().unwrap();
    project
        .write("compose.yml", "services:\n  web:\n    extends: {file: absent.yml, service: app}\n")
        .unwrap();

    let err = project.load(&["compose.yml"]).unwrap_err();
    assert_eq!(err.to_string(), "cannot read absent.yml");
}

#[test]
fn test_cycle_across_files() {
    let project = ComposeProject::new().unwrap();
    project
        .write("compose.yml", "services:\n  web:\n    extends: {file: other.yml, service: x}\n")
        .unwrap();
    project
        .write("other.yml", "services:\n  x:\n    extends: {file: compose.yml, service: web}\n")
        .unwrap();

    match project.load(&["compose.yml"]).unwrap_err() {
        ExtendsError::Cycle { chain } => {
            let top = project.identity("compose.yml");
            let other = project.identity("other.yml");
            assert_eq!(
                chain,
                vec![
                    ChainEntry::new(top.clone(), "web"),
                    ChainEntry::new(other, "x"),
                    ChainEntry::new(top, "web"),
                ]
            );
        }
        other => panic!("expected a cycle, got {other}"),
    }
}

#[test]
fn test_remote_loader_is_kept_for_nested_fetches() {
    let project = ComposeProject::new().unwrap();
    project
        .write("compose.yml", "services:\n  web:\n    extends: {file: 'mem://base.yml', service: base}\n")
        .unwrap();
    let loader = Arc::new(
        MemoryLoader::new()
            .unwrap()
            .with_file("base.yml", "services:\n  base:\n    extends: {file: 'mem://core.yml', service: core}\n    user: app\n")
            .with_file("core.yml", "services:\n  core: {image: core}\n"),
    );

    let doc = project.load_with(&["compose.yml"], &options_with_memory(&project, loader.clone())).unwrap();
    assert_eq!(doc["services"]["web"], yaml("{image: core, user: app}"));
    assert_eq!(loader.loads(), 2);
}

#[test]
fn test_remote_base_with_local_sibling_file() {
    let project = ComposeProject::new().unwrap();
    project
        .write("compose.yml", "services:\n  web:\n    extends: {file: 'mem://stack/base.yml', service: base}\n")
        .unwrap();
    // `core.yml` resolves next to the materialized remote file, not in the project.
    project.write("core.yml", "services:\n  core: {image: wrong}\n").unwrap();
    let loader = Arc::new(
        MemoryLoader::new()
            .unwrap()
            .with_file("stack/base.yml", "services:\n  base:\n    extends: {file: core.yml, service: core}\n"),
    );

    let err = project
        .load_with(&["compose.yml"], &options_with_memory(&project, loader))
        .unwrap_err();
    assert_eq!(err.to_string(), "cannot read core.yml");
}
