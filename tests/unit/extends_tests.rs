use compose_extends::core::{ExtendsError, ResolveContext};
use compose_extends::document::{Document, structural_clone_mapping};
use compose_extends::extends::{ChainEntry, ExtendsResolver};
use compose_extends::loader::LoadOptions;
use compose_extends::test_utils::{ComposeProject, RecordingProcessor, init_test_logging};
use serde_yaml::Value;
use std::sync::Arc;

fn yaml(text: &str) -> Value {
    serde_yaml::from_str(text).unwrap()
}

fn document(text: &str) -> Document {
    serde_yaml::from_str(text).unwrap()
}

fn resolve(doc: &mut Document) -> Result<(), ExtendsError> {
    ExtendsResolver::new(LoadOptions::default()).resolve(&ResolveContext::new(), doc, "compose.yml")
}

#[test]
fn test_document_without_extends_is_unchanged() {
    init_test_logging(None);
    let mut doc = document(
        r#"
services:
  web:
    image: nginx
    ports: ["80:80"]
  db:
    image: postgres
volumes:
  data: {}
"#,
    );
    let before = doc.clone();
    resolve(&mut doc).unwrap();
    assert_eq!(doc, before);
}

#[test]
fn test_chain_is_merged_in_order() {
    let mut doc = document(
        r#"
services:
  base:
    image: alpine
    environment: {LEVEL: base, BASE: "1"}
    ports: ["80:80"]
  middle:
    extends: base
    environment: {LEVEL: middle}
    ports: ["443:443"]
  top:
    extends: middle
    environment: {LEVEL: top}
"#,
    );
    resolve(&mut doc).unwrap();

    assert_eq!(
        doc["services"]["top"],
        yaml(
            r#"
image: alpine
environment: {LEVEL: top, BASE: "1"}
ports: ["80:80", "443:443"]
"#
        )
    );
    assert_eq!(doc["services"]["middle"]["environment"]["LEVEL"], yaml("middle"));
    assert!(doc["services"]["middle"].get("extends").is_none());
}

#[test]
fn test_child_scalars_win() {
    let mut doc = document("services:\n  base: {image: a, user: root}\n  web: {extends: base, image: b}\n");
    resolve(&mut doc).unwrap();
    assert_eq!(doc["services"]["web"], yaml("{image: b, user: root}"));
}

#[test]
fn test_long_form_without_file() {
    let mut doc = document("services:\n  base: {image: a}\n  web: {extends: {service: base}}\n");
    resolve(&mut doc).unwrap();
    assert_eq!(doc["services"]["web"], yaml("{image: a}"));
}

#[test]
fn test_cycle_reports_full_chain() {
    let mut doc = document("services:\n  a: {extends: b}\n  b: {extends: c}\n  c: {extends: a}\n");
    match resolve(&mut doc).unwrap_err() {
        ExtendsError::Cycle { chain } => {
            assert_eq!(
                chain,
                vec![
                    ChainEntry::new("compose.yml", "a"),
                    ChainEntry::new("compose.yml", "b"),
                    ChainEntry::new("compose.yml", "c"),
                    ChainEntry::new("compose.yml", "a"),
                ]
            );
        }
        other => panic!("expected a cycle, got {other}"),
    }
}

#[test]
fn test_self_extension_is_a_cycle() {
    let mut doc = document("services:\n  web: {extends: web, image: x}\n");
    let err = resolve(&mut doc).unwrap_err();
    assert_eq!(err.to_string(), "circular reference: compose.yml:web -> compose.yml:web");
}

#[test]
fn test_missing_base_names_both_services() {
    let mut doc = document("services:\n  web: {extends: nowhere}\n");
    let err = resolve(&mut doc).unwrap_err();
    assert_eq!(
        err.to_string(),
        "cannot extend service \"web\" in compose.yml: service \"nowhere\" not found"
    );
}

#[test]
fn test_malformed_extends() {
    let mut doc = document("services:\n  web: {extends: [base]}\n");
    assert!(matches!(resolve(&mut doc).unwrap_err(), ExtendsError::Shape { .. }));

    let mut doc = document("services:\n  web: {extends: {file: other.yml}}\n");
    assert!(matches!(resolve(&mut doc).unwrap_err(), ExtendsError::Shape { .. }));

    let mut doc = document("services:\n  web: [image]\n");
    assert_eq!(resolve(&mut doc).unwrap_err().to_string(), "services.web must be a mapping");
}

#[test]
fn test_resolution_is_idempotent() {
    let mut doc = document(
        "services:\n  base: {image: a, command: [run]}\n  web: {extends: base, ports: ['80:80']}\n",
    );
    resolve(&mut doc).unwrap();
    let once = doc.clone();
    resolve(&mut doc).unwrap();
    assert_eq!(doc, once);
}

#[test]
fn test_siblings_do_not_share_inherited_values() {
    let mut doc = document(
        r#"
services:
  base:
    image: a
    volumes: [shared:/data]
    deploy: {resources: {limits: {cpus: "1"}}}
  one:
    extends: base
    volumes: [one:/one]
    deploy: {resources: {limits: {memory: 1g}}}
  two:
    extends: base
"#,
    );
    resolve(&mut doc).unwrap();

    assert_eq!(doc["services"]["base"]["volumes"], yaml("[shared:/data]"));
    assert_eq!(doc["services"]["base"]["deploy"], yaml("{resources: {limits: {cpus: '1'}}}"));
    assert_eq!(doc["services"]["two"]["volumes"], yaml("[shared:/data]"));
    assert_eq!(
        doc["services"]["one"]["deploy"],
        yaml("{resources: {limits: {cpus: '1', memory: 1g}}}")
    );
}

#[test]
fn test_structural_clone_is_independent() {
    let original = document("service: {nested: {list: [1, {deep: true}]}}");
    let mut copy = structural_clone_mapping(&original);
    assert_eq!(copy, original);

    copy["service"]["nested"]["list"][1]["deep"] = Value::Bool(false);
    assert_eq!(original["service"]["nested"]["list"][1]["deep"], Value::Bool(true));
}

#[test]
fn test_post_processor_sees_relocated_base() {
    let recorder = Arc::new(RecordingProcessor::new());
    let mut doc = document("services:\n  base: {image: a}\n  web: {extends: base}\n");
    ExtendsResolver::new(LoadOptions::default())
        .with_post_processor(recorder.clone())
        .resolve(&ResolveContext::new(), &mut doc, "compose.yml")
        .unwrap();

    assert_eq!(recorder.fragments(), vec![document("services:\n  web: {image: a}\n")]);
}

#[test]
fn test_depth_limit_through_pipeline() {
    let project = ComposeProject::new().unwrap();
    project
        .write(
            "compose.yml",
            "services:\n  a: {image: x}\n  b: {extends: a}\n  c: {extends: b}\n  d: {extends: c}\n",
        )
        .unwrap();

    let mut options = project.options();
    options.max_depth = 3;
    project.load_with(&["compose.yml"], &options).unwrap();

    options.max_depth = 2;
    let err = project.load_with(&["compose.yml"], &options).unwrap_err();
    assert!(matches!(err, ExtendsError::DepthExceeded { max_depth: 2, .. }));
}
