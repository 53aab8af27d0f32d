use compose_extends::core::{ExtendsError, ResolveContext};
use compose_extends::interpolation::Options;
use compose_extends::loader::{ConfigDetails, ConfigFile, LoadOptions, load_document};
use compose_extends::test_utils::ComposeProject;
use serde_yaml::Value;
use std::sync::Arc;
use std::time::Instant;

fn yaml(text: &str) -> Value {
    serde_yaml::from_str(text).unwrap()
}

fn variables(pairs: &'static [(&'static str, &'static str)]) -> Options {
    Options::new(Arc::new(move |name: &str| {
        pairs.iter().find(|(key, _)| *key == name).map(|(_, value)| (*value).to_string())
    }))
    .compose_defaults()
}

#[test]
fn test_include_adds_services_relative_to_includer() {
    let project = ComposeProject::new().unwrap();
    project
        .write(
            "compose.yml",
            "include:\n  - infra/db.yml\nservices:\n  web: {image: web, depends_on: [db]}\n",
        )
        .unwrap();
    project
        .write(
            "infra/db.yml",
            "include:\n  - path: cache.yml\nservices:\n  db: {image: postgres}\nvolumes:\n  data: {}\n",
        )
        .unwrap();
    project.write("infra/cache.yml", "services:\n  cache: {image: redis}\n").unwrap();

    let doc = project.load(&["compose.yml"]).unwrap();
    assert_eq!(doc["services"]["db"], yaml("{image: postgres}"));
    assert_eq!(doc["services"]["cache"], yaml("{image: redis}"));
    assert_eq!(doc["volumes"], yaml("{data: {}}"));
    assert!(doc.get("include").is_none());
}

#[test]
fn test_included_service_can_be_extended() {
    let project = ComposeProject::new().unwrap();
    project
        .write("compose.yml", "include: [base.yml]\nservices:\n  web: {extends: app, ports: ['80:80']}\n")
        .unwrap();
    project.write("base.yml", "services:\n  app: {image: app}\n").unwrap();

    let doc = project.load(&["compose.yml"]).unwrap();
    assert_eq!(doc["services"]["web"], yaml("{image: app, ports: ['80:80']}"));
}

#[test]
fn test_include_conflict() {
    let project = ComposeProject::new().unwrap();
    project.write("compose.yml", "include: [db.yml]\nservices:\n  db: {image: mine}\n").unwrap();
    project.write("db.yml", "services:\n  db: {image: theirs}\n").unwrap();

    match project.load(&["compose.yml"]).unwrap_err() {
        ExtendsError::IncludeConflict { service, file } => {
            assert_eq!(service, "db");
            assert_eq!(file, project.identity("db.yml"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_include_cycle() {
    let project = ComposeProject::new().unwrap();
    project.write("compose.yml", "include: [a.yml]\nservices: {}\n").unwrap();
    project.write("a.yml", "include: [compose.yml]\n").unwrap();

    match project.load(&["compose.yml"]).unwrap_err() {
        ExtendsError::IncludeCycle { chain } => {
            assert_eq!(
                chain,
                vec![
                    project.identity("compose.yml"),
                    project.identity("a.yml"),
                    project.identity("compose.yml"),
                ]
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_reset_removes_inherited_value_across_files() {
    let project = ComposeProject::new().unwrap();
    project
        .write(
            "compose.yml",
            r#"
services:
  web:
    extends: {file: base.yml, service: app}
    ports: !reset []
    environment:
      DEBUG: !reset ""
"#,
        )
        .unwrap();
    project
        .write(
            "base.yml",
            "services:\n  app:\n    image: app\n    ports: ['80:80']\n    environment: {DEBUG: '1', KEEP: '1'}\n",
        )
        .unwrap();

    let doc = project.load(&["compose.yml"]).unwrap();
    assert_eq!(doc["services"]["web"], yaml("{image: app, environment: {KEEP: '1'}}"));
}

#[test]
fn test_override_tag_replaces_inherited_value() {
    let project = ComposeProject::new().unwrap();
    project
        .write(
            "compose.yml",
            "services:\n  base: {image: a, ports: ['80:80']}\n  web:\n    extends: base\n    ports: !override ['8080:80']\n",
        )
        .unwrap();

    let doc = project.load(&["compose.yml"]).unwrap();
    assert_eq!(doc["services"]["web"]["ports"], yaml("['8080:80']"));
}

#[test]
fn test_interpolation_before_extends() {
    let project = ComposeProject::new().unwrap();
    project
        .write(
            "compose.yml",
            r#"
services:
  base:
    image: "app:${TAG:-latest}"
    deploy: {replicas: "${REPLICAS}"}
  web:
    extends: base
    environment: {HOST: "${HOST:-localhost}"}
"#,
        )
        .unwrap();

    let mut options = project.options();
    options.interpolation = variables(&[("TAG", "1.2"), ("REPLICAS", "3")]);
    let doc = project.load_with(&["compose.yml"], &options).unwrap();

    assert_eq!(
        doc["services"]["web"],
        yaml("{image: 'app:1.2', deploy: {replicas: 3}, environment: {HOST: localhost}}")
    );
}

#[test]
fn test_interpolation_error_names_path() {
    let project = ComposeProject::new().unwrap();
    project
        .write("compose.yml", "services:\n  web:\n    image: \"${IMAGE:?image is required}\"\n")
        .unwrap();

    let mut options = project.options();
    options.interpolation = variables(&[]);
    let err = project.load_with(&["compose.yml"], &options).unwrap_err();
    match err {
        ExtendsError::Interpolation { path, reason } => {
            assert_eq!(path, "services.web.image");
            assert!(reason.contains("image is required"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_skip_interpolation() {
    let project = ComposeProject::new().unwrap();
    project.write("compose.yml", "services:\n  web: {image: \"${IMAGE}\"}\n").unwrap();

    let mut options = project.options();
    options.skip_interpolation = true;
    let doc = project.load_with(&["compose.yml"], &options).unwrap();
    assert_eq!(doc["services"]["web"]["image"], yaml("'${IMAGE}'"));
}

#[test]
fn test_later_files_override_earlier_ones() {
    let project = ComposeProject::new().unwrap();
    project
        .write(
            "compose.yml",
            "name: one\nservices:\n  web: {image: web, environment: {A: '1'}}\n  db: {image: db}\n",
        )
        .unwrap();
    project
        .write("compose.override.yml", "name: two\nservices:\n  web: {environment: {B: '2'}}\n")
        .unwrap();

    let doc = project.load(&["compose.yml", "compose.override.yml"]).unwrap();
    assert_eq!(doc["name"], yaml("two"));
    assert_eq!(doc["services"]["web"], yaml("{image: web, environment: {A: '1', B: '2'}}"));
    assert_eq!(doc["services"]["db"], yaml("{image: db}"));
}

#[test]
fn test_normalization_and_defaults() {
    let project = ComposeProject::new().unwrap();
    project
        .write(
            "compose.yml",
            "services:\n  web:\n    build: ./web\n    environment: [A=1, B]\n    labels: [team=core]\n",
        )
        .unwrap();

    let doc = project.load(&["compose.yml"]).unwrap();
    assert_eq!(
        doc["services"]["web"],
        yaml("{build: {context: ./web, dockerfile: Dockerfile}, environment: {A: '1', B: ~}, labels: {team: core}}")
    );

    let mut options = project.options();
    options.skip_normalization = true;
    options.skip_default_values = true;
    let raw = project.load_with(&["compose.yml"], &options).unwrap();
    assert_eq!(raw["services"]["web"]["build"], yaml("./web"));
}

#[test]
fn test_validation() {
    let project = ComposeProject::new().unwrap();
    project.write("compose.yml", "services:\n  web: {ports: ['80:80']}\n").unwrap();

    let err = project.load(&["compose.yml"]).unwrap_err();
    assert!(matches!(err, ExtendsError::Validation { .. }));
    assert!(err.to_string().contains("has neither an image nor a build context specified"));

    let mut options = project.options();
    options.skip_validation = true;
    assert!(project.load_with(&["compose.yml"], &options).is_ok());
}

#[test]
fn test_parse_and_read_errors() {
    let project = ComposeProject::new().unwrap();
    project.write("broken.yml", "services: [unclosed\n").unwrap();
    project.write("scalar.yml", "just a string\n").unwrap();

    assert!(matches!(project.load(&["broken.yml"]).unwrap_err(), ExtendsError::Parse { .. }));
    assert!(matches!(project.load(&["scalar.yml"]).unwrap_err(), ExtendsError::Shape { .. }));
    assert!(matches!(project.load(&["absent.yml"]).unwrap_err(), ExtendsError::Read { .. }));
}

#[test]
fn test_inline_content_without_disk() {
    let details = ConfigDetails::new(
        std::env::temp_dir(),
        vec![ConfigFile::with_content(
            "inline.yml",
            "services:\n  base: {image: a}\n  web: {extends: base}\n",
        )],
    );
    let doc = load_document(&ResolveContext::new(), &details, &LoadOptions::default()).unwrap();
    assert_eq!(doc["services"]["web"], yaml("{image: a}"));
}

#[test]
fn test_cancelled_and_expired_contexts() {
    let project = ComposeProject::new().unwrap();
    project.write("compose.yml", "services:\n  web: {image: a}\n").unwrap();
    let details = project.details(&["compose.yml"]);

    let cancelled = ResolveContext::new();
    cancelled.cancel();
    let err = load_document(&cancelled, &details, &project.options()).unwrap_err();
    assert!(matches!(err, ExtendsError::Cancelled));

    let expired = ResolveContext::new().with_deadline(Instant::now());
    let err = load_document(&expired, &details, &project.options()).unwrap_err();
    assert!(matches!(err, ExtendsError::DeadlineExceeded));
}
