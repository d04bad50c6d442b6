//! End-to-end checks over a throwaway environment directory

use devenv::compose::graph::extract_services;
use devenv::compose::ComposeParser;
use devenv::config::Settings;
use devenv::runtime::RecordingRunner;
use devenv::Environment;
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

const TEMPLATE: &str = r#"
version: "3.8"
services:
  web:
    image: nginx:latest
    ports:
      - "80:80"
    links:
      - php81_xdebug
  db:
    image: mysql:8
    environment:
      MYSQL_ROOT_PASSWORD: root
  php81_xdebug:
    image: php:8.1-fpm
    volumes:
      - ./www:/var/www
    x-labels:
      team: backend
volumes:
  data: {}
"#;

fn workspace(deployment: Option<&str>) -> (TempDir, Settings) {
    let temp = tempdir().unwrap();
    let mut settings = Settings::with_work_dir(temp.path());
    settings.template = "docker-compose.yml.{.arch}.dist".to_string();
    std::fs::write(settings.template_path(), TEMPLATE).unwrap();
    if let Some(deployment) = deployment {
        std::fs::write(settings.deployment_path(), deployment).unwrap();
    }
    (temp, settings)
}

#[tokio::test]
async fn active_set_matches_deployment() {
    let (_temp, settings) = workspace(Some(
        "services:\n  web:\n    image: nginx:latest\n  db:\n    image: mysql:8\n",
    ));
    let env = Environment::load(settings, Arc::new(RecordingRunner::new()))
        .await
        .unwrap();

    let snapshot = env.snapshot().await;
    let flags: Vec<(&str, bool)> = snapshot
        .graph
        .names()
        .into_iter()
        .zip(snapshot.active.flags().iter().copied())
        .collect();
    assert_eq!(
        flags,
        vec![("db", true), ("php81_xdebug", false), ("web", true)]
    );
}

#[tokio::test]
async fn materialize_then_reload_yields_requested_set() {
    let (_temp, settings) = workspace(Some("services:\n  web: {}\n  db: {}\n"));
    let deployment_path = settings.deployment_path();
    let env = Environment::load(settings, Arc::new(RecordingRunner::new()))
        .await
        .unwrap();

    env.materialize(["web", "php81_xdebug", "mailhog"]).await.unwrap();
    env.reload().await.unwrap();

    let mut active = env.active_services().await;
    active.sort();
    assert_eq!(active, vec!["php81_xdebug", "web"]);

    // Emitted entries are the template definitions, untouched.
    let template = ComposeParser::parse_str(TEMPLATE).unwrap();
    let written = ComposeParser::parse_file(&deployment_path).unwrap();
    let (expected, _) = extract_services(&template);
    let (emitted, _) = extract_services(&written);
    assert_eq!(emitted.len(), 2);
    for service in &emitted {
        let original = expected.iter().find(|s| s.name == service.name).unwrap();
        assert_eq!(service.original, original.original);
    }
    assert!(written.get("volumes").is_some());
}

#[tokio::test]
async fn materialize_is_byte_identical_across_runs() {
    let (_temp, settings) = workspace(None);
    let deployment_path = settings.deployment_path();
    let env = Environment::load(settings, Arc::new(RecordingRunner::new()))
        .await
        .unwrap();

    let first = env.materialize(["db", "web"]).await.unwrap();
    let first_bytes = std::fs::read(&deployment_path).unwrap();
    let second = env.materialize(["web", "db"]).await.unwrap();
    let second_bytes = std::fs::read(&deployment_path).unwrap();

    assert_eq!(first_bytes, second_bytes);
    assert_eq!(first.digest, second.digest);
}
