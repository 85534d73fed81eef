//! App config tests

use std::time::Duration;

use harbormaster::config::{AppConfig, GoDuration};
use harbormaster::errors::HarborError;
use secrecy::ExposeSecret;
use tempfile::TempDir;

const EXAMPLE: &str = r#"
name = "web"
image = "ghcr.io/acme/web:1.4.2"
replicas = 2
docker_host = "tcp://10.0.0.5:2375"

[public]
address = "web.example.com"
target_port = 8080

[volumes]
web_data = "/var/lib/web"

[env]
LOG_LEVEL = "info"

[secrets]
api_key = "s3cr3t"
db_password_file = "secrets/db_password"
empty = ""

[label]
team = "platform"

[healthcheck]
test = ["CMD", "curl", "-f", "http://localhost:8080/health"]
interval = "10s"
timeout = "2s"
start_period = "1m30s"
retries = 3

[deploy]
order = "start-first"
monitor = "30s"
"#;

#[tokio::test]
async fn test_missing_file_asks_for_init() {
    let dir = TempDir::new().unwrap();

    let err = AppConfig::load(&dir.path().join("harbor.toml")).await.unwrap_err();

    match err {
        HarborError::ConfigError(message) => assert_eq!(
            message,
            "config file does not exist, please run 'harbor init' first"
        ),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_parse_full_example() {
    let config = AppConfig::parse(EXAMPLE).unwrap();

    assert_eq!(config.name, "web");
    assert_eq!(config.replicas, 2);
    assert_eq!(config.public_address(), Some("web.example.com"));
    assert_eq!(config.docker_host().unwrap(), "tcp://10.0.0.5:2375");

    let health = config.healthcheck.as_ref().unwrap();
    assert_eq!(health.start_period, GoDuration(Duration::from_secs(90)));
    assert_eq!(health.retries, 3);

    let routes = config.routes();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].target_port, Some(8080));

    let app = config.to_description();
    assert_eq!(app.replicas(), 2);
    assert_eq!(app.volumes[0].source, "web_data");
    assert_eq!(app.volumes[0].target, "/var/lib/web");
    assert_eq!(app.labels.get("team").map(String::as_str), Some("platform"));
    assert_eq!(app.monitor_window, Some(Duration::from_secs(30)));
    assert_eq!(app.health_check.unwrap().interval, Duration::from_secs(10));
}

#[test]
fn test_name_and_image_are_required() {
    assert!(matches!(
        AppConfig::parse("image = \"nginx\""),
        Err(HarborError::ConfigError(_))
    ));
    assert!(matches!(
        AppConfig::parse("name = \"web\""),
        Err(HarborError::ConfigError(_))
    ));
}

#[tokio::test]
async fn test_secrets_are_read_from_relative_files() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("secrets")).unwrap();
    std::fs::write(dir.path().join("secrets/db_password"), b"hunter2\n").unwrap();

    let config = AppConfig::parse(EXAMPLE).unwrap();
    let payloads = config.load_secrets(dir.path()).await.unwrap();

    let keys: Vec<&str> = payloads.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["api_key", "db_password"]);
    assert_eq!(payloads["api_key"].expose_secret(), b"s3cr3t");
    assert_eq!(payloads["db_password"].expose_secret(), b"hunter2\n");
}

#[tokio::test]
async fn test_unreadable_secret_file_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let config = AppConfig::parse(EXAMPLE).unwrap();

    let err = config.load_secrets(dir.path()).await.unwrap_err();

    assert!(matches!(err, HarborError::ConfigError(m) if m.contains("secrets/db_password")));
}

#[tokio::test]
async fn test_save_is_private_and_reloads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("harbor.toml");

    let config = AppConfig::new_default("web");
    config.save(&path).await.unwrap();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    let loaded = AppConfig::load(&path).await.unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.image, "hashicorp/http-echo:latest");
}
