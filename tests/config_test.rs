//! Loading configuration and secrets from disk.

use std::fs;
use std::time::Duration;

use waypost::cache::Operation;
use waypost::{Config, Secrets, WaypostBuilder, WaypostError};

const CONFIG: &str = r#"
coalesce_requests = false

[providers.tomtom]
base_url = "http://127.0.0.1:9"
country_set = "PH"
traffic_flow_enabled = false

[providers.backend]
base_url = "http://127.0.0.1:8000"

[limits]
daily_request_limit = 100
min_request_interval_secs = 0
request_timeout_secs = 3

[cache.ttl_secs]
geocode = 60
"#;

#[test]
fn config_file_round_trips_into_builder() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, CONFIG).unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert!(!config.coalesce_requests);
    assert_eq!(config.limits.usage().daily_limit, 100);
    assert_eq!(config.limits.usage().min_interval, Duration::ZERO);
    assert_eq!(config.limits.request_timeout(), Duration::from_secs(3));
    assert_eq!(
        config.cache.responses().ttl_for(Operation::Geocode),
        Duration::from_secs(60)
    );

    let secrets = Secrets {
        tomtom: Some(waypost::config::ApiKeySecret {
            api_key: "tt-key".into(),
        }),
        ..Default::default()
    };
    let client = WaypostBuilder::from_config(&config, &secrets).build().unwrap();
    let status = client.status();
    assert!(!status.traffic_flow_enabled);
    assert_eq!(status.usage.daily_limit, 100);
    assert!(client.tile_url_template(waypost::MapStyle::Main).is_ok());
}

#[test]
fn missing_explicit_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(matches!(
        Config::load_or_default(Some(&missing)),
        Err(WaypostError::Configuration(_))
    ));
}

#[test]
fn malformed_config_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[limits]\ndaily_request_limit = \"lots\"\n").unwrap();

    let err = Config::load_from_file(&path).unwrap_err();
    assert_eq!(err.code(), "configuration");
}

#[cfg(unix)]
#[test]
fn secrets_with_open_permissions_are_refused() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("secrets.toml");
    fs::write(&path, "[tomtom]\napi_key = \"tt-key\"\n").unwrap();

    fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
    let err = Secrets::load_from_file(&path).unwrap_err();
    assert!(err.to_string().contains("insecure permissions"));

    fs::set_permissions(&path, fs::Permissions::from_mode(0o600)).unwrap();
    let secrets = Secrets::load_from_file(&path).unwrap();
    assert_eq!(secrets.api_key("tomtom").as_deref(), Some("tt-key"));
}
