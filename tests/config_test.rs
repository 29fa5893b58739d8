use distributor::config::Config;
use distributor::config::secrets::ExposeSecret;
use distributor::error::Error;
use std::time::Duration;

const ENV_VARS: &[&str] = &[
    "DISTSERVER_HOST",
    "DISTSERVER_PORT",
    "DISTSERVER_KEY",
    "DISTRIBUTOR_NAME",
    "APP_MD5",
    "APP_URL",
    "APP_NAME",
    "UPLOAD_SCHEME",
    "SEND_TIMEOUT_SECS",
    "OTEL_ENDPOINT",
    "LOG_LEVEL",
];

fn clear_env() {
    for name in ENV_VARS {
        unsafe { std::env::remove_var(name) };
    }
}

// Environment is process-global, so all env cases run in one test.
#[test]
fn config_from_env() {
    clear_env();
    assert!(matches!(Config::from_env(), Err(Error::Config(_))));

    unsafe { std::env::set_var("DISTSERVER_KEY", "643d1e29b4c27bd729faa938ea99e604") };
    let config = Config::from_env().unwrap();
    assert_eq!(config.host, "localhost");
    assert_eq!(config.port, 9933);
    assert_eq!(config.name, "slowsquare");
    assert_eq!(config.upload, "data:");
    assert_eq!(config.bundle.file_name, "slowsquare.app");
    assert_eq!(config.send_timeout, Duration::from_secs(30));
    assert_eq!(config.log_level, "info");
    assert!(config.otel_endpoint.is_none());
    assert_eq!(
        config.credential.expose_secret(),
        "643d1e29b4c27bd729faa938ea99e604"
    );
    assert!(!format!("{config:?}").contains("643d1e29b4c27bd729faa938ea99e604"));

    unsafe {
        std::env::set_var("DISTSERVER_HOST", "broker.internal");
        std::env::set_var("DISTSERVER_PORT", "7000");
        std::env::set_var("DISTRIBUTOR_NAME", "fastcube");
        std::env::set_var("SEND_TIMEOUT_SECS", "5");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.host, "broker.internal");
    assert_eq!(config.port, 7000);
    assert_eq!(config.distributor_settings().name, "fastcube");
    assert_eq!(config.send_timeout, Duration::from_secs(5));

    unsafe { std::env::set_var("DISTSERVER_PORT", "not-a-port") };
    assert!(matches!(Config::from_env(), Err(Error::Config(_))));

    unsafe { std::env::set_var("DISTSERVER_PORT", "0") };
    assert!(matches!(Config::from_env(), Err(Error::Config(_))));

    clear_env();
}

#[test]
fn config_from_toml_applies_defaults() {
    let config = Config::from_toml(
        r#"
        [server]
        key = "secret"
        "#,
    )
    .unwrap();

    assert_eq!(config.host, "localhost");
    assert_eq!(config.port, 9933);
    assert_eq!(config.name, "slowsquare");
    assert_eq!(config.bundle.fingerprint, "8e892921ccf4ab68af29d65b82a9f60e");
    assert_eq!(config.send_timeout, Duration::from_secs(30));
}

#[test]
fn config_from_toml_reads_all_sections() {
    let config = Config::from_toml(
        r#"
        [server]
        host = "10.0.0.5"
        port = 9000
        key = "secret"
        send_timeout_secs = 2

        [distributor]
        name = "squares"
        upload = "data:"

        [app]
        md5 = "abc"
        url = "http://host/app"
        name = "squares.app"

        [telemetry]
        endpoint = "http://localhost:4317"
        log_level = "debug"
        "#,
    )
    .unwrap();

    let settings = config.distributor_settings();
    assert_eq!(settings.name, "squares");
    assert_eq!(settings.bundle.file_entry().name, "squares.app");
    assert_eq!(settings.bundle.address, "http://host/app");
    assert_eq!(config.port, 9000);
    assert_eq!(config.send_timeout, Duration::from_secs(2));
    assert_eq!(config.otel_endpoint.as_deref(), Some("http://localhost:4317"));
    assert_eq!(config.log_level, "debug");
}

#[test]
fn config_from_toml_requires_key() {
    let err = Config::from_toml("[server]\nhost = \"localhost\"\n").unwrap_err();
    assert!(matches!(err, Error::Config(_)));

}

#[test]
fn config_passes_credential_through_untouched() {
    let config = Config::from_toml("[server]\nkey = \"\"\n").unwrap();
    assert_eq!(config.credential.expose_secret(), "");
}

#[test]
fn config_from_toml_rejects_invalid_values() {
    let zero_port = Config::from_toml("[server]\nkey = \"k\"\nport = 0\n");
    assert!(matches!(zero_port, Err(Error::Config(_))));

    let spaced_name =
        Config::from_toml("[server]\nkey = \"k\"\n[distributor]\nname = \"slow square\"\n");
    assert!(matches!(spaced_name, Err(Error::Config(ref m)) if m.contains("name")));
}

#[test]
fn config_from_missing_file_fails() {
    let err = Config::from_file(std::path::Path::new("/nonexistent/distributor.toml")).unwrap_err();
    assert!(matches!(err, Error::Config(ref m) if m.contains("cannot read")));
}
