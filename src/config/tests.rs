use std::io::Write as _;

use super::*;

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("debug".to_string()),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn defaults_describe_a_production_cache() {
    let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");

    assert_eq!(settings.server.addr.to_string(), "127.0.0.1:3000");
    assert_eq!(settings.server.graceful_shutdown, Duration::from_secs(30));
    assert!(settings.cache.enabled);
    assert!(settings.cache.stale_while_revalidate);
    assert_eq!(settings.cache.max_entries.get(), DEFAULT_CACHE_MAX_ENTRIES);
    assert_eq!(settings.cache.stale_window, Duration::from_secs(3600));
    assert_eq!(settings.cache.refresh_timeout, Duration::from_secs(30));
    assert_eq!(settings.policy.environment, Environment::Production);
    assert_eq!(settings.policy.document_ttl_seconds, 300);
    assert!(settings.origin.is_none());
    assert!(settings.invalidation.secret.is_none());
    assert!(settings.invalidation.dependencies.is_empty());
    assert!(matches!(settings.logging.format, LogFormat::Compact));
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn cache_settings_can_be_overridden_via_cli() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        cache_enabled: Some(false),
        cache_max_entries: Some(50),
        cache_stale_while_revalidate: Some(false),
        cache_refresh_timeout_seconds: Some(5),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = Settings::from_raw(raw).expect("valid settings");

    assert!(!settings.cache.enabled);
    assert!(!settings.cache.stale_while_revalidate);
    assert_eq!(settings.cache.max_entries.get(), 50);
    assert_eq!(settings.cache.refresh_timeout, Duration::from_secs(5));
    assert_eq!(settings.cache.stale_window, Duration::from_secs(3600));
}

#[test]
fn zero_values_are_rejected() {
    let mut raw = RawSettings::default();
    raw.cache.max_entries = Some(0);
    let err = Settings::from_raw(raw).expect_err("zero entries");
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "cache.max_entries",
            ..
        }
    ));

    let mut raw = RawSettings::default();
    raw.server.port = Some(0);
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.origin.base_url = Some("https://cms.example.com".to_string());
    raw.origin.timeout_seconds = Some(0);
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn swr_multiplier_has_a_floor() {
    let mut raw = RawSettings::default();
    raw.policy.swr_multiplier = Some(1);
    let err = Settings::from_raw(raw).expect_err("multiplier below floor");
    assert!(err.to_string().contains("policy.swr_multiplier"));
}

#[test]
fn environment_accepts_aliases() {
    let mut raw = RawSettings::default();
    raw.apply_serve_overrides(&ServeOverrides {
        environment: Some("dev".to_string()),
        ..Default::default()
    });
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert_eq!(settings.policy.environment, Environment::Development);

    let mut raw = RawSettings::default();
    raw.policy.environment = Some("staging".to_string());
    assert!(Settings::from_raw(raw).is_err());
}

#[test]
fn origin_requires_http_url() {
    let mut raw = RawSettings::default();
    raw.origin.base_url = Some("ftp://cms.example.com".to_string());
    assert!(Settings::from_raw(raw).is_err());

    let mut raw = RawSettings::default();
    raw.origin.base_url = Some("  ".to_string());
    let settings = Settings::from_raw(raw).expect("blank url means unset");
    assert!(settings.origin.is_none());

    let mut raw = RawSettings::default();
    raw.apply_serve_overrides(&ServeOverrides {
        origin_url: Some("https://cms.example.com/".to_string()),
        origin_api_key: Some("k-1".to_string()),
        ..Default::default()
    });
    let origin = Settings::from_raw(raw)
        .expect("valid settings")
        .origin
        .expect("origin configured");
    assert_eq!(origin.base_url.host_str(), Some("cms.example.com"));
    assert_eq!(origin.api_key.as_deref(), Some("k-1"));
    assert_eq!(origin.timeout, Duration::from_secs(30));
}

#[test]
fn blank_secret_is_treated_as_unset() {
    let mut raw = RawSettings::default();
    raw.invalidation.secret = Some(String::new());
    let settings = Settings::from_raw(raw).expect("valid settings");
    assert!(settings.invalidation.secret.is_none());
}

#[test]
fn dependencies_come_from_file() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("tempfile");
    writeln!(
        file,
        r#"
[cache]
max_entries = 25

[origin]
base_url = "https://cms.example.com"

[invalidation]
secret = "s3cret"

[invalidation.dependencies]
authors = ["blogs"]
"#
    )
    .expect("write config");

    let args = CliArgs {
        config_file: Some(file.path().to_path_buf()),
        command: Some(Command::Serve(Box::new(ServeArgs {
            overrides: ServeOverrides {
                cache_max_entries: Some(40),
                ..Default::default()
            },
        }))),
    };
    let settings = load(&args).expect("load");

    assert_eq!(settings.cache.max_entries.get(), 40);
    assert_eq!(settings.invalidation.secret.as_deref(), Some("s3cret"));
    let tags = settings.invalidation.dependencies.dependent_tags("authors");
    assert_eq!(tags.len(), 1);
    assert!(settings.origin.is_some());
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["sitecache"]);
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "sitecache",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--cache-enabled=false",
        "--origin-url",
        "https://cms.example.com",
        "--cache-stale-window-seconds",
        "120",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(serve.overrides.cache_enabled, Some(false));
            assert_eq!(
                serve.overrides.origin_url.as_deref(),
                Some("https://cms.example.com")
            );
            assert_eq!(serve.overrides.cache_stale_window_seconds, Some(120));
        }
        Command::CheckConfig => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_check_config() {
    let args = CliArgs::parse_from(["sitecache", "check-config"]);
    assert!(matches!(args.command, Some(Command::CheckConfig)));
}
