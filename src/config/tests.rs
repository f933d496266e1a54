use super::*;

fn resolve(raw: RawSettings, profile: &str) -> Settings {
    Settings::from_raw(raw, Profile::from_name(profile).expect("known profile"))
        .expect("valid settings")
}

#[test]
fn default_profile_aliases_development() {
    let settings = for_profile("default").expect("default profile");
    assert_eq!(settings.profile, Profile::Development);
    assert!(settings.mode.debug);
    assert!(!settings.mode.testing);
    assert_eq!(settings.logging.level, LevelFilter::DEBUG);
}

#[test]
fn unknown_profile_is_rejected() {
    let err = for_profile("staging").unwrap_err();
    assert!(matches!(err, LoadError::UnknownProfile { ref name } if name == "staging"));
}

#[test]
fn testing_profile_disables_csrf_and_suppresses_mail() {
    let settings = for_profile("testing").expect("testing profile");
    assert!(settings.mode.testing);
    assert!(!settings.mode.debug);
    assert!(!settings.csrf.enabled);
    assert!(settings.mail.suppress_send);
}

#[test]
fn production_profile_hardens_defaults() {
    let settings = for_profile("production").expect("production profile");
    assert!(!settings.mode.debug);
    assert!(!settings.mode.testing);
    assert!(settings.csrf.enabled);
    assert!(settings.session.secure);
    assert!(!settings.mail.suppress_send);
    assert_eq!(settings.logging.level, LevelFilter::INFO);
}

#[test]
fn log_file_defaults_match_rotation_policy() {
    let settings = for_profile("production").expect("production profile");
    let file = &settings.logging.file;
    assert_eq!(file.path(), std::path::Path::new("logs/ecommerce.log"));
    assert_eq!(file.max_bytes.get(), 10_240);
    assert_eq!(file.backups, 10);
}

#[test]
fn cli_overrides_take_highest_precedence() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(4000);
    raw.logging.level = Some("info".to_string());
    raw.csrf.enabled = Some(true);

    let overrides = ServeOverrides {
        server_port: Some(4321),
        log_level: Some("warn".to_string()),
        csrf_enabled: Some(false),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = resolve(raw, "production");

    assert_eq!(settings.server.addr.port(), 4321);
    assert_eq!(settings.logging.level, LevelFilter::WARN);
    assert!(!settings.csrf.enabled);
}

#[test]
fn file_values_override_profile_defaults() {
    let mut raw = RawSettings::default();
    raw.app.debug = Some(false);
    raw.mail.suppress_send = Some(false);

    let settings = resolve(raw, "development");
    assert!(!settings.mode.debug);
    assert!(!settings.mail.suppress_send);
}

#[test]
fn cli_json_logging_enforces_format() {
    let mut raw = RawSettings::default();
    let overrides = ServeOverrides {
        log_json: Some(true),
        ..Default::default()
    };

    raw.apply_serve_overrides(&overrides);
    let settings = resolve(raw, "default");

    assert!(matches!(settings.logging.format, LogFormat::Json));
}

#[test]
fn rejects_zero_port_and_bad_log_file_name() {
    let mut raw = RawSettings::default();
    raw.server.port = Some(0);
    assert!(Settings::from_raw(raw, Profile::Development).is_err());

    let mut raw = RawSettings::default();
    raw.logging.file_name = Some("../escape.log".into());
    let err = Settings::from_raw(raw, Profile::Development).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "logging.file_name",
            ..
        }
    ));
}

#[test]
fn session_sweep_interval_defaults_and_rejects_zero() {
    let settings = resolve(RawSettings::default(), "production");
    assert_eq!(
        settings.session.sweep_interval,
        std::time::Duration::from_secs(300)
    );

    let mut raw = RawSettings::default();
    raw.session.sweep_interval_seconds = Some(0);
    let err = Settings::from_raw(raw, Profile::Production).unwrap_err();
    assert!(matches!(
        err,
        LoadError::Invalid {
            key: "session.sweep_interval_seconds",
            ..
        }
    ));
}

#[test]
fn blank_mail_credentials_are_treated_as_absent() {
    let mut raw = RawSettings::default();
    raw.mail.username = Some("  ".into());
    raw.mail.password = Some(String::new());

    let settings = resolve(raw, "production");
    assert!(settings.mail.username.is_none());
    assert!(settings.mail.password.is_none());
}

#[test]
fn default_to_serve_command() {
    let args = CliArgs::parse_from(["storefront"]);
    assert_eq!(args.profile, "default");
    let command = args
        .command
        .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
    assert!(matches!(command, Command::Serve(_)));
}

#[test]
fn parse_migrate_arguments() {
    let args = CliArgs::parse_from([
        "storefront",
        "--profile",
        "production",
        "migrate",
        "--database-url",
        "postgres://example",
    ]);

    assert_eq!(args.profile, "production");
    match args.command.expect("migrate command") {
        Command::Migrate(migrate) => {
            assert_eq!(
                migrate.database.database_url.as_deref(),
                Some("postgres://example")
            );
        }
        _ => panic!("wrong command parsed"),
    }
}

#[test]
fn parse_serve_overrides() {
    let args = CliArgs::parse_from([
        "storefront",
        "serve",
        "--server-host",
        "0.0.0.0",
        "--database-url",
        "postgres://override",
        "--mail-suppress-send",
        "true",
    ]);

    match args.command.expect("serve command") {
        Command::Serve(serve) => {
            assert_eq!(serve.overrides.server_host.as_deref(), Some("0.0.0.0"));
            assert_eq!(
                serve.overrides.database.database_url.as_deref(),
                Some("postgres://override")
            );
            assert_eq!(serve.overrides.mail_suppress_send, Some(true));
        }
        _ => panic!("wrong command parsed"),
    }
}
