//! Unit tests for `AppError` display format and conversions.

use console_session::AppError;

#[test]
fn startup_error_display_has_prefix() {
    let err = AppError::Startup("banner mismatch".into());
    assert_eq!(err.to_string(), "startup: banner mismatch");
}

#[test]
fn every_variant_has_distinct_prefix() {
    let rendered = [
        AppError::Config("x".into()).to_string(),
        AppError::Launch("x".into()).to_string(),
        AppError::Startup("x".into()).to_string(),
        AppError::Closed("x".into()).to_string(),
        AppError::InvalidLine("x".into()).to_string(),
        AppError::Io("x".into()).to_string(),
    ];

    for (i, a) in rendered.iter().enumerate() {
        for b in &rendered[i + 1..] {
            assert_ne!(a, b);
        }
    }
}

#[test]
fn io_error_converts_to_io_variant() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
    let err = AppError::from(io);

    assert!(matches!(err, AppError::Io(ref msg) if msg.contains("pipe closed")));
}

#[test]
fn toml_error_converts_to_config_variant() {
    let parse: Result<toml::Value, _> = toml::from_str("command = ");
    let err = AppError::from(parse.unwrap_err());

    assert!(err.to_string().starts_with("config: invalid config"));
}
