//! Runtime configuration through the public builder: precedence of
//! programmatic values, `OXCO_*` variables, config files and defaults, and
//! how each setting shows up in a run.

mod common;

use std::time::Duration;

use common::*;
use oxco::runtime::env_config::{ENV_CLOCK, ENV_MAX_STEPS, ENV_NAME};
use oxco::{ClockMode, ErrorKind, RuntimeBuilder, RuntimeConfig};

fn clear_env() {
    for var in [ENV_CLOCK, ENV_MAX_STEPS, ENV_NAME] {
        std::env::remove_var(var);
    }
}

#[test]
fn defaults_without_sources() {
    let _guard = env_lock();
    clear_env();
    let rt = RuntimeBuilder::from_env().build().unwrap();
    assert_eq!(rt.config(), &RuntimeConfig::default());
}

#[test]
fn env_values_apply() {
    let _guard = env_lock();
    clear_env();
    std::env::set_var(ENV_CLOCK, "realtime");
    std::env::set_var(ENV_MAX_STEPS, "1234");
    std::env::set_var(ENV_NAME, "env-run");
    let rt = RuntimeBuilder::from_env().build();
    clear_env();

    let rt = rt.unwrap();
    assert_eq!(rt.config().clock, ClockMode::Realtime);
    assert_eq!(rt.config().max_steps, Some(1234));
    assert_eq!(rt.config().name, "env-run");
}

#[test]
fn env_is_ignored_unless_requested() {
    let _guard = env_lock();
    clear_env();
    std::env::set_var(ENV_NAME, "ignored");
    let rt = RuntimeBuilder::new().build();
    clear_env();
    assert_eq!(rt.unwrap().config().name, RuntimeConfig::DEFAULT_NAME);
}

#[test]
fn invalid_env_is_a_config_error() {
    let _guard = env_lock();
    clear_env();
    std::env::set_var(ENV_MAX_STEPS, "lots");
    let err = RuntimeBuilder::from_env().build().unwrap_err();
    clear_env();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert!(err.to_string().contains(ENV_MAX_STEPS));
}

#[test]
fn builder_beats_env() {
    let _guard = env_lock();
    clear_env();
    std::env::set_var(ENV_CLOCK, "realtime");
    let rt = RuntimeBuilder::from_env().clock(ClockMode::Virtual).build();
    clear_env();
    assert_eq!(rt.unwrap().config().clock, ClockMode::Virtual);
}

#[test]
fn blank_name_falls_back_to_default() {
    let rt = RuntimeBuilder::new().name("   ").build().unwrap();
    assert_eq!(rt.config().name, RuntimeConfig::DEFAULT_NAME);
}

#[test]
fn step_limit_bounds_a_livelock() {
    init_test_logging();
    let rt = RuntimeBuilder::new().max_steps(100).build().unwrap();
    let err = rt
        .run(|cx| async move {
            for _ in 0..1_000 {
                cx.yield_now().await?;
            }
            Ok(())
        })
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StepLimit);
}

#[test]
fn realtime_clock_really_waits() {
    init_test_logging();
    let rt = RuntimeBuilder::new()
        .clock(ClockMode::Realtime)
        .build()
        .unwrap();
    let started = std::time::Instant::now();
    let now = rt
        .run(|cx| async move {
            cx.sleep(Duration::from_millis(20)).await?;
            Ok(cx.now())
        })
        .unwrap();
    assert!(started.elapsed() >= Duration::from_millis(20));
    assert!(now.as_millis() >= 20);
}

#[cfg(feature = "config-file")]
mod file {
    use super::*;
    use std::io::Write as _;

    fn config_file(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn file_values_apply() {
        let file = config_file("[executor]\nclock = \"realtime\"\nmax_steps = 42\nname = \"file-run\"\n");
        let rt = RuntimeBuilder::new().config_file(file.path()).build().unwrap();
        assert_eq!(rt.config().clock, ClockMode::Realtime);
        assert_eq!(rt.config().max_steps, Some(42));
        assert_eq!(rt.config().name, "file-run");
    }

    #[test]
    fn full_precedence_chain() {
        let _guard = env_lock();
        clear_env();
        let file = config_file("[executor]\nclock = \"realtime\"\nmax_steps = 42\nname = \"file-run\"\n");
        std::env::set_var(ENV_MAX_STEPS, "7");
        std::env::set_var(ENV_NAME, "env-run");
        let rt = RuntimeBuilder::from_env()
            .config_file(file.path())
            .name("code-run")
            .build();
        clear_env();

        let rt = rt.unwrap();
        assert_eq!(rt.config().clock, ClockMode::Realtime);
        assert_eq!(rt.config().max_steps, Some(7));
        assert_eq!(rt.config().name, "code-run");
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = RuntimeBuilder::new()
            .config_file("/nonexistent/oxco.toml")
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
