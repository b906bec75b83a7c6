//! Test-only helpers shared by the asset layer crates: a tracing
//! initializer safe to call from every test (even across many test
//! binaries), plus the `assert_err!`/`assert_ok!` conveniences a few tests
//! reach for instead of pattern matching out a `Result`.

use lazy_static::lazy_static;
use std::sync::Once;

pub use pretty_assertions;
pub use proptest;
pub use tempdir::TempDir;

lazy_static! {
    static ref INIT: Once = Once::new();
}

/// Installs a `tracing` subscriber and `color-eyre` panic/error hooks once
/// per process. Safe to call at the top of every test; later calls are
/// no-ops.
pub fn init() {
    INIT.call_once(|| {
        let filter = std::env::var("ARKASSET_TEST_LOG").unwrap_or_else(|_| "info".to_string());
        let fmt_subscriber = tracing_subscriber::fmt::Subscriber::builder()
            .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
            .with_writer(std::io::stdout)
            .finish();
        let _ = tracing::subscriber::set_global_default(fmt_subscriber);

        if let Err(report) = color_eyre::install() {
            tracing::warn!(?report, "color_eyre already installed");
        }
    });
}

/// Asserts that `result` is `Ok`, panicking with the `Err` value (via
/// `Debug`) if not.
#[macro_export]
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(err) => panic!("expected Ok, got Err({:?})", err),
        }
    };
}

/// Asserts that `result` is `Err`, panicking with the `Ok` value (via
/// `Debug`) if not, and returns the error.
#[macro_export]
macro_rules! assert_err {
    ($result:expr) => {
        match $result {
            Ok(value) => panic!("expected Err, got Ok({:?})", value),
            Err(err) => err,
        }
    };
}
