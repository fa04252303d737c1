pub mod builders;
pub mod probes;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Default budget for a single async test step.
pub const TEST_DEADLINE: Duration = Duration::from_secs(5);

/// Install a test-writer subscriber once per test binary.
///
/// `RUST_LOG` overrides the default of `imgdag=debug` for the crate and
/// `warn` for everything else; output only shows for failing tests unless
/// run with `--nocapture`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("warn,imgdag=debug"));

        // Another harness may already have installed one.
        let _ = fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .try_init();
    });
}

/// Await `f`, panicking if it takes longer than [`TEST_DEADLINE`].
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    within(TEST_DEADLINE, f).await
}

pub async fn within<F, T>(limit: Duration, f: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(limit, f).await {
        Ok(value) => value,
        Err(_) => panic!("test step did not finish within {limit:?}"),
    }
}
