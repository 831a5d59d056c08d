//! Structured logging setup and shared field values for pantsu-booru.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (pool, migrations) |
//! | DEBUG | Operation completions, decision points |
//! | TRACE | Per-item iteration (individual tags, ranked hits) |
//!
//! Events carry `subsystem`, `component` and `op` fields so log aggregation
//! can filter by origin.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;
use crate::defaults;
use crate::error::{Error, Result};

// ─── Subsystem values ──────────────────────────────────────────────────────

/// `subsystem` value for store events.
pub const SUBSYSTEM_DB: &str = "database";

// ─── Component values ──────────────────────────────────────────────────────

/// Connection pool and migrations.
pub const COMPONENT_POOL: &str = "pool";

/// Tag catalog.
pub const COMPONENT_TAGS: &str = "tags";

/// Image/tag links.
pub const COMPONENT_LINKS: &str = "links";

/// Ranked tag search.
pub const COMPONENT_SEARCH: &str = "search";

/// Images and comments.
pub const COMPONENT_CONTENT: &str = "content";

/// Accounts.
pub const COMPONENT_USERS: &str = "users";

/// Install the global subscriber.
///
/// Honours `RUST_LOG`, falling back to [`defaults::LOG_FILTER`].
pub fn init_tracing(format: LogFormat) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(defaults::LOG_FILTER));
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    result.map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

/// Route log output through the test harness. Safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
