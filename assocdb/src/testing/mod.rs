use std::sync::Once;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::DatabaseConfig;
use crate::database::Database;
use crate::ontology::{IndexMode, QueryShape};

static TRACING: Once = Once::new();

/// Install a log subscriber once per test binary.
///
/// Filtered by `RUST_LOG`, quiet by default.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "assocdb=warn".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    });
}

/// In-memory database with the default configuration.
pub fn new_test_database() -> Database {
    new_test_database_in(IndexMode::Hexa)
}

/// In-memory database maintaining the given orientations.
pub fn new_test_database_in(mode: IndexMode) -> Database {
    init_tracing();
    Database::in_memory(DatabaseConfig::new().with_index_mode(mode))
}

/// Parse a shape such as `"MVI"`.
pub fn shape(text: &str) -> QueryShape {
    text.parse().expect("valid shape literal")
}
