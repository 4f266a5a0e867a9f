//! Database layer
//!
//! SQLite is the default (single-file deployment); MySQL is available for
//! larger installs. The driver is selected by configuration and hidden
//! behind the `DatabasePool` trait.
//!
//! ```ignore
//! use learnhub::config::DatabaseConfig;
//! use learnhub::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
