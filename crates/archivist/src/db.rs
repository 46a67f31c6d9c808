//! Opening the archive database.
//!
//! SQLite archives run on a single pooled connection: every batch write is one
//! transaction and the engines never hold two. The connection is opened in WAL
//! mode with foreign keys enforced, since attachment and reaction rows reference
//! their message. Server databases get a small pool.

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

#[cfg(feature = "sqlite")]
use sea_orm::sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};

/// How long a write waits on a locked SQLite file before the store's own retry
/// loop sees the error.
pub const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool size for PostgreSQL archives.
pub const MAX_POOL_CONNECTIONS: u32 = 8;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Matches both file URLs (`sqlite://...`) and `sqlite::memory:`.
fn is_sqlite(database_url: &str) -> bool {
    database_url.starts_with("sqlite:")
}

/// Pool settings for an archive at `database_url`.
fn connect_options(database_url: &str) -> ConnectOptions {
    let mut options = ConnectOptions::new(database_url);
    // A backfill issues several statements per message; statement logging would
    // drown the sync's own output.
    options
        .sqlx_logging(false)
        .connect_timeout(CONNECT_TIMEOUT);

    if is_sqlite(database_url) {
        options.max_connections(1);
        #[cfg(feature = "sqlite")]
        options.map_sqlx_sqlite_opts(archive_sqlite_options);
    } else {
        options.max_connections(MAX_POOL_CONNECTIONS);
    }
    options
}

#[cfg(feature = "sqlite")]
fn archive_sqlite_options(options: SqliteConnectOptions) -> SqliteConnectOptions {
    options
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(SQLITE_BUSY_TIMEOUT)
        .foreign_keys(true)
}

/// Open the archive at `database_url` (e.g. `sqlite://archive.db?mode=rwc` or
/// `postgres:///archivist`) without touching its schema.
///
/// # Errors
/// Returns `DbErr` if the URL is not understood or the database is unreachable.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(connect_options(database_url)).await
}

/// Open the archive and bring its schema up to date. Every sync opens the
/// archive this way.
///
/// # Errors
/// Returns `DbErr` if the connection cannot be established or a migration fails.
#[cfg(feature = "migrate")]
pub async fn connect_and_migrate(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    use sea_orm_migration::MigratorTrait;

    let db = connect(database_url).await?;
    crate::migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_archive_uses_single_connection() {
        for url in ["sqlite://archive.db?mode=rwc", "sqlite::memory:"] {
            let options = connect_options(url);
            assert_eq!(options.get_max_connections(), Some(1), "{url}");
            assert!(!options.get_sqlx_logging());
            assert_eq!(options.get_connect_timeout(), Some(CONNECT_TIMEOUT));
        }
    }

    #[test]
    fn test_server_archive_is_pooled() {
        let options = connect_options("postgres:///archivist");
        assert_eq!(options.get_max_connections(), Some(MAX_POOL_CONNECTIONS));
        assert_eq!(options.get_url(), "postgres:///archivist");
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_sqlite_connection_enforces_foreign_keys_and_busy_timeout() {
        use sea_orm::{ConnectionTrait, Statement};

        let db = connect("sqlite::memory:").await.expect("connect");
        let pragma = |name: &str| {
            Statement::from_string(db.get_database_backend(), format!("PRAGMA {name}"))
        };

        let foreign_keys = db
            .query_one(pragma("foreign_keys"))
            .await
            .expect("query")
            .expect("row");
        assert_eq!(foreign_keys.try_get_by_index::<i32>(0).expect("value"), 1);

        let busy_timeout = db
            .query_one(pragma("busy_timeout"))
            .await
            .expect("query")
            .expect("row");
        assert_eq!(
            busy_timeout.try_get_by_index::<i64>(0).expect("value"),
            i64::try_from(SQLITE_BUSY_TIMEOUT.as_millis()).expect("fits")
        );
    }

    #[tokio::test]
    async fn test_connect_rejects_unknown_scheme() {
        let err = connect("this-is-not-a-db-url")
            .await
            .expect_err("invalid URL should error");
        assert!(!err.to_string().is_empty());
    }
}
