//! SQLite connection handling.

use diesel::sqlite::SqliteConnection;
use diesel_async::sync_connection_wrapper::SyncConnectionWrapper;
use diesel_async::{AsyncConnection, SimpleAsyncConnection};

use super::StoreError;

/// Async SQLite connection type.
pub type SqliteConn = SyncConnectionWrapper<SqliteConnection>;

/// Per-connection settings; writers wait up to 30 s for a lock.
const CONNECTION_PRAGMAS: &str = r#"
    PRAGMA busy_timeout = 30000;
    PRAGMA synchronous = NORMAL;
"#;

/// Opens one SQLite connection per operation.
#[derive(Debug, Clone)]
pub struct SqlitePool {
    database_url: String,
}

impl SqlitePool {
    /// Accepts a bare path or a `sqlite:`/`sqlite://` URL.
    pub fn new(database_url: &str) -> Self {
        let path = ["sqlite://", "sqlite:"]
            .iter()
            .find_map(|prefix| database_url.strip_prefix(prefix))
            .unwrap_or(database_url);
        Self {
            database_url: path.to_string(),
        }
    }

    pub async fn get(&self) -> Result<SqliteConn, StoreError> {
        let mut conn = SqliteConn::establish(&self.database_url)
            .await
            .map_err(|e| StoreError::Connection(format!("{}: {}", self.database_url, e)))?;
        conn.batch_execute(CONNECTION_PRAGMAS)
            .await
            .map_err(|e| StoreError::Connection(format!("{}: {}", self.database_url, e)))?;
        Ok(conn)
    }

    /// Path handed to SQLite, without any URL prefix.
    pub fn database_url(&self) -> &str {
        &self.database_url
    }
}

/// Run a block with a fresh connection bound to `$conn`.
///
/// ```ignore
/// with_conn!(self.pool, conn, {
///     areas::table.load::<AreaRow>(&mut conn).await
/// })
/// ```
macro_rules! with_conn {
    ($pool:expr, $conn:ident, $body:block) => {{
        #[allow(unused_mut)]
        let mut $conn = $pool.get().await?;
        $body
    }};
}

pub(crate) use with_conn;
