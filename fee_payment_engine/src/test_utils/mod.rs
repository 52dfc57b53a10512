//! Helpers for standing up a throwaway, fully migrated database. Used by the integration tests and local
//! tooling; not part of the production flow.
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::SqliteDatabase;

/// A unique database URL for a throwaway test database.
///
/// Prefers a `tmpfs` mount (`/dev/shm`) when one is present: SQLite's default WAL journal keeps its
/// shared-memory index in an mmap'd `-shm` file, and on networked/virtio filesystems (9p, NFS) that mapping
/// is not coherent across connections, so a write committed on one pooled connection is not reliably visible
/// to a read on another. A local `tmpfs` supports the mapping; elsewhere we fall back to the system temp dir.
pub fn random_db_path() -> String {
    let dir = {
        let shm = std::path::Path::new("/dev/shm");
        if shm.is_dir() {
            shm.to_path_buf()
        } else {
            std::env::temp_dir()
        }
    };
    let path = dir.join(format!("fee_store_test_{}.db", rand::random::<u64>()));
    format!("sqlite://{}", path.display())
}

/// Create (or recreate) the database at `url`, run migrations, and hand back a ready store.
pub async fn prepare_test_env(url: &str) -> SqliteDatabase {
    if let Err(e) = Sqlite::drop_database(url).await {
        trace!("Nothing to drop at {url}: {e:?}");
    }
    Sqlite::create_database(url).await.expect("Error creating database");
    info!("Created Sqlite database {url}");
    let db = SqliteDatabase::new_with_url(url, 5).await.expect("Error creating connection to database");
    db.run_migrations().await.expect("Error running DB migrations");
    db
}
