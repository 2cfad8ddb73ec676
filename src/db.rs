use std::time::Duration;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema};
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::entities;

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Establishes a connection pool from the application configuration.
pub async fn establish_connection(cfg: &AppConfig) -> Result<DbPool, DbErr> {
    let mut opt = ConnectOptions::new(cfg.database_url.clone());
    opt.max_connections(cfg.db_max_connections)
        .min_connections(cfg.db_min_connections)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(false);

    debug!(url = %cfg.database_url, "connecting to database");
    let pool = Database::connect(opt).await?;
    info!("database connection established");
    Ok(pool)
}

/// Creates any missing tables from the entity definitions.
///
/// Idempotent; used on startup when `auto_migrate` is set and by the test
/// harness against in-memory SQLite.
pub async fn run_migrations(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    macro_rules! create_table {
        ($entity:expr) => {{
            let mut stmt = schema.create_table_from_entity($entity);
            stmt.if_not_exists();
            db.execute(backend.build(&stmt)).await?;
        }};
    }

    create_table!(entities::product::Entity);
    create_table!(entities::cart::Entity);
    create_table!(entities::cart_item::Entity);
    create_table!(entities::payment_method::Entity);
    create_table!(entities::order::Entity);
    create_table!(entities::order_item::Entity);
    create_table!(entities::payment_transaction::Entity);
    create_table!(entities::wishlist_item::Entity);

    info!("database schema is up to date");
    Ok(())
}
