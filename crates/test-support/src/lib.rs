//! Disposable Postgres for integration tests.
//!
//! One container per test binary: started on first use, torn down when the
//! process exits. The first caller supplies the DDL for that binary's
//! schema; every caller gets its own fresh pool. Clearing tables between
//! tests stays with the caller, since only it knows its table names.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use testcontainers::{ContainerAsync, ImageExt, core::IntoContainerPort, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct SharedPostgres {
    // Held for the whole test run; dropping it would stop the database
    // underneath the open pools.
    _container: ContainerAsync<Postgres>,
    url: String,
}

static SHARED: OnceCell<Arc<SharedPostgres>> = OnceCell::const_new();
static CONTAINER_ID: OnceLock<String> = OnceLock::new();

// An exit hook cannot run async shutdown, so the container is removed
// through the docker CLI instead.
#[ctor::dtor]
fn remove_container() {
    if let Some(id) = CONTAINER_ID.get() {
        let _ = std::process::Command::new("docker")
            .args(["rm", "-f", id])
            .output();
    }
}

async fn shared(schema_sql: &str) -> Arc<SharedPostgres> {
    SHARED
        .get_or_init(|| async {
            let container = Postgres::default()
                .with_tag("18-alpine")
                .start()
                .await
                .expect("postgres container failed to start");
            let _ = CONTAINER_ID.set(container.id().to_string());

            let host = container.get_host().await.expect("container host");
            let port = container
                .get_host_port_ipv4(5432.tcp())
                .await
                .expect("container port");
            let url = format!("postgres://postgres:postgres@{host}:{port}/postgres");

            let pool = PgPool::connect(&url)
                .await
                .expect("connect for schema setup");
            sqlx::raw_sql(schema_sql)
                .execute(&pool)
                .await
                .expect("apply test schema");
            pool.close().await;

            Arc::new(SharedPostgres {
                _container: container,
                url,
            })
        })
        .await
        .clone()
}

/// A fresh pool against the shared test database.
///
/// The first call in a test binary starts the container and applies
/// `schema_sql`; later calls reuse both and only open a new pool.
pub async fn pool_with_schema(schema_sql: &str) -> PgPool {
    let database = shared(schema_sql).await;
    PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&database.url)
        .await
        .expect("connect to test database")
}
