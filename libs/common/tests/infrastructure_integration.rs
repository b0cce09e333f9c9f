//! Integration tests for the infrastructure components
//!
//! These tests verify that the PostgreSQL database and Redis server the
//! services depend on are configured and reachable. They need live servers,
//! so they only run with `--ignored`.

use common::{
    cache::{RedisConfig, RedisPool},
    database::{DatabaseConfig, health_check, init_pool},
};
use sqlx::Row;

#[tokio::test]
#[ignore = "requires DATABASE_URL and REDIS_URL pointing at live servers"]
async fn test_infrastructure_integration() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;
    assert!(health_check(&pool).await?, "Database health check failed");

    let row = sqlx::query("SELECT 1 as result").fetch_one(&pool).await?;
    let result: i32 = row.get("result");
    assert_eq!(result, 1, "PostgreSQL simple query test failed");

    let redis_config = RedisConfig::from_env()?;
    let redis_pool = RedisPool::new(&redis_config).await?;
    assert!(
        redis_pool.health_check().await?,
        "Redis health check failed"
    );

    let stream = "integration_test_stream";
    let id = redis_pool
        .xadd(stream, 100, &[("key", "k"), ("payload", "{}")])
        .await?;
    assert!(!id.is_empty(), "Redis XADD returned no entry id");
    redis_pool.delete(stream).await?;

    Ok(())
}
