//! Schema provisioning against a live MySQL/MariaDB server.
//!
//! Runs only when `OI_TEST_MYSQL_HOST` is set, e.g.
//! `OI_TEST_MYSQL_HOST=127.0.0.1 OI_TEST_MYSQL_PASSWORD=mypass cargo test -p oi-persistence`.

use oi_core::{HistoricalSample, OpenInterest, Symbol};
use oi_persistence::{HistoryStore, MySqlStore, StoreSettings};
use rust_decimal_macros::dec;

fn settings() -> Option<StoreSettings> {
    let host = std::env::var("OI_TEST_MYSQL_HOST").ok()?;
    let var = |name: &str, default: &str| std::env::var(name).unwrap_or_else(|_| default.to_string());
    Some(StoreSettings {
        host,
        port: var("OI_TEST_MYSQL_PORT", "3306").parse().ok()?,
        user: var("OI_TEST_MYSQL_USER", "myuser"),
        password: var("OI_TEST_MYSQL_PASSWORD", "mypass"),
        database: var("OI_TEST_MYSQL_DATABASE", "open_interest_test"),
        max_connections: 2,
    })
}

#[tokio::test]
async fn test_provision_twice_keeps_unique_key() {
    let Some(settings) = settings() else {
        eprintln!("OI_TEST_MYSQL_HOST not set, skipping");
        return;
    };
    let store = MySqlStore::connect(settings).await.unwrap();

    store.provision_schema().await.unwrap();
    store.provision_schema().await.unwrap();

    let symbol = Symbol::new("SCHEMATEST").unwrap();
    let sample = HistoricalSample::new(
        symbol.clone(),
        1_700_000_000_000,
        OpenInterest::new(dec!(1.5)),
        OpenInterest::new(dec!(2.5)),
    );
    store.save_history(&symbol, &[sample.clone()]).await.unwrap();
    let again = store.save_history(&symbol, &[sample]).await.unwrap();
    assert_eq!(again.inserted, 0);
    assert_eq!(again.failed, 0);

    let key_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.statistics \
         WHERE table_schema = DATABASE() AND table_name = 'open_interest_history' \
         AND index_name = 'idx_symbol_timestamp' AND non_unique = 0",
    )
    .fetch_one(store.pool())
    .await
    .unwrap();
    assert_eq!(key_count, 2);

    store.close().await;
}
