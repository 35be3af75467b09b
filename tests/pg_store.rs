//! Runs against a real Postgres when `TEST_DATABASE_URL` is set; the tests
//! return early otherwise. The database is wiped before each scenario, so point
//! it at a throwaway instance.
use reveal_backend::error::AppError;
use reveal_backend::game;
use reveal_backend::registry::{seed_keys, KeySeed};
use reveal_backend::repo::PgStore;
use reveal_backend::Phase;
use std::sync::Arc;

const SECRET: &str = "pg-secret";

async fn reset_schema(url: &str) {
    let pool = sqlx::PgPool::connect(url).await.expect("connect");
    sqlx::query("DROP TABLE IF EXISTS votes, access_keys, schema_migrations")
        .execute(&pool)
        .await
        .expect("reset schema");
    pool.close().await;
}

async fn fresh_store() -> Option<PgStore> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    reset_schema(&url).await;
    let store = PgStore::connect(&url, 8).await.expect("store");
    seed_keys(&store, &KeySeed::default()).await.expect("seed");
    Some(store)
}

// One test drives both scenarios so they never share the database at once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn postgres_store() {
    let Some(store) = fresh_store().await else {
        return;
    };
    concurrent_votes_with_one_key(Arc::new(store)).await;

    let Some(store) = fresh_store().await else {
        return;
    };
    full_game(store).await;

    replicas_migrate_an_empty_database_together().await;
}

async fn replicas_migrate_an_empty_database_together() {
    let url = std::env::var("TEST_DATABASE_URL").unwrap();
    reset_schema(&url).await;

    let mut handles = Vec::new();
    for _ in 0..4 {
        let url = url.clone();
        handles.push(tokio::spawn(async move {
            let store = PgStore::connect(&url, 2).await?;
            seed_keys(&store, &KeySeed::default()).await?;
            Ok::<_, AppError>(store)
        }));
    }
    let mut stores = Vec::new();
    for handle in handles {
        stores.push(handle.await.unwrap().expect("replica startup"));
    }

    let access = game::validate_access(&stores[0], "DOCTOR999").await.unwrap();
    assert!(access.is_doctor);
    let stats = game::stats(&stores[3], SECRET).await.unwrap();
    assert_eq!((stats.total, stats.status), (0, Phase::Voting));
}

async fn full_game(store: PgStore) {
    game::cast_vote(&store, "USER001", "boy", SECRET)
        .await
        .unwrap();
    game::cast_vote(&store, "DOCTOR999", "girl", SECRET)
        .await
        .unwrap();
    let stats = game::stats(&store, SECRET).await.unwrap();
    assert_eq!((stats.boy, stats.girl, stats.total), (1, 0, 1));
    assert_eq!(stats.status, Phase::Voting);

    let revealed = game::reveal(&store, "ADMIN123", SECRET).await.unwrap();
    assert_eq!(revealed.final_result, "girl");

    let err = game::cast_vote(&store, "USER002", "girl", SECRET)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::VotingEnded));

    // Reconnecting re-runs migrations and seeding without touching data.
    let url = std::env::var("TEST_DATABASE_URL").unwrap();
    let again = PgStore::connect(&url, 2).await.unwrap();
    seed_keys(&again, &KeySeed::default()).await.unwrap();
    let stats = game::stats(&again, SECRET).await.unwrap();
    assert_eq!(stats.status, Phase::Ended);
    assert_eq!(stats.final_result.as_deref(), Some("girl"));
}

async fn concurrent_votes_with_one_key(store: Arc<PgStore>) {
    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            game::cast_vote(store.as_ref(), "USER002", "boy", SECRET).await
        }));
    }
    let mut ok = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            ok += 1;
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(game::stats(store.as_ref(), SECRET).await.unwrap().boy, 1);
}
