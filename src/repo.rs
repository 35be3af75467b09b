use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres, Transaction};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

/// Advisory lock key shared by every transaction touching the game.
const GAME_LOCK_ID: i64 = 0x5245_5645_414c;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AccessKey {
    pub id: i64,
    pub code: String,
    pub is_used: bool,
    pub is_admin: bool,
    pub is_doctor: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct NewAccessKey<'a> {
    pub code: &'a str,
    pub is_admin: bool,
    pub is_doctor: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct VoteRecord {
    pub id: i64,
    pub team: String,
    pub key_id: Option<i64>,
    pub revealed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct NewVote<'a> {
    /// Stored form: plain label, or the encoded label for doctor votes.
    pub team: &'a str,
    pub key_id: Option<i64>,
}

/// One unit of work against the registry and the ledger.
///
/// Nothing is persisted until `commit`; dropping the transaction discards
/// every change made through it.
#[async_trait]
pub trait LedgerTx: Send {
    async fn find_key(&mut self, code: &str) -> AppResult<Option<AccessKey>>;
    async fn count_keys(&mut self) -> AppResult<i64>;
    async fn has_doctor_key(&mut self) -> AppResult<bool>;
    async fn insert_key(&mut self, key: NewAccessKey<'_>) -> AppResult<AccessKey>;
    async fn mark_key_used(&mut self, key_id: i64) -> AppResult<()>;
    async fn insert_vote(&mut self, vote: NewVote<'_>) -> AppResult<VoteRecord>;
    /// Earliest vote cast with a doctor key.
    async fn governing_doctor_vote(&mut self) -> AppResult<Option<VoteRecord>>;
    async fn mark_vote_revealed(&mut self, vote_id: i64) -> AppResult<()>;
    /// Stored `team` values of every vote not cast with a doctor key,
    /// key-less legacy votes included.
    async fn public_vote_teams(&mut self) -> AppResult<Vec<String>>;
    /// Persists the changes and releases the store.
    async fn commit(self: Box<Self>) -> AppResult<()>;
}

#[async_trait]
pub trait RevealStore: Send + Sync {
    /// Opens a transaction that is serialized against every other
    /// transaction on the same store.
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>>;
}

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub async fn connect(url: &str, max_connections: u32) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(AppError::Db)?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl RevealStore for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let tx = begin_locked(&self.pool).await?;
        Ok(Box::new(PgLedger { tx }))
    }
}

pub struct PgLedger {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgLedger {
    async fn find_key(&mut self, code: &str) -> AppResult<Option<AccessKey>> {
        let tx = &mut self.tx;
        sqlx::query_as::<_, AccessKey>(
            r#"
            SELECT id, code, is_used, is_admin, is_doctor
            FROM access_keys
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::Db)
    }

    async fn count_keys(&mut self) -> AppResult<i64> {
        let tx = &mut self.tx;
        sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*)::BIGINT FROM access_keys"#)
            .fetch_one(&mut **tx)
            .await
            .map_err(AppError::Db)
    }

    async fn has_doctor_key(&mut self) -> AppResult<bool> {
        let tx = &mut self.tx;
        let row = sqlx::query_scalar::<_, i32>(
            r#"SELECT 1 FROM access_keys WHERE is_doctor = true LIMIT 1"#,
        )
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::Db)?;
        Ok(row.is_some())
    }

    async fn insert_key(&mut self, key: NewAccessKey<'_>) -> AppResult<AccessKey> {
        let tx = &mut self.tx;
        sqlx::query_as::<_, AccessKey>(
            r#"
            INSERT INTO access_keys (code, is_admin, is_doctor)
            VALUES ($1, $2, $3)
            RETURNING id, code, is_used, is_admin, is_doctor
            "#,
        )
        .bind(key.code)
        .bind(key.is_admin)
        .bind(key.is_doctor)
        .fetch_one(&mut **tx)
        .await
        .map_err(AppError::Db)
    }

    async fn mark_key_used(&mut self, key_id: i64) -> AppResult<()> {
        let tx = &mut self.tx;
        sqlx::query(r#"UPDATE access_keys SET is_used = true WHERE id = $1"#)
            .bind(key_id)
            .execute(&mut **tx)
            .await
            .map_err(AppError::Db)?;
        Ok(())
    }

    async fn insert_vote(&mut self, vote: NewVote<'_>) -> AppResult<VoteRecord> {
        let tx = &mut self.tx;
        sqlx::query_as::<_, VoteRecord>(
            r#"
            INSERT INTO votes (team, key_id)
            VALUES ($1, $2)
            RETURNING id, team, key_id, revealed, created_at
            "#,
        )
        .bind(vote.team)
        .bind(vote.key_id)
        .fetch_one(&mut **tx)
        .await
        .map_err(AppError::Db)
    }

    async fn governing_doctor_vote(&mut self) -> AppResult<Option<VoteRecord>> {
        let tx = &mut self.tx;
        sqlx::query_as::<_, VoteRecord>(
            r#"
            SELECT v.id, v.team, v.key_id, v.revealed, v.created_at
            FROM votes v
            JOIN access_keys k ON k.id = v.key_id
            WHERE k.is_doctor = true
            ORDER BY v.id
            LIMIT 1
            "#,
        )
        .fetch_optional(&mut **tx)
        .await
        .map_err(AppError::Db)
    }

    async fn mark_vote_revealed(&mut self, vote_id: i64) -> AppResult<()> {
        let tx = &mut self.tx;
        sqlx::query(r#"UPDATE votes SET revealed = true WHERE id = $1"#)
            .bind(vote_id)
            .execute(&mut **tx)
            .await
            .map_err(AppError::Db)?;
        Ok(())
    }

    async fn public_vote_teams(&mut self) -> AppResult<Vec<String>> {
        let tx = &mut self.tx;
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT v.team
            FROM votes v
            LEFT JOIN access_keys k ON k.id = v.key_id
            WHERE COALESCE(k.is_doctor, false) = false
            ORDER BY v.id
            "#,
        )
        .fetch_all(&mut **tx)
        .await
        .map_err(AppError::Db)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await.map_err(AppError::Db)
    }
}

/// Ordered schema history. Versions are applied once and never edited;
/// changes go in as a new version with additive, defaulted columns so rows
/// written under an older layout stay readable.
const MIGRATIONS: &[(i32, &str, &[&str])] = &[
    (
        1,
        "access keys and votes",
        &[
            r#"
            CREATE TABLE IF NOT EXISTS access_keys (
                id BIGSERIAL PRIMARY KEY,
                code TEXT NOT NULL UNIQUE,
                is_used BOOLEAN NOT NULL DEFAULT false,
                is_admin BOOLEAN NOT NULL DEFAULT false
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS votes (
                id BIGSERIAL PRIMARY KEY,
                team TEXT NOT NULL
            )
            "#,
        ],
    ),
    (
        2,
        "doctor role",
        &[r#"
            ALTER TABLE access_keys
            ADD COLUMN IF NOT EXISTS is_doctor BOOLEAN NOT NULL DEFAULT false
            "#],
    ),
    (
        3,
        "vote ownership and reveal flag",
        &[
            r#"
            ALTER TABLE votes
            ADD COLUMN IF NOT EXISTS key_id BIGINT REFERENCES access_keys(id)
            "#,
            r#"
            ALTER TABLE votes
            ADD COLUMN IF NOT EXISTS revealed BOOLEAN NOT NULL DEFAULT false
            "#,
            r#"
            ALTER TABLE votes
            ADD COLUMN IF NOT EXISTS created_at TIMESTAMPTZ NOT NULL DEFAULT now()
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS votes_key_id_idx ON votes(key_id)
            "#,
        ],
    ),
];

/// Opens a pool transaction holding the game lock.
async fn begin_locked(pool: &Pool<Postgres>) -> AppResult<Transaction<'static, Postgres>> {
    let mut tx = pool.begin().await.map_err(AppError::Db)?;
    sqlx::query("SELECT pg_advisory_xact_lock($1)")
        .bind(GAME_LOCK_ID)
        .execute(&mut *tx)
        .await
        .map_err(AppError::Db)?;
    Ok(tx)
}

async fn run_migrations(pool: &Pool<Postgres>) -> AppResult<()> {
    // Concurrent replicas starting together wait on the lock instead of racing,
    // including for the history table itself.
    let mut tx = begin_locked(pool).await?;
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(&mut *tx)
    .await
    .map_err(AppError::Db)?;
    tx.commit().await.map_err(AppError::Db)?;

    for &(version, description, statements) in MIGRATIONS {
        let mut tx = begin_locked(pool).await?;
        let applied = sqlx::query_scalar::<_, i32>(
            r#"SELECT 1 FROM schema_migrations WHERE version = $1"#,
        )
        .bind(version)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::Db)?;
        if applied.is_some() {
            continue;
        }
        for statement in statements {
            sqlx::query(statement)
                .execute(&mut *tx)
                .await
                .map_err(AppError::Db)?;
        }
        sqlx::query(r#"INSERT INTO schema_migrations (version, description) VALUES ($1, $2)"#)
            .bind(version)
            .bind(description)
            .execute(&mut *tx)
            .await
            .map_err(AppError::Db)?;
        tx.commit().await.map_err(AppError::Db)?;
        info!(version, description, "applied schema migration");
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
struct MemState {
    keys: Vec<AccessKey>,
    votes: Vec<VoteRecord>,
}

/// Simple in-memory store for tests.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemState>>,
}

impl InMemoryStore {
    /// Test helper: inserts a vote row directly, bypassing every game rule.
    /// Used to model rows written by older releases.
    pub async fn insert_raw_vote(&self, team: &str, key_id: Option<i64>) -> VoteRecord {
        let mut state = self.state.lock().await;
        let record = VoteRecord {
            id: state.votes.len() as i64 + 1,
            team: team.to_string(),
            key_id,
            revealed: false,
            created_at: Utc::now(),
        };
        state.votes.push(record.clone());
        record
    }

    pub async fn votes(&self) -> Vec<VoteRecord> {
        self.state.lock().await.votes.clone()
    }

    pub async fn keys(&self) -> Vec<AccessKey> {
        self.state.lock().await.keys.clone()
    }
}

#[async_trait]
impl RevealStore for InMemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn LedgerTx>> {
        let guard = self.state.clone().lock_owned().await;
        let work = (*guard).clone();
        Ok(Box::new(MemLedger { guard, work }))
    }
}

pub struct MemLedger {
    guard: OwnedMutexGuard<MemState>,
    work: MemState,
}

impl MemLedger {
    fn is_doctor_key(&self, key_id: Option<i64>) -> bool {
        key_id
            .and_then(|id| self.work.keys.iter().find(|k| k.id == id))
            .map(|k| k.is_doctor)
            .unwrap_or(false)
    }
}

#[async_trait]
impl LedgerTx for MemLedger {
    async fn find_key(&mut self, code: &str) -> AppResult<Option<AccessKey>> {
        Ok(self.work.keys.iter().find(|k| k.code == code).cloned())
    }

    async fn count_keys(&mut self) -> AppResult<i64> {
        Ok(self.work.keys.len() as i64)
    }

    async fn has_doctor_key(&mut self) -> AppResult<bool> {
        Ok(self.work.keys.iter().any(|k| k.is_doctor))
    }

    async fn insert_key(&mut self, key: NewAccessKey<'_>) -> AppResult<AccessKey> {
        if self.work.keys.iter().any(|k| k.code == key.code) {
            return Err(AppError::Validation(format!(
                "access key {} already exists",
                key.code
            )));
        }
        let record = AccessKey {
            id: self.work.keys.len() as i64 + 1,
            code: key.code.to_string(),
            is_used: false,
            is_admin: key.is_admin,
            is_doctor: key.is_doctor,
        };
        self.work.keys.push(record.clone());
        Ok(record)
    }

    async fn mark_key_used(&mut self, key_id: i64) -> AppResult<()> {
        if let Some(k) = self.work.keys.iter_mut().find(|k| k.id == key_id) {
            k.is_used = true;
        }
        Ok(())
    }

    async fn insert_vote(&mut self, vote: NewVote<'_>) -> AppResult<VoteRecord> {
        let record = VoteRecord {
            id: self.work.votes.len() as i64 + 1,
            team: vote.team.to_string(),
            key_id: vote.key_id,
            revealed: false,
            created_at: Utc::now(),
        };
        self.work.votes.push(record.clone());
        Ok(record)
    }

    async fn governing_doctor_vote(&mut self) -> AppResult<Option<VoteRecord>> {
        Ok(self
            .work
            .votes
            .iter()
            .filter(|v| self.is_doctor_key(v.key_id))
            .min_by_key(|v| v.id)
            .cloned())
    }

    async fn mark_vote_revealed(&mut self, vote_id: i64) -> AppResult<()> {
        if let Some(v) = self.work.votes.iter_mut().find(|v| v.id == vote_id) {
            v.revealed = true;
        }
        Ok(())
    }

    async fn public_vote_teams(&mut self) -> AppResult<Vec<String>> {
        Ok(self
            .work
            .votes
            .iter()
            .filter(|v| !self.is_doctor_key(v.key_id))
            .map(|v| v.team.clone())
            .collect())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemLedger { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}
