use crate::error::{AppError, AppResult};
use crate::repo::{AccessKey, LedgerTx, NewAccessKey, RevealStore};
use tracing::info;

/// Codes inserted when the registry is first initialized.
#[derive(Debug, Clone)]
pub struct KeySeed {
    pub admin: String,
    pub doctor: String,
    pub users: Vec<String>,
}

impl Default for KeySeed {
    fn default() -> Self {
        Self {
            admin: "ADMIN123".to_string(),
            doctor: "DOCTOR999".to_string(),
            users: vec![
                "USER001".to_string(),
                "USER002".to_string(),
                "USER003".to_string(),
            ],
        }
    }
}

pub async fn lookup(tx: &mut dyn LedgerTx, code: &str) -> AppResult<AccessKey> {
    tx.find_key(code).await?.ok_or(AppError::UnknownKey)
}

/// Consumes the single vote of a non-admin key. Admin keys are never marked.
pub async fn mark_used(tx: &mut dyn LedgerTx, key: &AccessKey) -> AppResult<()> {
    if key.is_admin {
        return Ok(());
    }
    tx.mark_key_used(key.id).await
}

/// Populates an empty registry, or adds the doctor key to one created
/// before the doctor role existed.
pub async fn seed_keys<S>(store: &S, seed: &KeySeed) -> AppResult<()>
where
    S: RevealStore + ?Sized,
{
    let mut tx = store.begin().await?;
    if tx.count_keys().await? == 0 {
        tx.insert_key(NewAccessKey {
            code: &seed.admin,
            is_admin: true,
            is_doctor: false,
        })
        .await?;
        tx.insert_key(NewAccessKey {
            code: &seed.doctor,
            is_admin: false,
            is_doctor: true,
        })
        .await?;
        for code in &seed.users {
            tx.insert_key(NewAccessKey {
                code,
                is_admin: false,
                is_doctor: false,
            })
            .await?;
        }
        tx.commit().await?;
        info!(users = seed.users.len(), "seeded access keys");
        return Ok(());
    }
    if !tx.has_doctor_key().await? {
        tx.insert_key(NewAccessKey {
            code: &seed.doctor,
            is_admin: false,
            is_doctor: true,
        })
        .await?;
        tx.commit().await?;
        info!("added missing doctor key");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::InMemoryStore;

    #[tokio::test]
    async fn seeds_empty_registry_once() {
        let store = InMemoryStore::default();
        let seed = KeySeed::default();
        seed_keys(&store, &seed).await.unwrap();
        seed_keys(&store, &seed).await.unwrap();

        let keys = store.keys().await;
        assert_eq!(keys.len(), 5);
        assert_eq!(keys.iter().filter(|k| k.is_admin).count(), 1);
        assert_eq!(keys.iter().filter(|k| k.is_doctor).count(), 1);
        assert!(keys.iter().all(|k| !k.is_used));
    }

    #[tokio::test]
    async fn adds_doctor_to_registry_without_one() {
        let store = InMemoryStore::default();
        {
            let mut tx = store.begin().await.unwrap();
            tx.insert_key(NewAccessKey {
                code: "ADMIN123",
                is_admin: true,
                is_doctor: false,
            })
            .await
            .unwrap();
            tx.commit().await.unwrap();
        }
        seed_keys(&store, &KeySeed::default()).await.unwrap();

        let keys = store.keys().await;
        assert_eq!(keys.len(), 2);
        let doctor = keys.iter().find(|k| k.is_doctor).unwrap();
        assert_eq!(doctor.code, "DOCTOR999");
    }

    #[tokio::test]
    async fn lookup_unknown_code() {
        let store = InMemoryStore::default();
        let mut tx = store.begin().await.unwrap();
        let err = lookup(tx.as_mut(), "FAKE").await.unwrap_err();
        assert!(matches!(err, AppError::UnknownKey));
    }

    #[tokio::test]
    async fn admin_keys_are_never_marked_used() {
        let store = InMemoryStore::default();
        seed_keys(&store, &KeySeed::default()).await.unwrap();
        let mut tx = store.begin().await.unwrap();
        let admin = lookup(tx.as_mut(), "ADMIN123").await.unwrap();
        let user = lookup(tx.as_mut(), "USER001").await.unwrap();
        mark_used(tx.as_mut(), &admin).await.unwrap();
        mark_used(tx.as_mut(), &user).await.unwrap();
        tx.commit().await.unwrap();

        let keys = store.keys().await;
        assert!(!keys.iter().find(|k| k.code == "ADMIN123").unwrap().is_used);
        assert!(keys.iter().find(|k| k.code == "USER001").unwrap().is_used);
    }
}
