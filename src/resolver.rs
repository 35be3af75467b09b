//! Game state derived from the ledger.
//!
//! Nothing here is cached: every call re-reads the ledger through the
//! caller's transaction, so the answer is consistent with whatever that
//! transaction is about to write.
use crate::codec;
use crate::error::AppResult;
use crate::repo::{LedgerTx, VoteRecord};
use crate::types::{Phase, Tally, Team};
use std::str::FromStr;

pub async fn governing_doctor_vote(tx: &mut dyn LedgerTx) -> AppResult<Option<VoteRecord>> {
    tx.governing_doctor_vote().await
}

pub async fn current_phase(tx: &mut dyn LedgerTx) -> AppResult<Phase> {
    let governing = tx.governing_doctor_vote().await?;
    Ok(Phase::from_governing_vote(governing.map(|v| v.revealed)))
}

/// Counts every vote not cast with the doctor key. Doctor votes are filtered
/// out by the store before any value is decoded.
pub async fn tally(tx: &mut dyn LedgerTx, secret: &str) -> AppResult<Tally> {
    let mut tally = Tally::default();
    for stored in tx.public_vote_teams().await? {
        if let Ok(team) = Team::from_str(&codec::decode(&stored, secret)) {
            tally.add(team);
        }
    }
    Ok(tally)
}

pub async fn final_result(tx: &mut dyn LedgerTx, secret: &str) -> AppResult<Option<String>> {
    Ok(tx
        .governing_doctor_vote()
        .await?
        .filter(|v| v.revealed)
        .map(|v| codec::decode(&v.team, secret)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{self, KeySeed};
    use crate::repo::{InMemoryStore, NewVote, RevealStore};

    const SECRET: &str = "test-secret";

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::default();
        registry::seed_keys(&store, &KeySeed::default())
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn voting_until_doctor_vote_revealed() {
        let store = seeded().await;
        let mut tx = store.begin().await.unwrap();
        assert_eq!(current_phase(tx.as_mut()).await.unwrap(), Phase::Voting);

        let doctor = registry::lookup(tx.as_mut(), "DOCTOR999").await.unwrap();
        let encoded = codec::encode("girl", SECRET);
        let vote = tx
            .insert_vote(NewVote {
                team: &encoded,
                key_id: Some(doctor.id),
            })
            .await
            .unwrap();
        assert_eq!(current_phase(tx.as_mut()).await.unwrap(), Phase::Voting);
        assert_eq!(final_result(tx.as_mut(), SECRET).await.unwrap(), None);

        tx.mark_vote_revealed(vote.id).await.unwrap();
        assert_eq!(current_phase(tx.as_mut()).await.unwrap(), Phase::Ended);
        assert_eq!(
            final_result(tx.as_mut(), SECRET).await.unwrap().as_deref(),
            Some("girl")
        );
    }

    #[tokio::test]
    async fn earliest_doctor_vote_governs() {
        let store = seeded().await;
        let mut tx = store.begin().await.unwrap();
        let doctor = registry::lookup(tx.as_mut(), "DOCTOR999").await.unwrap();
        let first_enc = codec::encode("boy", SECRET);
        let second_enc = codec::encode("girl", SECRET);
        let first = tx
            .insert_vote(NewVote {
                team: &first_enc,
                key_id: Some(doctor.id),
            })
            .await
            .unwrap();
        let second = tx
            .insert_vote(NewVote {
                team: &second_enc,
                key_id: Some(doctor.id),
            })
            .await
            .unwrap();

        // Revealing a later doctor vote does not end the game.
        tx.mark_vote_revealed(second.id).await.unwrap();
        assert_eq!(current_phase(tx.as_mut()).await.unwrap(), Phase::Voting);

        tx.mark_vote_revealed(first.id).await.unwrap();
        let governing = governing_doctor_vote(tx.as_mut()).await.unwrap().unwrap();
        assert_eq!(governing.id, first.id);
        assert_eq!(
            final_result(tx.as_mut(), SECRET).await.unwrap().as_deref(),
            Some("boy")
        );
    }

    #[tokio::test]
    async fn tally_skips_doctor_and_unknown_values() {
        let store = seeded().await;
        {
            let mut tx = store.begin().await.unwrap();
            let doctor = registry::lookup(tx.as_mut(), "DOCTOR999").await.unwrap();
            let user = registry::lookup(tx.as_mut(), "USER001").await.unwrap();
            tx.insert_vote(NewVote {
                team: "boy",
                key_id: Some(user.id),
            })
            .await
            .unwrap();
            // A plain label from the doctor is still excluded by role.
            tx.insert_vote(NewVote {
                team: "girl",
                key_id: Some(doctor.id),
            })
            .await
            .unwrap();
            tx.commit().await.unwrap();
        }
        store.insert_raw_vote("girl", None).await;
        store.insert_raw_vote("maybe", None).await;

        let mut tx = store.begin().await.unwrap();
        let counts = tally(tx.as_mut(), SECRET).await.unwrap();
        assert_eq!(counts.boy, 1);
        assert_eq!(counts.girl, 1);
        assert_eq!(counts.total(), 2);
    }
}
