//! The four operations exposed at the boundary.
//!
//! Each one runs inside a single store transaction: the phase and key
//! checks read the same state the writes land on, and an error anywhere
//! drops the transaction with nothing committed.
use crate::codec;
use crate::error::{AppError, AppResult};
use crate::registry;
use crate::repo::{LedgerTx, NewVote, RevealStore};
use crate::resolver;
use crate::types::{
    CastVoteResponse, Phase, RevealResponse, StatsResponse, Team, ValidateAccessResponse,
    VoteStatus,
};
use std::str::FromStr;
use tracing::{debug, info};

pub async fn validate_access<S>(store: &S, code: &str) -> AppResult<ValidateAccessResponse>
where
    S: RevealStore + ?Sized,
{
    let mut tx = store.begin().await?;
    let key = registry::lookup(tx.as_mut(), code).await?;
    debug!(key_id = key.id, "access key validated");
    Ok(ValidateAccessResponse {
        valid: true,
        is_admin: key.is_admin,
        is_doctor: key.is_doctor,
        has_voted: key.is_used,
        error: None,
    })
}

pub async fn cast_vote<S>(
    store: &S,
    code: &str,
    label: &str,
    secret: &str,
) -> AppResult<CastVoteResponse>
where
    S: RevealStore + ?Sized,
{
    let team = Team::from_str(label)
        .map_err(|_| AppError::Validation(format!("invalid team: {label:?}")))?;

    let mut tx = store.begin().await?;
    let key = registry::lookup(tx.as_mut(), code).await?;
    if resolver::current_phase(tx.as_mut()).await? == Phase::Ended {
        return Err(AppError::VotingEnded);
    }
    if !key.is_admin && key.is_used {
        return Err(AppError::AlreadyVoted);
    }

    let stored = if key.is_doctor {
        codec::encode(team.as_str(), secret)
    } else {
        team.as_str().to_string()
    };
    let vote = tx
        .insert_vote(NewVote {
            team: &stored,
            key_id: Some(key.id),
        })
        .await?;
    registry::mark_used(tx.as_mut(), &key).await?;
    tx.commit().await?;

    if key.is_doctor {
        info!(vote_id = vote.id, "doctor vote recorded");
        Ok(CastVoteResponse {
            message: "Doctor's vote recorded. Waiting for the reveal!".to_string(),
            status: Some(VoteStatus::AwaitingReveal),
        })
    } else {
        debug!(vote_id = vote.id, key_id = key.id, %team, "vote recorded");
        Ok(CastVoteResponse {
            message: "Vote received!".to_string(),
            status: None,
        })
    }
}

/// Ends the game by revealing the governing doctor vote. Calling it again
/// after the reveal reports the same result without writing anything.
pub async fn reveal<S>(store: &S, code: &str, secret: &str) -> AppResult<RevealResponse>
where
    S: RevealStore + ?Sized,
{
    let mut tx = store.begin().await?;
    let key = registry::lookup(tx.as_mut(), code).await?;
    if !key.is_admin {
        return Err(AppError::Forbidden("only admins can reveal".into()));
    }
    let vote = resolver::governing_doctor_vote(tx.as_mut())
        .await?
        .ok_or(AppError::NoDoctorVote)?;
    if !vote.revealed {
        tx.mark_vote_revealed(vote.id).await?;
        tx.commit().await?;
        info!(vote_id = vote.id, "doctor vote revealed, voting ended");
    } else {
        debug!(vote_id = vote.id, "doctor vote already revealed");
    }

    Ok(RevealResponse {
        message: "The doctor's vote has been revealed!".to_string(),
        status: Phase::Ended,
        final_result: codec::decode(&vote.team, secret),
    })
}

pub async fn stats<S>(store: &S, secret: &str) -> AppResult<StatsResponse>
where
    S: RevealStore + ?Sized,
{
    let mut tx = store.begin().await?;
    let tally = resolver::tally(tx.as_mut(), secret).await?;
    let status = resolver::current_phase(tx.as_mut()).await?;
    let final_result = resolver::final_result(tx.as_mut(), secret).await?;
    Ok(StatsResponse {
        boy: tally.boy,
        girl: tally.girl,
        total: tally.total(),
        status,
        final_result,
    })
}
