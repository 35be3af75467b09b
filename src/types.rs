use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the two choices a participant can vote for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Boy,
    Girl,
}

impl Team {
    pub fn as_str(self) -> &'static str {
        match self {
            Team::Boy => "boy",
            Team::Girl => "girl",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Team {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "boy" => Ok(Team::Boy),
            "girl" => Ok(Team::Girl),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Voting,
    Ended,
}

impl Phase {
    pub fn from_governing_vote(revealed: Option<bool>) -> Self {
        match revealed {
            Some(true) => Phase::Ended,
            _ => Phase::Voting,
        }
    }
}

/// Extra status attached to a successful doctor vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteStatus {
    AwaitingReveal,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub boy: i64,
    pub girl: i64,
}

impl Tally {
    pub fn add(&mut self, team: Team) {
        match team {
            Team::Boy => self.boy += 1,
            Team::Girl => self.girl += 1,
        }
    }

    pub fn total(&self) -> i64 {
        self.boy + self.girl
    }
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AccessRequest {
    pub access_key: String,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ValidateAccessResponse {
    pub valid: bool,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_doctor: bool,
    #[serde(default)]
    pub has_voted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CastVoteRequest {
    /// Raw label; anything other than `boy`/`girl` is rejected with 400.
    #[serde(alias = "vote")]
    pub team: String,
    pub access_key: String,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct CastVoteResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<VoteStatus>,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct RevealResponse {
    pub message: String,
    pub status: Phase,
    pub final_result: String,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct StatsResponse {
    pub boy: i64,
    pub girl: i64,
    pub total: i64,
    pub status: Phase,
    pub final_result: Option<String>,
}
