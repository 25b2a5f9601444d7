use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The on-chain (or off-chain) category a governance post belongs to.
///
/// Serialized in snake_case, which is also the form used inside search
/// record identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalType {
    Discussions,
    ReferendumsV2,
    DemocracyProposals,
    TreasuryProposals,
    Bounties,
    ChildBounties,
    Tips,
    TechCommitteeProposals,
    CouncilMotions,
    FellowshipReferendums,
}

impl ProposalType {
    pub const ALL: [ProposalType; 10] = [
        ProposalType::Discussions,
        ProposalType::ReferendumsV2,
        ProposalType::DemocracyProposals,
        ProposalType::TreasuryProposals,
        ProposalType::Bounties,
        ProposalType::ChildBounties,
        ProposalType::Tips,
        ProposalType::TechCommitteeProposals,
        ProposalType::CouncilMotions,
        ProposalType::FellowshipReferendums,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalType::Discussions => "discussions",
            ProposalType::ReferendumsV2 => "referendums_v2",
            ProposalType::DemocracyProposals => "democracy_proposals",
            ProposalType::TreasuryProposals => "treasury_proposals",
            ProposalType::Bounties => "bounties",
            ProposalType::ChildBounties => "child_bounties",
            ProposalType::Tips => "tips",
            ProposalType::TechCommitteeProposals => "tech_committee_proposals",
            ProposalType::CouncilMotions => "council_motions",
            ProposalType::FellowshipReferendums => "fellowship_referendums",
        }
    }

    /// Parse a proposal type from a string (case-insensitive).
    pub fn from_str_ci(s: &str) -> Option<Self> {
        let lowered = s.to_lowercase();
        Self::ALL.into_iter().find(|t| t.as_str() == lowered)
    }
}

impl fmt::Display for ProposalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A governance post as stored in the `posts` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Network the post belongs to (e.g. `polkadot`).
    pub network: String,
    pub proposal_type: ProposalType,
    /// On-chain index, or hash for hash-addressed proposals such as tips.
    pub index: String,
    pub title: String,
    /// Raw body, Markdown or HTML depending on the editor that produced it.
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Proposer address.
    #[serde(default)]
    pub proposer: String,
    /// OpenGov track origin, when applicable.
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
    /// Soft-deleted posts are removed from the search index.
    #[serde(default)]
    pub is_deleted: bool,
}

/// The request payload for the single-post sync API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPostRequest {
    /// Service authentication token.
    pub service_token: String,
    pub network: String,
    /// Proposal type, in its snake_case form.
    pub proposal_type: String,
    pub index: String,
}

/// What happened to the index entry of a synced post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAction {
    Indexed,
    Deleted,
}

/// The response from a successful single-post sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPostResponse {
    pub object_id: String,
    pub action: SyncAction,
    /// Whether `parsedContent` had to be shortened to fit the byte ceiling.
    pub truncated: bool,
    /// Serialized size of the record that was written (0 for deletions).
    pub serialized_bytes: usize,
}

/// The request payload for a whole-network resync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncNetworkRequest {
    pub service_token: String,
    /// Only posts updated at or after this instant are synced; all posts when absent.
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
}
