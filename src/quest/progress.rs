//! Match Qualification & Progress Deltas
//!
//! Pure helpers for the ingestion cycle: which fetched matches qualify for
//! progress, how to locate the user's participant record inside a match,
//! and how much each objective advances.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::model::{QuestCatalog, UserQuestState};
use crate::provider::{MatchDetail, MatchSummary, Participant};

/// Filters recent matches down to the ones that count this cycle.
///
/// A match qualifies when it is not in the dedup ledger and was played
/// strictly after the activation of at least one of the user's quests tied
/// to the match's character.
pub fn qualifying_matches<'a>(
    summaries: &'a [MatchSummary],
    ledger: &HashSet<i64>,
    user_quests: &[UserQuestState],
    catalog: &QuestCatalog,
) -> Vec<&'a MatchSummary> {
    summaries
        .iter()
        .filter(|m| !ledger.contains(&m.match_id))
        .filter(|m| {
            user_quests.iter().any(|uq| {
                activated_before(uq.quest.activation_date, m.timestamp)
                    && catalog
                        .quest(uq.quest.quest_id)
                        .is_some_and(|q| q.character_id == m.character_id)
            })
        })
        .collect()
}

fn activated_before(activation: Option<DateTime<Utc>>, match_timestamp_ms: i64) -> bool {
    activation.is_some_and(|at| match_timestamp_ms > at.timestamp_millis())
}

/// Locates the requesting user's participant record in a match.
///
/// When the match carries participant identities, the lookup goes through
/// the player's account id. Reduced-data game modes omit identities; there
/// the character id is the key, which relies on each character appearing at
/// most once per match. An ambiguous character-id lookup means malformed
/// provider data and yields `None`.
pub fn find_participant<'a>(
    detail: &'a MatchDetail,
    account_id: i64,
    character_id: i64,
) -> Option<&'a Participant> {
    let has_identities = detail
        .participant_identities
        .first()
        .is_some_and(|pi| pi.player.is_some());

    if has_identities {
        let identity = detail
            .participant_identities
            .iter()
            .find(|pi| pi.player.as_ref().is_some_and(|p| p.account_id == account_id))?;
        return detail
            .participants
            .iter()
            .find(|p| p.participant_id == identity.participant_id);
    }

    let mut by_character = detail
        .participants
        .iter()
        .filter(|p| p.character_id == character_id);
    let found = by_character.next()?;
    if by_character.next().is_some() {
        return None;
    }
    Some(found)
}

/// Sums one tracked statistic across the participant records of a batch.
/// Matches missing the stat key contribute nothing.
pub fn objective_delta(stat_key: &str, participants: &[Participant]) -> i64 {
    participants
        .iter()
        .map(|p| p.stats.get(stat_key).copied().unwrap_or(0))
        .sum()
}
