//! Quest Service
//!
//! Orchestrates the quest progression engine over the persistence layer and
//! the match-statistics provider. Each public method backs one HTTP
//! operation; all mutual exclusion is delegated to database constraints and
//! transactions, never in-process locks.

use chrono::Utc;
use futures::future;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use crate::db::{Database, ObjectiveDelta, OfferedQuest};
use crate::error::ServiceError;
use crate::model::{QuestCatalog, User, UserQuest, UserQuestState};
use crate::provider::{MatchProvider, Participant};
use crate::quest::{self, QuestView};

pub struct QuestService {
    db: Arc<Database>,
    provider: Arc<dyn MatchProvider>,
}

impl QuestService {
    pub fn new(db: Arc<Database>, provider: Arc<dyn MatchProvider>) -> Self {
        Self { db, provider }
    }

    /// Generates a fresh offer batch if the user is due one, then returns
    /// the current offered (inactive) quests.
    pub async fn offer_quests(&self, user_id: i64) -> Result<Vec<QuestView>, ServiceError> {
        let user = self.require_user(user_id).await?;
        let catalog = self.db.load_catalog().await?;
        self.run_offer_cycle(&user, &catalog).await?;

        let states = self.db.load_user_quests(user.id).await?;
        let offered: Vec<UserQuestState> = states
            .into_iter()
            .filter(|s| s.quest.is_offered())
            .collect();
        Ok(quest::build_quest_views(&offered, &catalog))
    }

    /// Promotes one offered quest to active and discards the user's other
    /// offers, as a single unit of work.
    pub async fn activate_quest(
        &self,
        user_id: i64,
        user_quest_id: i64,
    ) -> Result<QuestView, ServiceError> {
        if user_quest_id <= 0 {
            return Err(ServiceError::Validation(format!(
                "invalid quest id {}",
                user_quest_id
            )));
        }
        let user = self.require_user(user_id).await?;

        let activated = self
            .db
            .activate_user_quest(user.id, user_quest_id, Utc::now())
            .await?;
        if !activated {
            return Err(ServiceError::NotFound(format!(
                "quest {} is not offered to user {}",
                user_quest_id, user.id
            )));
        }
        info!("User {} activated quest {}", user.id, user_quest_id);

        let catalog = self.db.load_catalog().await?;
        let states = self.db.load_user_quests(user.id).await?;
        states
            .iter()
            .find(|s| s.quest.id == user_quest_id)
            .and_then(|s| quest::build_quest_view(s, &catalog))
            .ok_or_else(|| ServiceError::NotFound(format!("quest {}", user_quest_id)))
    }

    /// Runs an offer cycle, then returns every quest of the user — offered,
    /// active, and completed — in the flattened response shape.
    pub async fn list_all_quests(&self, user_id: i64) -> Result<Vec<QuestView>, ServiceError> {
        let user = self.require_user(user_id).await?;
        let catalog = self.db.load_catalog().await?;
        self.run_offer_cycle(&user, &catalog).await?;

        let states = self.db.load_user_quests(user.id).await?;
        Ok(quest::build_quest_views(&states, &catalog))
    }

    /// Ingests the user's recent matches and advances quest progress, then
    /// returns the refreshed full quest list.
    ///
    /// All match details are fetched before anything is written; a provider
    /// failure aborts the cycle with persisted state untouched. The dedup
    /// ledger is written before progress so retries can neither skip nor
    /// double-apply a match.
    pub async fn refresh_progress(&self, user_id: i64) -> Result<Vec<QuestView>, ServiceError> {
        let user = self.require_user(user_id).await?;
        let catalog = self.db.load_catalog().await?;
        let states = self.db.load_user_quests(user.id).await?;
        let ledger = self.db.ledgered_matches(user.id).await?;

        let recent = self.provider.recent_matches(user.account_id).await?;
        let qualifying = quest::qualifying_matches(&recent, &ledger, &states, &catalog);

        if !qualifying.is_empty() {
            let details = future::try_join_all(
                qualifying
                    .iter()
                    .map(|m| self.provider.match_detail(m.match_id)),
            )
            .await?;

            // Ledger first, then locate this user's participant per match.
            // A duplicate ledger hit means a concurrent refresh owns that
            // match, so it contributes nothing here.
            let mut participants_by_character: HashMap<i64, Vec<Participant>> = HashMap::new();
            let mut applied_matches = 0usize;
            for (summary, detail) in qualifying.iter().zip(details.iter()) {
                if !self.db.record_match(user.id, summary.match_id).await? {
                    continue;
                }
                match quest::find_participant(detail, user.account_id, summary.character_id) {
                    Some(p) => {
                        applied_matches += 1;
                        participants_by_character
                            .entry(summary.character_id)
                            .or_default()
                            .push(p.clone());
                    }
                    None => warn!(
                        "No participant record for account {} in match {}",
                        user.account_id, summary.match_id
                    ),
                }
            }

            let (deltas, progressed) =
                collect_deltas(&states, &catalog, &participants_by_character);

            if !progressed.is_empty() {
                let completed = self.db.apply_progress_updates(&deltas, &progressed).await?;
                info!(
                    "User {}: {} match(es) applied, {} objective update(s), {} quest(s) completed",
                    user.id,
                    applied_matches,
                    deltas.len(),
                    completed.len()
                );
            }
        }

        self.list_all_quests(user_id).await
    }

    async fn require_user(&self, user_id: i64) -> Result<User, ServiceError> {
        if user_id <= 0 {
            return Err(ServiceError::Validation(format!(
                "invalid user id {}",
                user_id
            )));
        }
        self.db
            .get_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("user {}", user_id)))
    }

    /// Inserts up to 3 new offered quests when the user has no outstanding
    /// offers and spare active-quest capacity. No-op otherwise.
    async fn run_offer_cycle(
        &self,
        user: &User,
        catalog: &QuestCatalog,
    ) -> Result<(), ServiceError> {
        let states = self.db.load_user_quests(user.id).await?;
        let rows: Vec<UserQuest> = states.iter().map(|s| s.quest.clone()).collect();
        if !quest::should_offer(&rows) {
            return Ok(());
        }

        let eligible = quest::eligible_characters(catalog.characters.values(), &user.prefs);
        if eligible.is_empty() {
            return Ok(());
        }

        let assigned: HashSet<i64> = rows.iter().map(|q| q.quest_id).collect();
        let candidates = quest::select_candidates(catalog, &eligible, &assigned);
        if candidates.is_empty() {
            return Ok(());
        }

        let window = {
            let mut rng = rand::thread_rng();
            quest::sample_window(&candidates, &mut rng).to_vec()
        };
        let offers: Vec<OfferedQuest> = window
            .iter()
            .map(|quest_id| OfferedQuest {
                quest_id: *quest_id,
                quest_objective_ids: catalog
                    .objectives_of_quest(*quest_id)
                    .iter()
                    .map(|qo| qo.id)
                    .collect(),
            })
            .collect();

        self.db.insert_offer_batch(user.id, &offers).await?;
        info!("Offered {} quest(s) to user {}", offers.len(), user.id);
        Ok(())
    }
}

/// Turns the per-character participant batches into objective deltas.
///
/// Every activated quest whose character saw at least one applied match
/// progresses; each of its objectives advances by the summed stat of that
/// character's batch. Returns the deltas plus the user quest ids to check
/// for completion.
fn collect_deltas(
    states: &[UserQuestState],
    catalog: &QuestCatalog,
    participants_by_character: &HashMap<i64, Vec<Participant>>,
) -> (Vec<ObjectiveDelta>, Vec<i64>) {
    let mut deltas = Vec::new();
    let mut progressed = Vec::new();

    for state in states {
        if !state.quest.active {
            continue;
        }
        let Some(template) = catalog.quest(state.quest.quest_id) else {
            continue;
        };
        let Some(participants) = participants_by_character.get(&template.character_id) else {
            continue;
        };
        progressed.push(state.quest.id);

        for uqo in &state.objectives {
            let Some(quest_objective) = catalog.quest_objective(uqo.quest_objective_id) else {
                continue;
            };
            let Some(objective) = catalog.objective(quest_objective.objective_id) else {
                continue;
            };
            let delta = quest::objective_delta(&objective.key, participants);
            if delta > 0 {
                deltas.push(ObjectiveDelta {
                    user_quest_objective_id: uqo.id,
                    delta,
                });
            }
        }
    }

    (deltas, progressed)
}
