//! Quest Progression Engine
//!
//! The rules that select which quests to offer a user, activate a chosen
//! quest, and turn ingested match statistics into objective progress.
//! Everything in this module is pure; persistence and provider calls live
//! in the service layer.

pub mod eligibility;
pub mod offer;
pub mod progress;
pub mod view;

pub use eligibility::eligible_characters;
pub use offer::{MAX_ACTIVE_QUESTS, OFFER_BATCH_SIZE, sample_window, select_candidates, should_offer};
pub use progress::{find_participant, objective_delta, qualifying_matches};
pub use view::{ObjectiveView, QuestView, build_quest_view, build_quest_views};
