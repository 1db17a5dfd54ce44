//! Domain Model
//!
//! Persisted entities plus the id-indexed lookup structures used to walk the
//! quest graph without live object references. `QuestCatalog` holds immutable
//! reference data (characters, quest templates, objective definitions);
//! per-user mutable state lives in `UserQuestState` snapshots.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Character role tags, fixed enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Fighter,
    Marksman,
    Support,
    Assassin,
    Mage,
    Tank,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Fighter => "fighter",
            Role::Marksman => "marksman",
            Role::Support => "support",
            Role::Assassin => "assassin",
            Role::Mage => "mage",
            Role::Tank => "tank",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "fighter" => Some(Role::Fighter),
            "marksman" => Some(Role::Marksman),
            "support" => Some(Role::Support),
            "assassin" => Some(Role::Assassin),
            "mage" => Some(Role::Mage),
            "tank" => Some(Role::Tank),
            _ => None,
        }
    }
}

/// A user's role preference flags, one boolean per role
#[derive(Debug, Clone, Copy, Default)]
pub struct RolePreferences {
    pub assassin: bool,
    pub mage: bool,
    pub support: bool,
    pub fighter: bool,
    pub tank: bool,
    pub marksman: bool,
}

impl RolePreferences {
    /// The roles the user has opted into
    pub fn selected(&self) -> Vec<Role> {
        let mut roles = Vec::new();
        if self.assassin {
            roles.push(Role::Assassin);
        }
        if self.mage {
            roles.push(Role::Mage);
        }
        if self.support {
            roles.push(Role::Support);
        }
        if self.fighter {
            roles.push(Role::Fighter);
        }
        if self.tank {
            roles.push(Role::Tank);
        }
        if self.marksman {
            roles.push(Role::Marksman);
        }
        roles
    }
}

/// Playable character, immutable reference data
#[derive(Debug, Clone)]
pub struct Character {
    pub id: i64,
    pub key: String,
    pub name: String,
    pub role1: Role,
    pub role2: Option<Role>,
}

impl Character {
    /// Whether either role slot matches any of the given roles
    pub fn matches_any(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| self.role1 == *r || self.role2 == Some(*r))
    }
}

/// A tracked statistic type (e.g. "kills"), reference data
#[derive(Debug, Clone)]
pub struct Objective {
    pub id: i64,
    pub key: String,
    pub title: String,
}

/// Quest template tied to one character, reference data
#[derive(Debug, Clone)]
pub struct Quest {
    pub id: i64,
    pub quest_type: i64,
    pub title: String,
    pub character_id: i64,
    /// Reward payload, stored as JSON
    pub points: serde_json::Value,
}

/// A quest's binding of an objective to a numeric goal
#[derive(Debug, Clone)]
pub struct QuestObjective {
    pub id: i64,
    pub quest_id: i64,
    pub objective_id: i64,
    pub goal_type: i64,
    pub goal: i64,
}

/// Registered user with external account link and role preferences
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// External statistics-provider account identifier
    pub account_id: i64,
    pub summoner_name: Option<String>,
    pub profile_icon_id: Option<i64>,
    pub summoner_level: Option<i64>,
    pub prefs: RolePreferences,
}

/// Per-user instantiation of a quest template
#[derive(Debug, Clone)]
pub struct UserQuest {
    pub id: i64,
    pub quest_id: i64,
    pub user_id: i64,
    pub active: bool,
    pub completed: bool,
    pub activation_date: Option<DateTime<Utc>>,
}

impl UserQuest {
    /// Offered quests are inactive and can be superseded by an activation
    pub fn is_offered(&self) -> bool {
        !self.active
    }
}

/// Per-user progress record for one objective of one quest
#[derive(Debug, Clone)]
pub struct UserQuestObjective {
    pub id: i64,
    pub quest_objective_id: i64,
    pub user_quest_id: i64,
    pub progress: i64,
}

/// A user quest together with its objective progress rows
#[derive(Debug, Clone)]
pub struct UserQuestState {
    pub quest: UserQuest,
    pub objectives: Vec<UserQuestObjective>,
}

/// Id-indexed snapshot of all quest reference data.
///
/// Loaded once per request; lookups go through ids instead of nested object
/// graphs so per-user state never aliases cached reference data.
#[derive(Debug, Clone, Default)]
pub struct QuestCatalog {
    pub characters: HashMap<i64, Character>,
    pub quests: HashMap<i64, Quest>,
    pub objectives: HashMap<i64, Objective>,
    pub quest_objectives: HashMap<i64, QuestObjective>,
    /// quest id -> ids of its quest objectives
    pub objectives_by_quest: HashMap<i64, Vec<i64>>,
}

impl QuestCatalog {
    pub fn quest(&self, quest_id: i64) -> Option<&Quest> {
        self.quests.get(&quest_id)
    }

    pub fn quest_objective(&self, id: i64) -> Option<&QuestObjective> {
        self.quest_objectives.get(&id)
    }

    pub fn objective(&self, id: i64) -> Option<&Objective> {
        self.objectives.get(&id)
    }

    /// The character a quest is tied to
    pub fn character_of_quest(&self, quest_id: i64) -> Option<&Character> {
        let quest = self.quests.get(&quest_id)?;
        self.characters.get(&quest.character_id)
    }

    /// Quest objective rows of a quest, in insertion order
    pub fn objectives_of_quest(&self, quest_id: i64) -> Vec<&QuestObjective> {
        self.objectives_by_quest
            .get(&quest_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.quest_objectives.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }
}
