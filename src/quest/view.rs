//! Response Assembler
//!
//! Flattens the persisted quest/objective graph into the client-facing
//! shape. Pure projection over the id-indexed catalog.

use serde::Serialize;

use crate::model::{QuestCatalog, UserQuestState};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestView {
    pub id: i64,
    pub title: String,
    pub character_id: i64,
    pub character_key: String,
    pub character_name: String,
    #[serde(rename = "type")]
    pub quest_type: i64,
    pub active: bool,
    pub points: serde_json::Value,
    pub completed: bool,
    pub objectives: Vec<ObjectiveView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveView {
    pub progress: i64,
    pub goal: i64,
    pub goal_type: i64,
    pub title: String,
}

/// Builds one flattened quest view. Returns `None` when the user quest
/// references catalog rows that no longer exist.
pub fn build_quest_view(state: &UserQuestState, catalog: &QuestCatalog) -> Option<QuestView> {
    let quest = catalog.quest(state.quest.quest_id)?;
    let character = catalog.characters.get(&quest.character_id)?;

    let mut objectives = Vec::with_capacity(state.objectives.len());
    for uqo in &state.objectives {
        let quest_objective = catalog.quest_objective(uqo.quest_objective_id)?;
        let objective = catalog.objective(quest_objective.objective_id)?;
        objectives.push(ObjectiveView {
            progress: uqo.progress,
            goal: quest_objective.goal,
            goal_type: quest_objective.goal_type,
            title: objective.title.clone(),
        });
    }

    Some(QuestView {
        id: state.quest.id,
        title: quest.title.clone(),
        character_id: character.id,
        character_key: character.key.clone(),
        character_name: character.name.clone(),
        quest_type: quest.quest_type,
        active: state.quest.active,
        points: quest.points.clone(),
        completed: state.quest.completed,
        objectives,
    })
}

/// Flattens a batch of user quests, dropping rows with dangling catalog
/// references after logging them.
pub fn build_quest_views(states: &[UserQuestState], catalog: &QuestCatalog) -> Vec<QuestView> {
    states
        .iter()
        .filter_map(|state| {
            let view = build_quest_view(state, catalog);
            if view.is_none() {
                tracing::warn!(
                    "Dropping user quest {} with dangling catalog references",
                    state.quest.id
                );
            }
            view
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Character, Objective, Quest, QuestObjective, Role, UserQuest, UserQuestObjective,
    };

    fn fixture() -> (UserQuestState, QuestCatalog) {
        let mut catalog = QuestCatalog::default();
        catalog.characters.insert(
            7,
            Character {
                id: 7,
                key: "annie".to_string(),
                name: "Annie".to_string(),
                role1: Role::Mage,
                role2: None,
            },
        );
        catalog.quests.insert(
            3,
            Quest {
                id: 3,
                quest_type: 1,
                title: "Burn Them All".to_string(),
                character_id: 7,
                points: serde_json::json!({ "win": 100 }),
            },
        );
        catalog.objectives.insert(
            5,
            Objective {
                id: 5,
                key: "kills".to_string(),
                title: "Kills".to_string(),
            },
        );
        catalog.quest_objectives.insert(
            9,
            QuestObjective {
                id: 9,
                quest_id: 3,
                objective_id: 5,
                goal_type: 0,
                goal: 10,
            },
        );
        catalog.objectives_by_quest.insert(3, vec![9]);

        let state = UserQuestState {
            quest: UserQuest {
                id: 21,
                quest_id: 3,
                user_id: 1,
                active: true,
                completed: false,
                activation_date: None,
            },
            objectives: vec![UserQuestObjective {
                id: 31,
                quest_objective_id: 9,
                user_quest_id: 21,
                progress: 4,
            }],
        };
        (state, catalog)
    }

    #[test]
    fn test_flattens_quest_graph() {
        let (state, catalog) = fixture();
        let view = build_quest_view(&state, &catalog).unwrap();
        assert_eq!(view.id, 21);
        assert_eq!(view.title, "Burn Them All");
        assert_eq!(view.character_key, "annie");
        assert_eq!(view.character_name, "Annie");
        assert_eq!(view.objectives.len(), 1);
        assert_eq!(view.objectives[0].progress, 4);
        assert_eq!(view.objectives[0].goal, 10);
        assert_eq!(view.objectives[0].title, "Kills");
    }

    #[test]
    fn test_serializes_with_client_field_names() {
        let (state, catalog) = fixture();
        let view = build_quest_view(&state, &catalog).unwrap();
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["characterId"], 7);
        assert_eq!(json["characterKey"], "annie");
        assert_eq!(json["type"], 1);
        assert_eq!(json["objectives"][0]["goalType"], 0);
        assert_eq!(json["points"]["win"], 100);
    }

    #[test]
    fn test_dangling_reference_is_dropped() {
        let (state, mut catalog) = fixture();
        catalog.quests.clear();
        assert!(build_quest_view(&state, &catalog).is_none());
        assert!(build_quest_views(std::slice::from_ref(&state), &catalog).is_empty());
    }
}
