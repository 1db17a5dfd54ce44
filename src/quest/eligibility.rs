//! Role/Eligibility Filter
//!
//! Maps a user's role preferences to the set of characters whose quests the
//! user can be offered. A character is eligible when either of its role
//! slots matches any preferred role.

use std::collections::HashSet;

use crate::model::{Character, RolePreferences};

/// Returns the ids of all characters matching the user's role preferences.
///
/// No preferences selected means no eligible characters, which makes the
/// offer cycle a no-op for that user.
pub fn eligible_characters<'a>(
    characters: impl IntoIterator<Item = &'a Character>,
    prefs: &RolePreferences,
) -> HashSet<i64> {
    let roles = prefs.selected();
    if roles.is_empty() {
        return HashSet::new();
    }
    characters
        .into_iter()
        .filter(|c| c.matches_any(&roles))
        .map(|c| c.id)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;

    fn character(id: i64, role1: Role, role2: Option<Role>) -> Character {
        Character {
            id,
            key: format!("char{}", id),
            name: format!("Character {}", id),
            role1,
            role2,
        }
    }

    #[test]
    fn test_no_preferences_means_no_eligible_characters() {
        let chars = vec![character(1, Role::Mage, None)];
        let eligible = eligible_characters(&chars, &RolePreferences::default());
        assert!(eligible.is_empty());
    }

    #[test]
    fn test_matches_either_role_slot() {
        let chars = vec![
            character(1, Role::Mage, None),
            character(2, Role::Fighter, Some(Role::Mage)),
            character(3, Role::Tank, Some(Role::Support)),
        ];
        let prefs = RolePreferences {
            mage: true,
            ..Default::default()
        };
        let eligible = eligible_characters(&chars, &prefs);
        assert_eq!(eligible, HashSet::from([1, 2]));
    }

    #[test]
    fn test_multiple_preferences_union() {
        let chars = vec![
            character(1, Role::Mage, None),
            character(2, Role::Tank, None),
            character(3, Role::Marksman, None),
        ];
        let prefs = RolePreferences {
            mage: true,
            marksman: true,
            ..Default::default()
        };
        let eligible = eligible_characters(&chars, &prefs);
        assert_eq!(eligible, HashSet::from([1, 3]));
    }
}
