use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::collections::{HashMap, HashSet};

use crate::model::{
    Character, Objective, Quest, QuestCatalog, QuestObjective, Role, RolePreferences, User,
    UserQuest, UserQuestObjective, UserQuestState,
};

/// One quest template selected for an offer batch, with the quest objective
/// rows its per-user progress records are created from
#[derive(Debug, Clone)]
pub struct OfferedQuest {
    pub quest_id: i64,
    pub quest_objective_ids: Vec<i64>,
}

/// A pending progress increment for one user quest objective
#[derive(Debug, Clone)]
pub struct ObjectiveDelta {
    pub user_quest_objective_id: i64,
    pub delta: i64,
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        // Run migrations
        Self::migrate(&pool).await?;

        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        // Reference data
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS characters (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                role1 TEXT NOT NULL,
                role2 TEXT
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS objectives (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT UNIQUE NOT NULL,
                title TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                quest_type INTEGER NOT NULL DEFAULT 0,
                title TEXT NOT NULL,
                character_id INTEGER NOT NULL,
                points TEXT NOT NULL DEFAULT 'null',
                FOREIGN KEY(character_id) REFERENCES characters(id)
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS quest_objectives (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                quest_id INTEGER NOT NULL,
                objective_id INTEGER NOT NULL,
                goal_type INTEGER NOT NULL DEFAULT 0,
                goal INTEGER NOT NULL,
                FOREIGN KEY(quest_id) REFERENCES quests(id),
                FOREIGN KEY(objective_id) REFERENCES objectives(id)
            )
            "#,
        )
        .execute(pool)
        .await?;

        // Users and per-user quest state
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT UNIQUE NOT NULL,
                account_id INTEGER NOT NULL,
                summoner_name TEXT,
                profile_icon_id INTEGER,
                summoner_level INTEGER,
                assassin INTEGER NOT NULL DEFAULT 0,
                mage INTEGER NOT NULL DEFAULT 0,
                support INTEGER NOT NULL DEFAULT 0,
                fighter INTEGER NOT NULL DEFAULT 0,
                tank INTEGER NOT NULL DEFAULT 0,
                marksman INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_quests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                quest_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                active INTEGER NOT NULL DEFAULT 0,
                completed INTEGER NOT NULL DEFAULT 0,
                activation_date TEXT,
                FOREIGN KEY(quest_id) REFERENCES quests(id),
                FOREIGN KEY(user_id) REFERENCES users(id),
                UNIQUE(user_id, quest_id)
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_quest_objectives (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                quest_objective_id INTEGER NOT NULL,
                user_quest_id INTEGER NOT NULL,
                progress INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY(quest_objective_id) REFERENCES quest_objectives(id),
                FOREIGN KEY(user_quest_id) REFERENCES user_quests(id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(pool)
        .await?;

        // Dedup ledger: the composite primary key is the at-most-once guard
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_matches (
                match_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                PRIMARY KEY(match_id, user_id),
                FOREIGN KEY(user_id) REFERENCES users(id)
            )
            "#,
        )
        .execute(pool)
        .await?;

        tracing::info!("Database migrations complete");
        Ok(())
    }

    // ========================================================================
    // Reference data
    // ========================================================================

    pub async fn insert_character(
        &self,
        key: &str,
        name: &str,
        role1: Role,
        role2: Option<Role>,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO characters (key, name, role1, role2) VALUES (?, ?, ?, ?)")
            .bind(key)
            .bind(name)
            .bind(role1.as_str())
            .bind(role2.map(|r| r.as_str()))
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn insert_objective(&self, key: &str, title: &str) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO objectives (key, title) VALUES (?, ?)")
            .bind(key)
            .bind(title)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn insert_quest(
        &self,
        quest_type: i64,
        title: &str,
        character_id: i64,
        points: &serde_json::Value,
    ) -> Result<i64, sqlx::Error> {
        let result =
            sqlx::query("INSERT INTO quests (quest_type, title, character_id, points) VALUES (?, ?, ?, ?)")
                .bind(quest_type)
                .bind(title)
                .bind(character_id)
                .bind(points.to_string())
                .execute(&self.pool)
                .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn insert_quest_objective(
        &self,
        quest_id: i64,
        objective_id: i64,
        goal_type: i64,
        goal: i64,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO quest_objectives (quest_id, objective_id, goal_type, goal) VALUES (?, ?, ?, ?)",
        )
        .bind(quest_id)
        .bind(objective_id)
        .bind(goal_type)
        .bind(goal)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Loads all quest reference data into id-indexed lookups.
    /// Rows with unknown role tags are skipped with a warning.
    pub async fn load_catalog(&self) -> Result<QuestCatalog, sqlx::Error> {
        let mut catalog = QuestCatalog::default();

        let rows = sqlx::query("SELECT id, key, name, role1, role2 FROM characters")
            .fetch_all(&self.pool)
            .await?;
        for r in rows {
            let id: i64 = r.get("id");
            let role1_raw: String = r.get("role1");
            let Some(role1) = Role::from_str(&role1_raw) else {
                tracing::warn!("Skipping character {} with unknown role '{}'", id, role1_raw);
                continue;
            };
            let role2 = r
                .get::<Option<String>, _>("role2")
                .and_then(|s| Role::from_str(&s));
            catalog.characters.insert(
                id,
                Character {
                    id,
                    key: r.get("key"),
                    name: r.get("name"),
                    role1,
                    role2,
                },
            );
        }

        let rows = sqlx::query("SELECT id, key, title FROM objectives")
            .fetch_all(&self.pool)
            .await?;
        for r in rows {
            let id: i64 = r.get("id");
            catalog.objectives.insert(
                id,
                Objective {
                    id,
                    key: r.get("key"),
                    title: r.get("title"),
                },
            );
        }

        let rows = sqlx::query("SELECT id, quest_type, title, character_id, points FROM quests")
            .fetch_all(&self.pool)
            .await?;
        for r in rows {
            let id: i64 = r.get("id");
            let points_raw: String = r.get("points");
            catalog.quests.insert(
                id,
                Quest {
                    id,
                    quest_type: r.get("quest_type"),
                    title: r.get("title"),
                    character_id: r.get("character_id"),
                    points: serde_json::from_str(&points_raw).unwrap_or(serde_json::Value::Null),
                },
            );
        }

        let rows = sqlx::query(
            "SELECT id, quest_id, objective_id, goal_type, goal FROM quest_objectives ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        for r in rows {
            let id: i64 = r.get("id");
            let quest_id: i64 = r.get("quest_id");
            catalog.quest_objectives.insert(
                id,
                QuestObjective {
                    id,
                    quest_id,
                    objective_id: r.get("objective_id"),
                    goal_type: r.get("goal_type"),
                    goal: r.get("goal"),
                },
            );
            catalog
                .objectives_by_quest
                .entry(quest_id)
                .or_default()
                .push(id);
        }

        Ok(catalog)
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub async fn create_user(
        &self,
        username: &str,
        account_id: i64,
        prefs: &RolePreferences,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r#"INSERT INTO users
                (username, account_id, assassin, mage, support, fighter, tank, marksman)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(username)
        .bind(account_id)
        .bind(prefs.assassin)
        .bind(prefs.mage)
        .bind(prefs.support)
        .bind(prefs.fighter)
        .bind(prefs.tank)
        .bind(prefs.marksman)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Option<User>, sqlx::Error> {
        let row = sqlx::query(
            r#"SELECT id, username, account_id, summoner_name, profile_icon_id, summoner_level,
                assassin, mage, support, fighter, tank, marksman
            FROM users WHERE id = ?"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| User {
            id: r.get("id"),
            username: r.get("username"),
            account_id: r.get("account_id"),
            summoner_name: r.get("summoner_name"),
            profile_icon_id: r.get("profile_icon_id"),
            summoner_level: r.get("summoner_level"),
            prefs: RolePreferences {
                assassin: r.get("assassin"),
                mage: r.get("mage"),
                support: r.get("support"),
                fighter: r.get("fighter"),
                tank: r.get("tank"),
                marksman: r.get("marksman"),
            },
        }))
    }

    // ========================================================================
    // Per-user quest state
    // ========================================================================

    /// Loads all of a user's quests with their objective progress rows
    pub async fn load_user_quests(&self, user_id: i64) -> Result<Vec<UserQuestState>, sqlx::Error> {
        let quest_rows = sqlx::query(
            "SELECT id, quest_id, user_id, active, completed, activation_date
            FROM user_quests WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let objective_rows = sqlx::query(
            r#"SELECT uqo.id, uqo.quest_objective_id, uqo.user_quest_id, uqo.progress
            FROM user_quest_objectives uqo
            JOIN user_quests uq ON uq.id = uqo.user_quest_id
            WHERE uq.user_id = ? ORDER BY uqo.id"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut objectives_by_quest: HashMap<i64, Vec<UserQuestObjective>> = HashMap::new();
        for r in objective_rows {
            let uqo = UserQuestObjective {
                id: r.get("id"),
                quest_objective_id: r.get("quest_objective_id"),
                user_quest_id: r.get("user_quest_id"),
                progress: r.get("progress"),
            };
            objectives_by_quest
                .entry(uqo.user_quest_id)
                .or_default()
                .push(uqo);
        }

        Ok(quest_rows
            .into_iter()
            .map(|r| {
                let quest = UserQuest {
                    id: r.get("id"),
                    quest_id: r.get("quest_id"),
                    user_id: r.get("user_id"),
                    active: r.get("active"),
                    completed: r.get("completed"),
                    activation_date: r.get::<Option<DateTime<Utc>>, _>("activation_date"),
                };
                let objectives = objectives_by_quest.remove(&quest.id).unwrap_or_default();
                UserQuestState { quest, objectives }
            })
            .collect())
    }

    /// Persists a batch of offered quest subtrees in one transaction.
    /// Either the whole batch lands or none of it does.
    pub async fn insert_offer_batch(
        &self,
        user_id: i64,
        offers: &[OfferedQuest],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for offer in offers {
            let result = sqlx::query(
                "INSERT INTO user_quests (quest_id, user_id, active, completed) VALUES (?, ?, 0, 0)",
            )
            .bind(offer.quest_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
            let user_quest_id = result.last_insert_rowid();

            for quest_objective_id in &offer.quest_objective_ids {
                sqlx::query(
                    "INSERT INTO user_quest_objectives (quest_objective_id, user_quest_id, progress)
                    VALUES (?, ?, 0)",
                )
                .bind(quest_objective_id)
                .bind(user_quest_id)
                .execute(&mut *tx)
                .await?;
            }
        }
        tx.commit().await?;
        Ok(())
    }

    /// Activates one offered quest and clears the user's remaining offers as
    /// a single unit of work. Returns false when the target does not exist,
    /// is not owned by the user, or is already active.
    pub async fn activate_user_quest(
        &self,
        user_id: i64,
        user_quest_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE user_quests SET active = 1, activation_date = ?
            WHERE id = ? AND user_id = ? AND active = 0",
        )
        .bind(now)
        .bind(user_quest_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        // Unchosen offers only; active and completed quests stay untouched
        sqlx::query(
            "DELETE FROM user_quests
            WHERE user_id = ? AND active = 0 AND completed = 0 AND id != ?",
        )
        .bind(user_id)
        .bind(user_quest_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    // ========================================================================
    // Match ledger
    // ========================================================================

    pub async fn ledgered_matches(&self, user_id: i64) -> Result<HashSet<i64>, sqlx::Error> {
        let rows = sqlx::query("SELECT match_id FROM user_matches WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get::<i64, _>("match_id")).collect())
    }

    /// Records a match in the dedup ledger. Returns false when another
    /// ingestion run already recorded it; that is a benign outcome, not an
    /// error.
    pub async fn record_match(&self, user_id: i64, match_id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("INSERT INTO user_matches (match_id, user_id) VALUES (?, ?)")
            .bind(match_id)
            .bind(user_id)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) if e.to_string().contains("UNIQUE constraint failed") => Ok(false),
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // Progress application
    // ========================================================================

    /// Applies a cycle's objective deltas and completion flips in one
    /// transaction.
    ///
    /// Each increment clamps to the objective's goal inside the UPDATE, so
    /// overlapping ingestion runs can never push progress past the goal.
    /// Completion is decided against the stored rows in the same
    /// transaction. Returns the ids of user quests that flipped to
    /// completed.
    pub async fn apply_progress_updates(
        &self,
        deltas: &[ObjectiveDelta],
        user_quest_ids: &[i64],
    ) -> Result<Vec<i64>, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for delta in deltas {
            sqlx::query(
                r#"UPDATE user_quest_objectives
                SET progress = MIN(
                    progress + ?,
                    (SELECT goal FROM quest_objectives
                     WHERE id = user_quest_objectives.quest_objective_id))
                WHERE id = ?"#,
            )
            .bind(delta.delta)
            .bind(delta.user_quest_objective_id)
            .execute(&mut *tx)
            .await?;
        }

        let mut newly_completed = Vec::new();
        for user_quest_id in user_quest_ids {
            let result = sqlx::query(
                r#"UPDATE user_quests SET completed = 1
                WHERE id = ? AND completed = 0
                AND NOT EXISTS (
                    SELECT 1 FROM user_quest_objectives uqo
                    JOIN quest_objectives qo ON qo.id = uqo.quest_objective_id
                    WHERE uqo.user_quest_id = user_quests.id AND uqo.progress < qo.goal)"#,
            )
            .bind(user_quest_id)
            .execute(&mut *tx)
            .await?;
            if result.rows_affected() > 0 {
                newly_completed.push(*user_quest_id);
            }
        }

        tx.commit().await?;
        Ok(newly_completed)
    }
}
