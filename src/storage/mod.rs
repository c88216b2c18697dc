use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// A feed bot: which search term it relays and where its cursor stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotRegistration {
    pub bot_id: String,
    pub user_id: String,
    pub group_id: String,
    pub search_term: String,
    /// Id of the newest item already relayed; the next search starts after it.
    pub most_recent_id: Option<String>,
}

impl BotRegistration {
    pub fn new(bot_id: &str, user_id: &str, group_id: &str, search_term: &str) -> Self {
        Self {
            bot_id: bot_id.to_string(),
            user_id: user_id.to_string(),
            group_id: group_id.to_string(),
            search_term: search_term.to_string(),
            most_recent_id: None,
        }
    }
}

/// Thread-safe SQLite store of bot registrations, keyed by bot id.
#[derive(Clone)]
pub struct RegistrationStore {
    conn: Arc<Mutex<Connection>>,
}

impl RegistrationStore {
    /// Open or create the SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // journal_mode PRAGMA always returns the resulting mode, so use query_row
        let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        Self::run_migrations(&conn)?;
        info!("Registration store initialized at: {}", path.display());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS bot_registrations (
                bot_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                group_id TEXT NOT NULL,
                search_term TEXT NOT NULL,
                most_recent_id TEXT,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_bot_registrations_user
                ON bot_registrations(user_id);
            ",
        )
        .context("Failed to run migrations")?;
        Ok(())
    }

    /// Insert the registration, replacing any existing row for the same bot.
    pub async fn upsert(&self, registration: &BotRegistration) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO bot_registrations
             (bot_id, user_id, group_id, search_term, most_recent_id, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, datetime('now'))",
            rusqlite::params![
                registration.bot_id,
                registration.user_id,
                registration.group_id,
                registration.search_term,
                registration.most_recent_id,
            ],
        )
        .context("Failed to store bot registration")?;
        Ok(())
    }

    /// Move a bot's cursor. Returns false if the bot is not registered.
    pub async fn update_cursor(&self, bot_id: &str, most_recent_id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let changed = conn
            .execute(
                "UPDATE bot_registrations
                 SET most_recent_id = ?1, updated_at = datetime('now')
                 WHERE bot_id = ?2",
                rusqlite::params![most_recent_id, bot_id],
            )
            .context("Failed to update cursor")?;
        Ok(changed > 0)
    }

    pub async fn list_all(&self) -> Result<Vec<BotRegistration>> {
        let conn = self.conn.lock().await;
        query_registrations(&conn, "", rusqlite::params![])
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<BotRegistration>> {
        let conn = self.conn.lock().await;
        query_registrations(&conn, "WHERE user_id = ?1", rusqlite::params![user_id])
    }

    #[cfg(test)]
    pub async fn get(&self, bot_id: &str) -> Result<Option<BotRegistration>> {
        let conn = self.conn.lock().await;
        let mut found = query_registrations(&conn, "WHERE bot_id = ?1", rusqlite::params![bot_id])?;
        Ok(found.pop())
    }
}

// Caller already holds the lock.
fn query_registrations(
    conn: &Connection,
    where_clause: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<BotRegistration>> {
    let sql = format!(
        "SELECT bot_id, user_id, group_id, search_term, most_recent_id
         FROM bot_registrations {}
         ORDER BY bot_id ASC",
        where_clause
    );
    let mut stmt = conn.prepare(&sql).context("Failed to prepare query")?;
    let registrations = stmt
        .query_map(params, |row| {
            Ok(BotRegistration {
                bot_id: row.get(0)?,
                user_id: row.get(1)?,
                group_id: row.get(2)?,
                search_term: row.get(3)?,
                most_recent_id: row.get(4)?,
            })
        })
        .context("Failed to map rows")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to collect rows")?;
    Ok(registrations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_and_list() {
        let store = RegistrationStore::open_in_memory().unwrap();
        store
            .upsert(&BotRegistration::new("b2", "u1", "g1", "rust"))
            .await
            .unwrap();
        store
            .upsert(&BotRegistration::new("b1", "u2", "g2", "ferris"))
            .await
            .unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].bot_id, "b1");
        assert_eq!(all[1].search_term, "rust");
        assert_eq!(all[1].most_recent_id, None);
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_bot() {
        let store = RegistrationStore::open_in_memory().unwrap();
        let mut registration = BotRegistration::new("b1", "u1", "g1", "rust");
        store.upsert(&registration).await.unwrap();

        registration.most_recent_id = Some("1001".to_string());
        registration.search_term = "rustlang".to_string();
        store.upsert(&registration).await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all, vec![registration]);
    }

    #[tokio::test]
    async fn test_list_for_user() {
        let store = RegistrationStore::open_in_memory().unwrap();
        for (bot, user) in [("b1", "u1"), ("b2", "u2"), ("b3", "u1")] {
            store
                .upsert(&BotRegistration::new(bot, user, "g", "term"))
                .await
                .unwrap();
        }

        let mine: Vec<String> = store
            .list_for_user("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.bot_id)
            .collect();
        assert_eq!(mine, vec!["b1", "b3"]);
        assert!(store.list_for_user("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_cursor() {
        let store = RegistrationStore::open_in_memory().unwrap();
        store
            .upsert(&BotRegistration::new("b1", "u1", "g1", "rust"))
            .await
            .unwrap();

        assert!(store.update_cursor("b1", "2002").await.unwrap());
        assert!(!store.update_cursor("missing", "2002").await.unwrap());

        let bot = store.get("b1").await.unwrap().unwrap();
        assert_eq!(bot.most_recent_id.as_deref(), Some("2002"));
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_on_disk_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bots.db");
        {
            let store = RegistrationStore::open(&path).unwrap();
            store
                .upsert(&BotRegistration::new("b1", "u1", "g1", "rust"))
                .await
                .unwrap();
        }

        let reopened = RegistrationStore::open(&path).unwrap();
        assert_eq!(reopened.list_all().await.unwrap().len(), 1);
    }
}
