//! SQLite persistence for per-user search history and title counters.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use rusqlite::{Connection, params};

use crate::error::{BotError, Result};
use crate::types::{MovieStat, SearchHistoryEntry};

/// How many rows `history` and `stats` return by default.
pub const DEFAULT_LIMIT: usize = 10;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS search_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    query TEXT NOT NULL,
    movie_title TEXT NOT NULL,
    timestamp TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_search_history_user
    ON search_history (user_id, timestamp DESC);

CREATE TABLE IF NOT EXISTS movie_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    movie_title TEXT NOT NULL,
    user_id TEXT NOT NULL,
    count INTEGER NOT NULL DEFAULT 1,
    UNIQUE (movie_title, user_id)
);
";

/// Durable log of searches and per-(user, title) counters.
///
/// One connection is shared behind a mutex, so every write is serialized
/// and readers never observe a half-applied increment.
#[derive(Debug)]
pub struct InteractionStore {
    conn: Mutex<Connection>,
}

impl InteractionStore {
    /// Open or create the store at the given path.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the parent directory or database cannot be created.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                BotError::Storage(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        let store = Self::from_connection(Connection::open(path)?)?;
        info!("Opened interaction store at {}", path.display());
        Ok(store)
    }

    /// Volatile store, mostly useful for tests.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if `SQLite` cannot allocate the database.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| BotError::Storage("connection lock poisoned".to_string()))
    }

    /// Append a search to the user's history.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the insert fails.
    pub fn record_search(&self, user_id: &str, raw_query: &str, canonical_title: &str) -> Result<()> {
        self.record_search_at(user_id, raw_query, canonical_title, Utc::now())
    }

    fn record_search_at(
        &self,
        user_id: &str,
        raw_query: &str,
        canonical_title: &str,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn()?;
        insert_search(&conn, user_id, raw_query, canonical_title, at)?;
        debug!("Recorded search {raw_query:?} -> {canonical_title:?} for user {user_id}");
        Ok(())
    }

    /// Bump the counter for (user, title), creating it at 1.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the upsert fails.
    pub fn increment_stat(&self, user_id: &str, canonical_title: &str) -> Result<()> {
        let conn = self.conn()?;
        bump_stat(&conn, user_id, canonical_title)
    }

    /// Append the search and bump its counter in one transaction.
    ///
    /// Either both rows change or neither does.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if either write or the commit fails.
    pub fn record(&self, user_id: &str, raw_query: &str, canonical_title: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        insert_search(&tx, user_id, raw_query, canonical_title, Utc::now())?;
        bump_stat(&tx, user_id, canonical_title)?;
        tx.commit()?;
        debug!("Recorded search {raw_query:?} -> {canonical_title:?} for user {user_id}");
        Ok(())
    }

    /// Most recent searches for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the query fails or a stored timestamp is invalid.
    pub fn history(&self, user_id: &str, limit: usize) -> Result<Vec<SearchHistoryEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r"
            SELECT user_id, query, movie_title, timestamp
            FROM search_history
            WHERE user_id = ?1
            ORDER BY timestamp DESC, id DESC
            LIMIT ?2
            ",
        )?;
        let rows = stmt
            .query_map(params![user_id, sql_limit(limit)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(user_id, raw_query, canonical_title, timestamp)| {
                let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                    .map_err(|e| BotError::Storage(format!("Invalid timestamp {timestamp:?}: {e}")))?
                    .with_timezone(&Utc);
                Ok(SearchHistoryEntry {
                    user_id,
                    raw_query,
                    canonical_title,
                    timestamp,
                })
            })
            .collect()
    }

    /// Most searched titles for a user, highest count first.
    ///
    /// Equal counts are ordered by title.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the query fails.
    pub fn stats(&self, user_id: &str, limit: usize) -> Result<Vec<MovieStat>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r"
            SELECT user_id, movie_title, count
            FROM movie_stats
            WHERE user_id = ?1
            ORDER BY count DESC, movie_title ASC
            LIMIT ?2
            ",
        )?;
        let stats = stmt
            .query_map(params![user_id, sql_limit(limit)], |row| {
                Ok(MovieStat {
                    user_id: row.get(0)?,
                    movie_title: row.get(1)?,
                    count: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(stats)
    }
}

fn insert_search(
    conn: &Connection,
    user_id: &str,
    raw_query: &str,
    canonical_title: &str,
    at: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO search_history (user_id, query, movie_title, timestamp) VALUES (?1, ?2, ?3, ?4)",
        params![
            user_id,
            raw_query,
            canonical_title,
            at.to_rfc3339_opts(SecondsFormat::Micros, true),
        ],
    )?;
    Ok(())
}

fn bump_stat(conn: &Connection, user_id: &str, canonical_title: &str) -> Result<()> {
    conn.execute(
        r"
        INSERT INTO movie_stats (movie_title, user_id, count) VALUES (?1, ?2, 1)
        ON CONFLICT (movie_title, user_id) DO UPDATE SET count = count + 1
        ",
        params![canonical_title, user_id],
    )?;
    Ok(())
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use chrono::Duration;
    use tempfile::TempDir;

    use super::*;

    fn titles(stats: &[MovieStat]) -> Vec<(&str, u32)> {
        stats
            .iter()
            .map(|stat| (stat.movie_title.as_str(), stat.count))
            .collect()
    }

    #[test]
    fn history_is_capped_and_newest_first() -> Result<()> {
        let store = InteractionStore::open_in_memory()?;
        for i in 0..11 {
            store.record_search("u", &format!("venom {i}"), "Venom (2018)")?;
        }

        let history = store.history("u", DEFAULT_LIMIT)?;
        assert_eq!(history.len(), 10);
        assert_eq!(history[0].raw_query, "venom 10");
        assert_eq!(history[9].raw_query, "venom 1");
        assert!(history.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
        Ok(())
    }

    #[test]
    fn history_orders_by_timestamp() -> Result<()> {
        let store = InteractionStore::open_in_memory()?;
        let now = Utc::now();
        store.record_search_at("u", "late", "B (2001)", now)?;
        store.record_search_at("u", "early", "A (2000)", now - Duration::hours(1))?;

        let history = store.history("u", DEFAULT_LIMIT)?;
        let queries: Vec<_> = history.iter().map(|e| e.raw_query.as_str()).collect();
        assert_eq!(queries, vec!["late", "early"]);
        Ok(())
    }

    #[test]
    fn history_is_per_user() -> Result<()> {
        let store = InteractionStore::open_in_memory()?;
        store.record_search("alice", "dune", "Дюна (2021)")?;
        store.record_search("bob", "venom", "Веном (2018)")?;

        let history = store.history("alice", DEFAULT_LIMIT)?;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].canonical_title, "Дюна (2021)");
        assert!(store.history("carol", DEFAULT_LIMIT)?.is_empty());
        Ok(())
    }

    #[test]
    fn stats_count_and_order() -> Result<()> {
        let store = InteractionStore::open_in_memory()?;
        store.increment_stat("u", "Dune")?;
        store.increment_stat("u", "Dune")?;
        store.increment_stat("u", "Arrival")?;

        let stats = store.stats("u", DEFAULT_LIMIT)?;
        assert_eq!(titles(&stats), vec![("Dune", 2), ("Arrival", 1)]);
        Ok(())
    }

    #[test]
    fn stats_ties_break_by_title() -> Result<()> {
        let store = InteractionStore::open_in_memory()?;
        store.increment_stat("u", "Zodiac")?;
        store.increment_stat("u", "Alien")?;
        store.increment_stat("u", "Memento")?;

        let stats = store.stats("u", 2)?;
        assert_eq!(titles(&stats), vec![("Alien", 1), ("Memento", 1)]);
        Ok(())
    }

    #[test]
    fn concurrent_increments_are_not_lost() -> Result<()> {
        let store = Arc::new(InteractionStore::open_in_memory()?);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..25 {
                        store.increment_stat("u", "Dune").expect("increment");
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker thread");
        }

        let stats = store.stats("u", DEFAULT_LIMIT)?;
        assert_eq!(titles(&stats), vec![("Dune", 200)]);
        Ok(())
    }

    #[test]
    fn record_writes_history_and_stat_together() -> Result<()> {
        let store = InteractionStore::open_in_memory()?;
        store.record("u", "dune", "Дюна (2021)")?;
        store.record("u", "дюна", "Дюна (2021)")?;

        assert_eq!(store.history("u", DEFAULT_LIMIT)?.len(), 2);
        assert_eq!(titles(&store.stats("u", DEFAULT_LIMIT)?), vec![("Дюна (2021)", 2)]);
        Ok(())
    }

    #[test]
    fn failed_stat_bump_rolls_back_history() -> Result<()> {
        let store = InteractionStore::open_in_memory()?;
        store.conn()?.execute_batch("DROP TABLE movie_stats;")?;

        assert!(matches!(
            store.record("u", "dune", "Дюна (2021)"),
            Err(BotError::Storage(_))
        ));
        assert!(store.history("u", DEFAULT_LIMIT)?.is_empty());
        Ok(())
    }

    #[test]
    fn data_survives_reopen() -> Result<()> {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("nested").join("cinema_bot.db");

        {
            let store = InteractionStore::open(&path)?;
            store.record_search("u", "arrival", "Прибытие (2016)")?;
            store.increment_stat("u", "Прибытие (2016)")?;
        }

        let store = InteractionStore::open(&path)?;
        store.increment_stat("u", "Прибытие (2016)")?;
        assert_eq!(store.history("u", DEFAULT_LIMIT)?.len(), 1);
        assert_eq!(titles(&store.stats("u", DEFAULT_LIMIT)?), vec![("Прибытие (2016)", 2)]);
        Ok(())
    }
}
