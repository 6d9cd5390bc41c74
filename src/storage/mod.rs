// src/storage/mod.rs

//! On-device record store.
//!
//! Each table is keyed by a single numeric id and every write touches one
//! key in one statement, so an abandoned operation never leaves a record
//! half-written.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::{
    FromRow, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    types::Json,
};
use std::str::FromStr;

use crate::error::AppResult;

/// An attempt answered on the device, keyed by attempt id.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OfflineAttempt {
    pub id: i64,
    pub quizid: i64,
    pub courseid: i64,
    pub userid: i64,
    pub attempt: i64,
    pub currentpage: i64,
    pub timefinish: i64,
    /// The user finished the attempt while offline.
    pub finishedoffline: bool,
    /// Question field name to submitted value, not yet sent to the site.
    pub answers: Json<BTreeMap<String, String>>,
    pub timemodified: i64,
}

impl OfflineAttempt {
    pub fn new(id: i64, quizid: i64, courseid: i64, userid: i64, attempt: i64, now: i64) -> Self {
        Self {
            id,
            quizid,
            courseid,
            userid,
            attempt,
            currentpage: 0,
            timefinish: 0,
            finishedoffline: false,
            answers: Json(BTreeMap::new()),
            timemodified: now,
        }
    }

    /// Pending answers or a pending finish still have to reach the site.
    pub fn has_pending_data(&self) -> bool {
        !self.answers.0.is_empty() || self.finishedoffline
    }
}

#[derive(Debug, FromRow)]
struct PasswordRow {
    password: String,
}

#[derive(Debug, FromRow)]
struct SyncTimeRow {
    time: i64,
}

/// A quiz that has locally stored attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct QuizRef {
    pub quizid: i64,
    pub courseid: i64,
}

#[derive(Clone)]
pub struct LocalStore {
    pool: SqlitePool,
}

impl LocalStore {
    /// Opens (creating if needed) the store at `url` and applies migrations.
    pub async fn connect(url: &str) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// A private store living in memory, for tests and throwaway sessions.
    pub async fn in_memory() -> AppResult<Self> {
        // Every connection to `sqlite::memory:` is a separate database, so
        // the pool must keep exactly one connection alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> AppResult<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn get_password(&self, quiz_id: i64) -> AppResult<Option<String>> {
        let row = sqlx::query_as::<_, PasswordRow>(
            "SELECT password FROM quiz_access_passwords WHERE id = ?",
        )
        .bind(quiz_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.password))
    }

    pub async fn store_password(&self, quiz_id: i64, password: &str, now: i64) -> AppResult<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO quiz_access_passwords (id, password, timemodified) VALUES (?, ?, ?)",
        )
        .bind(quiz_id)
        .bind(password)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn remove_password(&self, quiz_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM quiz_access_passwords WHERE id = ?")
            .bind(quiz_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn get_offline_attempt(&self, attempt_id: i64) -> AppResult<Option<OfflineAttempt>> {
        let attempt = sqlx::query_as::<_, OfflineAttempt>(
            "SELECT * FROM quiz_offline_attempts WHERE id = ?",
        )
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attempt)
    }

    /// Stored attempts of one user for a quiz, oldest attempt first.
    pub async fn offline_attempts_for_quiz(
        &self,
        quiz_id: i64,
        user_id: i64,
    ) -> AppResult<Vec<OfflineAttempt>> {
        let attempts = sqlx::query_as::<_, OfflineAttempt>(
            "SELECT * FROM quiz_offline_attempts WHERE quizid = ? AND userid = ? ORDER BY attempt ASC",
        )
        .bind(quiz_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(attempts)
    }

    pub async fn save_offline_attempt(&self, attempt: &OfflineAttempt) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO quiz_offline_attempts
                (id, quizid, courseid, userid, attempt, currentpage, timefinish, finishedoffline, answers, timemodified)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(attempt.id)
        .bind(attempt.quizid)
        .bind(attempt.courseid)
        .bind(attempt.userid)
        .bind(attempt.attempt)
        .bind(attempt.currentpage)
        .bind(attempt.timefinish)
        .bind(attempt.finishedoffline)
        .bind(&attempt.answers)
        .bind(attempt.timemodified)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn remove_offline_attempt(&self, attempt_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM quiz_offline_attempts WHERE id = ?")
            .bind(attempt_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Quizzes with at least one stored attempt for the user.
    pub async fn quizzes_with_offline_data(&self, user_id: i64) -> AppResult<Vec<QuizRef>> {
        let quizzes = sqlx::query_as::<_, QuizRef>(
            "SELECT DISTINCT quizid, courseid FROM quiz_offline_attempts WHERE userid = ? ORDER BY quizid",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(quizzes)
    }

    /// Last successful sync of the quiz, 0 when it never synced.
    pub async fn get_sync_time(&self, quiz_id: i64) -> AppResult<i64> {
        let row = sqlx::query_as::<_, SyncTimeRow>("SELECT time FROM quiz_sync_times WHERE id = ?")
            .bind(quiz_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.time).unwrap_or(0))
    }

    pub async fn set_sync_time(&self, quiz_id: i64, time: i64) -> AppResult<()> {
        sqlx::query("INSERT OR REPLACE INTO quiz_sync_times (id, time) VALUES (?, ?)")
            .bind(quiz_id)
            .bind(time)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_password_round_trip() {
        let store = LocalStore::in_memory().await.unwrap();

        assert_eq!(store.get_password(4).await.unwrap(), None);

        store.store_password(4, "abc", 100).await.unwrap();
        store.store_password(4, "def", 200).await.unwrap();
        assert_eq!(store.get_password(4).await.unwrap().as_deref(), Some("def"));
        assert_eq!(store.get_password(5).await.unwrap(), None);

        store.remove_password(4).await.unwrap();
        assert_eq!(store.get_password(4).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_offline_attempts_by_quiz() {
        let store = LocalStore::in_memory().await.unwrap();

        let mut first = OfflineAttempt::new(10, 4, 2, 7, 1, 100);
        first.answers.0.insert("q1:1_answer".to_string(), "3".to_string());
        store.save_offline_attempt(&first).await.unwrap();
        store
            .save_offline_attempt(&OfflineAttempt::new(11, 4, 2, 7, 2, 100))
            .await
            .unwrap();
        store
            .save_offline_attempt(&OfflineAttempt::new(12, 5, 2, 7, 1, 100))
            .await
            .unwrap();

        let attempts = store.offline_attempts_for_quiz(4, 7).await.unwrap();
        assert_eq!(attempts.iter().map(|a| a.id).collect::<Vec<_>>(), vec![10, 11]);
        assert!(attempts[0].has_pending_data());
        assert!(!attempts[1].has_pending_data());

        let quizzes = store.quizzes_with_offline_data(7).await.unwrap();
        assert_eq!(
            quizzes,
            vec![QuizRef { quizid: 4, courseid: 2 }, QuizRef { quizid: 5, courseid: 2 }]
        );

        store.remove_offline_attempt(10).await.unwrap();
        assert!(store.get_offline_attempt(10).await.unwrap().is_none());
        assert!(store.get_offline_attempt(11).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sync_time_defaults_to_zero() {
        let store = LocalStore::in_memory().await.unwrap();
        assert_eq!(store.get_sync_time(4).await.unwrap(), 0);

        store.set_sync_time(4, 1234).await.unwrap();
        assert_eq!(store.get_sync_time(4).await.unwrap(), 1234);
    }
}
