use anyhow::{anyhow, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{
    query::Query,
    sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use shared::domain::{
    AdmissionStatus, AuditLog, AuditLogId, Batch, BatchId, Candidate, CandidateId, PaymentStatus, User,
    UserId, UserRole,
};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// A user row together with its credential hash. Never leaves the server.
#[derive(Debug, Clone)]
pub struct StoredCredentials {
    pub user: User,
    pub password_hash: String,
}

const CANDIDATE_COLUMNS: &str = "id, batch_id, executive_id, status, payment_status, notes, \
     personal_details, contact_details, address_details, travel_details, documents, \
     payment_history, created_at, updated_at";

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        // every in-memory connection is a separate database
        let pool_options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(connect_options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    /// True when the core tables exist.
    pub async fn schema_ready(&self) -> Result<bool> {
        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master
             WHERE type = 'table' AND name IN ('users', 'batches', 'candidates', 'audit_logs')",
        )
        .fetch_one(&self.pool)
        .await
        .context("failed to inspect sqlite schema")?;
        Ok(tables == 4)
    }

    pub async fn upsert_user(&self, user: &User, password_hash: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, username, name, role, is_active, password_hash)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                username = excluded.username,
                name = excluded.name,
                role = excluded.role,
                is_active = excluded.is_active,
                password_hash = excluded.password_hash",
        )
        .bind(user.id.as_str())
        .bind(&user.username)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to save user {}", user.id))?;
        Ok(())
    }

    /// Updates everything except username and credentials. Returns false for unknown ids.
    pub async fn update_user_profile(&self, user: &User) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET name = ?, role = ?, is_active = ? WHERE id = ?")
            .bind(&user.name)
            .bind(user.role.as_str())
            .bind(user.is_active)
            .bind(user.id.as_str())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to update user {}", user.id))?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_user(&self, user_id: &UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query("SELECT id, username, name, role, is_active FROM users ORDER BY role, name")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(user_from_row).collect()
    }

    pub async fn get_user(&self, user_id: &UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, username, name, role, is_active FROM users WHERE id = ?")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn find_credentials(&self, username: &str) -> Result<Option<StoredCredentials>> {
        let row = sqlx::query(
            "SELECT id, username, name, role, is_active, password_hash FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| {
            Ok(StoredCredentials {
                user: user_from_row(&r)?,
                password_hash: r.get::<String, _>("password_hash"),
            })
        })
        .transpose()
    }

    /// Whether `username` belongs to a user other than `except`.
    pub async fn username_taken(&self, username: &str, except: &UserId) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ? AND id != ?")
            .bind(username)
            .bind(except.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    pub async fn count_users(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?)
    }

    /// Replaces the whole row, like `REPLACE INTO`.
    pub async fn upsert_batch(&self, batch: &Batch) -> Result<()> {
        sqlx::query(
            "INSERT INTO batches (id, name, max_seats, created_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                max_seats = excluded.max_seats,
                created_at = excluded.created_at",
        )
        .bind(batch.id.as_str())
        .bind(&batch.name)
        .bind(i64::from(batch.max_seats))
        .bind(batch.created_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to save batch {}", batch.id))?;
        Ok(())
    }

    pub async fn delete_batch(&self, batch_id: &BatchId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM batches WHERE id = ?")
            .bind(batch_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_batches(&self) -> Result<Vec<Batch>> {
        let rows = sqlx::query("SELECT id, name, max_seats, created_at FROM batches ORDER BY created_at, id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(batch_from_row).collect()
    }

    pub async fn get_batch(&self, batch_id: &BatchId) -> Result<Option<Batch>> {
        let row = sqlx::query("SELECT id, name, max_seats, created_at FROM batches WHERE id = ?")
            .bind(batch_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(batch_from_row).transpose()
    }

    /// Insert or overwrite by id. `created_at` and `executive_id` of an
    /// existing row are kept.
    pub async fn upsert_candidate(&self, candidate: &Candidate) -> Result<()> {
        candidate_upsert(candidate)?
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to save candidate {}", candidate.id))?;
        Ok(())
    }

    pub async fn get_candidate(&self, candidate_id: &CandidateId) -> Result<Option<Candidate>> {
        let row = sqlx::query(&format!("SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE id = ?"))
            .bind(candidate_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(candidate_from_row).transpose()
    }

    pub async fn list_candidates(&self) -> Result<Vec<Candidate>> {
        let rows = sqlx::query(&format!(
            "SELECT {CANDIDATE_COLUMNS} FROM candidates ORDER BY created_at DESC, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(candidate_from_row).collect()
    }

    /// Read-modify-write of one candidate under `BEGIN IMMEDIATE`, so
    /// concurrent writers queue on the write lock instead of failing or
    /// overwriting each other. `prepare` sees the stored row (if any); its
    /// `Err` rolls back and is handed back untouched.
    pub async fn write_candidate<E, F>(
        &self,
        candidate_id: &CandidateId,
        prepare: F,
    ) -> Result<std::result::Result<Candidate, E>>
    where
        F: FnOnce(Option<Candidate>) -> std::result::Result<Candidate, E>,
    {
        let mut tx = self
            .pool
            .begin_with("BEGIN IMMEDIATE")
            .await
            .context("failed to open write transaction")?;
        let row = sqlx::query(&format!("SELECT {CANDIDATE_COLUMNS} FROM candidates WHERE id = ?"))
            .bind(candidate_id.as_str())
            .fetch_optional(&mut *tx)
            .await?;
        let existing = row.as_ref().map(candidate_from_row).transpose()?;

        let candidate = match prepare(existing) {
            Ok(candidate) => candidate,
            Err(rejected) => {
                tx.rollback().await?;
                return Ok(Err(rejected));
            }
        };
        candidate_upsert(&candidate)?
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to save candidate {}", candidate.id))?;
        tx.commit().await?;
        Ok(Ok(candidate))
    }

    pub async fn insert_audit_log(&self, log: &AuditLog) -> Result<()> {
        sqlx::query(
            "INSERT INTO audit_logs (id, timestamp, action, user_id, user_name, details)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(log.id.as_str())
        .bind(log.timestamp)
        .bind(&log.action)
        .bind(log.user_id.as_str())
        .bind(&log.user_name)
        .bind(&log.details)
        .execute(&self.pool)
        .await
        .context("failed to write audit log")?;
        Ok(())
    }

    /// Newest first.
    pub async fn list_audit_logs(&self, limit: u32) -> Result<Vec<AuditLog>> {
        let rows = sqlx::query(
            "SELECT id, timestamp, action, user_id, user_name, details
             FROM audit_logs
             ORDER BY timestamp DESC, rowid DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| AuditLog {
                id: AuditLogId(r.get::<String, _>(0)),
                timestamp: r.get::<i64, _>(1),
                action: r.get::<String, _>(2),
                user_id: UserId(r.get::<String, _>(3)),
                user_name: r.get::<String, _>(4),
                details: r.get::<String, _>(5),
            })
            .collect())
    }
}

fn candidate_upsert(candidate: &Candidate) -> Result<Query<'_, Sqlite, SqliteArguments<'_>>> {
    Ok(sqlx::query(
        "INSERT INTO candidates (id, batch_id, executive_id, status, payment_status, notes,
             personal_details, contact_details, address_details, travel_details, documents,
             payment_history, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            batch_id = excluded.batch_id,
            status = excluded.status,
            payment_status = excluded.payment_status,
            notes = excluded.notes,
            personal_details = excluded.personal_details,
            contact_details = excluded.contact_details,
            address_details = excluded.address_details,
            travel_details = excluded.travel_details,
            documents = excluded.documents,
            payment_history = excluded.payment_history,
            updated_at = excluded.updated_at",
    )
    .bind(candidate.id.as_str())
    .bind(candidate.batch_id.as_str())
    .bind(candidate.executive_id.as_str())
    .bind(candidate.status.as_str())
    .bind(candidate.payment_status.as_str())
    .bind(&candidate.notes)
    .bind(to_json(&candidate.personal_details)?)
    .bind(to_json(&candidate.contact_details)?)
    .bind(to_json(&candidate.address_details)?)
    .bind(to_json(&candidate.travel_details)?)
    .bind(to_json(&candidate.documents)?)
    .bind(to_json(&candidate.payment_history)?)
    .bind(candidate.created_at)
    .bind(candidate.updated_at))
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).context("failed to encode json column")
}

fn from_json<T: DeserializeOwned>(row: &SqliteRow, column: &str) -> Result<T> {
    let raw: String = row.try_get(column)?;
    serde_json::from_str(&raw).with_context(|| format!("corrupt json in column {column}"))
}

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: UserId(row.try_get("id")?),
        username: row.try_get("username")?,
        name: row.try_get("name")?,
        role: UserRole::parse(&role).ok_or_else(|| anyhow!("unknown user role '{role}'"))?,
        is_active: row.try_get("is_active")?,
    })
}

fn batch_from_row(row: &SqliteRow) -> Result<Batch> {
    let max_seats: i64 = row.try_get("max_seats")?;
    Ok(Batch {
        id: BatchId(row.try_get("id")?),
        name: row.try_get("name")?,
        max_seats: u32::try_from(max_seats).context("max_seats out of range")?,
        created_at: row.try_get("created_at")?,
    })
}

fn candidate_from_row(row: &SqliteRow) -> Result<Candidate> {
    let status: String = row.try_get("status")?;
    let payment_status: String = row.try_get("payment_status")?;
    Ok(Candidate {
        id: CandidateId(row.try_get("id")?),
        batch_id: BatchId(row.try_get("batch_id")?),
        executive_id: UserId(row.try_get("executive_id")?),
        status: AdmissionStatus::parse(&status)
            .ok_or_else(|| anyhow!("unknown admission status '{status}'"))?,
        payment_status: PaymentStatus::parse(&payment_status)
            .ok_or_else(|| anyhow!("unknown payment status '{payment_status}'"))?,
        notes: row.try_get("notes")?,
        personal_details: from_json(row, "personal_details")?,
        contact_details: from_json(row, "contact_details")?,
        address_details: from_json(row, "address_details")?,
        travel_details: from_json(row, "travel_details")?,
        documents: from_json(row, "documents")?,
        payment_history: from_json(row, "payment_history")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.contains(":memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
