//! SQLite store for essence-message backups.
//!
//! Each group keeps at most [`MAX_BACKUPS_PER_GROUP`] snapshots; exactly one
//! of them is "current". A new backup carries over messages that were in
//! the previous current snapshot but are missing from the freshly fetched
//! essence list, so messages removed from the group's essence board are
//! still preserved.

use crate::db::init_essence_db;
use crate::types::error::Result;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

pub const MAX_BACKUPS_PER_GROUP: i64 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct BackupRecord {
    pub id: i64,
    pub group_id: i64,
    pub backup_time: i64,
    pub is_current: bool,
}

/// A message to insert, already flattened for storage. `content` is the
/// message's segment list serialized as JSON.
#[derive(Debug, Clone, Default)]
pub struct NewEssenceMessage {
    pub message_id: String,
    pub message_seq: String,
    pub sender_id: String,
    pub sender_nick: String,
    pub operator_id: String,
    pub operator_nick: String,
    pub operator_time: i64,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct StoredEssenceMessage {
    pub message_id: String,
    pub message_seq: String,
    pub sender_id: String,
    pub sender_nick: String,
    pub operator_id: String,
    pub operator_nick: String,
    pub operator_time: i64,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DateFilter {
    /// `YYYY-MM-DD`
    Day(String),
    /// `YYYY-MM`
    Month(String),
    /// `YYYY`
    Year(String),
}

/// Filters for [`EssenceStore::query_messages`]. `limit: None` returns
/// everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EssenceQuery {
    pub date: Option<DateFilter>,
    pub sender_id: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackupSummary {
    pub backup_id: i64,
    /// Messages stored from the fresh essence list.
    pub stored: usize,
    /// Messages copied from the previous current backup.
    pub carried_over: usize,
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[derive(Clone)]
pub struct EssenceStore {
    pool: SqlitePool,
}

impl EssenceStore {
    pub async fn open(db_path: &Path) -> Result<Self> {
        let pool = init_essence_db(db_path).await?;
        Ok(Self { pool })
    }

    /// The group's current backup, if any.
    pub async fn current_backup(&self, group_id: i64) -> Result<Option<BackupRecord>> {
        let row = sqlx::query(
            "SELECT id, group_id, backup_time, is_current FROM backup_records
             WHERE group_id = ? AND is_current = 1
             ORDER BY backup_time DESC, id DESC LIMIT 1",
        )
        .bind(group_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| BackupRecord {
            id: row.get(0),
            group_id: row.get(1),
            backup_time: row.get(2),
            is_current: row.get::<i64, _>(3) != 0,
        }))
    }

    pub async fn count_backups(&self, group_id: i64) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) FROM backup_records WHERE group_id = ?")
            .bind(group_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get(0))
    }

    /// Create a new current backup from a freshly fetched essence list.
    /// Runs as one transaction: rotate out the oldest backup when the cap
    /// is reached, retire the previous current backup, insert the fresh
    /// messages, then carry over previous messages missing from the list.
    pub async fn replace_backup(
        &self,
        group_id: i64,
        fresh: &[NewEssenceMessage],
    ) -> Result<BackupSummary> {
        let mut tx = self.pool.begin().await?;

        let count: i64 = sqlx::query("SELECT COUNT(*) FROM backup_records WHERE group_id = ?")
            .bind(group_id)
            .fetch_one(&mut *tx)
            .await?
            .get(0);
        if count >= MAX_BACKUPS_PER_GROUP {
            let oldest: Option<i64> = sqlx::query(
                "SELECT id FROM backup_records WHERE group_id = ?
                 ORDER BY backup_time ASC, id ASC LIMIT 1",
            )
            .bind(group_id)
            .fetch_optional(&mut *tx)
            .await?
            .map(|row| row.get(0));
            if let Some(oldest_id) = oldest {
                sqlx::query("DELETE FROM essence_messages WHERE backup_id = ?")
                    .bind(oldest_id)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM backup_records WHERE id = ?")
                    .bind(oldest_id)
                    .execute(&mut *tx)
                    .await?;
                debug!(group_id, backup_id = oldest_id, "Rotated out oldest backup");
            }
        }

        let previous: Option<i64> = sqlx::query(
            "SELECT id FROM backup_records WHERE group_id = ? AND is_current = 1
             ORDER BY backup_time DESC, id DESC LIMIT 1",
        )
        .bind(group_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| row.get(0));

        sqlx::query("UPDATE backup_records SET is_current = 0 WHERE group_id = ?")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        let backup_id: i64 = sqlx::query(
            "INSERT INTO backup_records (group_id, backup_time, is_current) VALUES (?, ?, 1)",
        )
        .bind(group_id)
        .bind(now_unix())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let mut fresh_ids = HashSet::new();
        for message in fresh {
            fresh_ids.insert(message.message_id.clone());
            insert_message(&mut tx, backup_id, group_id, message).await?;
        }

        let mut carried_over = 0;
        if let Some(previous_id) = previous {
            let rows = sqlx::query(
                "SELECT message_id, message_seq, sender_id, sender_nick,
                        operator_id, operator_nick, operator_time, content
                 FROM essence_messages WHERE backup_id = ?",
            )
            .bind(previous_id)
            .fetch_all(&mut *tx)
            .await?;
            for row in rows {
                let message = message_from_row(&row);
                if !fresh_ids.contains(&message.message_id) {
                    insert_message(&mut tx, backup_id, group_id, &to_new(&message)).await?;
                    carried_over += 1;
                }
            }
        }

        tx.commit().await?;
        debug!(
            group_id,
            backup_id,
            stored = fresh.len(),
            carried_over,
            "Essence backup created"
        );
        Ok(BackupSummary {
            backup_id,
            stored: fresh.len(),
            carried_over,
        })
    }

    /// Append one message to an existing backup.
    pub async fn add_message(
        &self,
        backup_id: i64,
        group_id: i64,
        message: &NewEssenceMessage,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        insert_message(&mut tx, backup_id, group_id, message).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Messages of one backup, newest operator-time first, filtered.
    pub async fn query_messages(
        &self,
        backup_id: i64,
        group_id: i64,
        query: &EssenceQuery,
    ) -> Result<Vec<StoredEssenceMessage>> {
        let mut sql = String::from(
            "SELECT message_id, message_seq, sender_id, sender_nick,
                    operator_id, operator_nick, operator_time, content
             FROM essence_messages WHERE backup_id = ? AND group_id = ?",
        );
        match &query.date {
            Some(DateFilter::Day(_)) => {
                sql.push_str(" AND date(operator_time, 'unixepoch') = ?");
            }
            Some(DateFilter::Month(_)) => {
                sql.push_str(" AND strftime('%Y-%m', operator_time, 'unixepoch') = ?");
            }
            Some(DateFilter::Year(_)) => {
                sql.push_str(" AND strftime('%Y', operator_time, 'unixepoch') = ?");
            }
            None => {}
        }
        if query.sender_id.is_some() {
            sql.push_str(" AND sender_id = ?");
        }
        sql.push_str(" ORDER BY operator_time DESC, id DESC");
        if query.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut q = sqlx::query(&sql).bind(backup_id).bind(group_id);
        if let Some(filter) = &query.date {
            let (DateFilter::Day(value) | DateFilter::Month(value) | DateFilter::Year(value)) =
                filter;
            q = q.bind(value.clone());
        }
        if let Some(sender_id) = &query.sender_id {
            q = q.bind(sender_id.clone());
        }
        if let Some(limit) = query.limit {
            q = q.bind(limit);
        }

        let rows = q.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(message_from_row).collect())
    }
}

async fn insert_message(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    backup_id: i64,
    group_id: i64,
    message: &NewEssenceMessage,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO essence_messages
         (backup_id, group_id, message_id, message_seq, sender_id, sender_nick,
          operator_id, operator_nick, operator_time, content)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(backup_id)
    .bind(group_id)
    .bind(&message.message_id)
    .bind(&message.message_seq)
    .bind(&message.sender_id)
    .bind(&message.sender_nick)
    .bind(&message.operator_id)
    .bind(&message.operator_nick)
    .bind(message.operator_time)
    .bind(&message.content)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn message_from_row(row: &sqlx::sqlite::SqliteRow) -> StoredEssenceMessage {
    StoredEssenceMessage {
        message_id: row.get(0),
        message_seq: row.get(1),
        sender_id: row.get(2),
        sender_nick: row.get(3),
        operator_id: row.get(4),
        operator_nick: row.get(5),
        operator_time: row.get(6),
        content: row.get(7),
    }
}

fn to_new(message: &StoredEssenceMessage) -> NewEssenceMessage {
    NewEssenceMessage {
        message_id: message.message_id.clone(),
        message_seq: message.message_seq.clone(),
        sender_id: message.sender_id.clone(),
        sender_nick: message.sender_nick.clone(),
        operator_id: message.operator_id.clone(),
        operator_nick: message.operator_nick.clone(),
        operator_time: message.operator_time,
        content: message.content.clone(),
    }
}
