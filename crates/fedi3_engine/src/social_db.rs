/*
 * SPDX-FileCopyrightText: 2026 RedHunt07 - FEDI3 Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;
use crate::model::{
    Account, AccountStats, Block, Follow, FollowRequest, InteractionApproval, List, ListEntry,
    Notification, NotificationType, Poll, PollVote, RelationFilter, Report, StatsDelta, Status,
    StatusFave, ThreadMute, UserMute,
};
use crate::paging::{Order, Page};
use crate::storage::Storage;

/// SQLite storage. Rows keep their full JSON next to the columns that are
/// queried on; a connection is opened per call on the blocking pool.
#[derive(Clone)]
pub struct SocialDb {
    path: PathBuf,
}

const SCHEMA: &str = r#"
    PRAGMA journal_mode=WAL;

    CREATE TABLE IF NOT EXISTS accounts (
      id TEXT PRIMARY KEY,
      uri TEXT NOT NULL UNIQUE,
      url TEXT NOT NULL,
      domain TEXT NULL,
      json BLOB NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_accounts_url ON accounts(url);

    CREATE TABLE IF NOT EXISTS account_stats (
      account_id TEXT PRIMARY KEY,
      statuses INTEGER NOT NULL DEFAULT 0,
      followers INTEGER NOT NULL DEFAULT 0,
      following INTEGER NOT NULL DEFAULT 0,
      follow_requests INTEGER NOT NULL DEFAULT 0,
      last_status_at_ms INTEGER NULL
    );

    CREATE TABLE IF NOT EXISTS statuses (
      id TEXT PRIMARY KEY,
      uri TEXT NOT NULL UNIQUE,
      account_id TEXT NOT NULL,
      boost_of_id TEXT NULL,
      json BLOB NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_statuses_account ON statuses(account_id, id);
    CREATE INDEX IF NOT EXISTS idx_statuses_boost ON statuses(boost_of_id, account_id);

    CREATE TABLE IF NOT EXISTS polls (
      id TEXT PRIMARY KEY,
      json BLOB NOT NULL
    );

    CREATE TABLE IF NOT EXISTS poll_votes (
      id TEXT PRIMARY KEY,
      poll_id TEXT NOT NULL,
      account_id TEXT NOT NULL,
      json BLOB NOT NULL,
      UNIQUE(poll_id, account_id)
    );

    CREATE TABLE IF NOT EXISTS follows (
      id TEXT PRIMARY KEY,
      uri TEXT NOT NULL UNIQUE,
      account_id TEXT NOT NULL,
      target_account_id TEXT NOT NULL,
      json BLOB NOT NULL,
      UNIQUE(account_id, target_account_id)
    );
    CREATE INDEX IF NOT EXISTS idx_follows_target ON follows(target_account_id);

    CREATE TABLE IF NOT EXISTS follow_requests (
      id TEXT PRIMARY KEY,
      uri TEXT NOT NULL UNIQUE,
      account_id TEXT NOT NULL,
      target_account_id TEXT NOT NULL,
      json BLOB NOT NULL,
      UNIQUE(account_id, target_account_id)
    );
    CREATE INDEX IF NOT EXISTS idx_follow_requests_target ON follow_requests(target_account_id, id);

    CREATE TABLE IF NOT EXISTS blocks (
      id TEXT PRIMARY KEY,
      uri TEXT NOT NULL UNIQUE,
      account_id TEXT NOT NULL,
      target_account_id TEXT NOT NULL,
      json BLOB NOT NULL,
      UNIQUE(account_id, target_account_id)
    );
    CREATE INDEX IF NOT EXISTS idx_blocks_target ON blocks(target_account_id);

    CREATE TABLE IF NOT EXISTS status_faves (
      id TEXT PRIMARY KEY,
      uri TEXT NOT NULL UNIQUE,
      account_id TEXT NOT NULL,
      status_id TEXT NOT NULL,
      json BLOB NOT NULL,
      UNIQUE(account_id, status_id)
    );
    CREATE INDEX IF NOT EXISTS idx_status_faves_status ON status_faves(status_id);

    CREATE TABLE IF NOT EXISTS notifications (
      id TEXT PRIMARY KEY,
      type TEXT NOT NULL,
      target_account_id TEXT NOT NULL,
      origin_account_id TEXT NOT NULL,
      status_id TEXT NOT NULL DEFAULT '',
      json BLOB NOT NULL,
      UNIQUE(type, target_account_id, origin_account_id, status_id)
    );
    CREATE INDEX IF NOT EXISTS idx_notifications_target ON notifications(target_account_id, id);
    CREATE INDEX IF NOT EXISTS idx_notifications_status ON notifications(status_id);

    CREATE TABLE IF NOT EXISTS user_mutes (
      id TEXT PRIMARY KEY,
      account_id TEXT NOT NULL,
      target_account_id TEXT NOT NULL,
      json BLOB NOT NULL,
      UNIQUE(account_id, target_account_id)
    );

    CREATE TABLE IF NOT EXISTS thread_mutes (
      id TEXT PRIMARY KEY,
      thread_id TEXT NOT NULL,
      account_id TEXT NOT NULL,
      json BLOB NOT NULL,
      UNIQUE(thread_id, account_id)
    );

    CREATE TABLE IF NOT EXISTS interaction_approvals (
      id TEXT PRIMARY KEY,
      uri TEXT NOT NULL UNIQUE,
      json BLOB NOT NULL
    );

    CREATE TABLE IF NOT EXISTS reports (
      id TEXT PRIMARY KEY,
      json BLOB NOT NULL
    );

    CREATE TABLE IF NOT EXISTS lists (
      id TEXT PRIMARY KEY,
      account_id TEXT NOT NULL,
      json BLOB NOT NULL
    );

    CREATE TABLE IF NOT EXISTS list_entries (
      id TEXT PRIMARY KEY,
      list_id TEXT NOT NULL,
      follow_id TEXT NOT NULL,
      json BLOB NOT NULL,
      UNIQUE(list_id, follow_id)
    );
    CREATE INDEX IF NOT EXISTS idx_list_entries_follow ON list_entries(follow_id);
"#;

const ACCOUNT_SELECT: &str = r#"
    SELECT a.json, s.statuses, s.followers, s.following, s.follow_requests, s.last_status_at_ms
    FROM accounts a LEFT JOIN account_stats s ON s.account_id = a.id
"#;

impl SocialDb {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let conn =
            Connection::open(&path).with_context(|| format!("open db: {}", path.display()))?;
        conn.execute_batch(SCHEMA)?;
        ensure_columns(&conn, "accounts", &[("moderator", "INTEGER NOT NULL DEFAULT 0")])?;
        Ok(Self { path })
    }

    pub fn health_check(&self) -> Result<()> {
        let conn = Connection::open(&self.path)?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<T> {
            let mut conn = Connection::open(&path)?;
            conn.busy_timeout(Duration::from_secs(5))?;
            f(&mut conn)
        })
        .await
        .context("db task")?
    }

    async fn get_account_where(&self, column: &'static str, value: &str) -> Result<Account> {
        let value = value.to_string();
        self.blocking(move |conn| {
            let sql = format!("{ACCOUNT_SELECT} WHERE a.{column} = ?1 LIMIT 1");
            conn.query_row(&sql, params![value], account_from_row)
                .optional()?
                .ok_or(Error::NotFound)?
        })
        .await
    }

    async fn get_relation<T>(
        &self,
        table: &'static str,
        account_id: &str,
        target_account_id: &str,
    ) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let (a, t) = (account_id.to_string(), target_account_id.to_string());
        self.blocking(move |conn| {
            get_one(
                conn,
                &format!("SELECT json FROM {table} WHERE account_id = ?1 AND target_account_id = ?2"),
                params![a, t],
            )
        })
        .await
    }

    async fn delete_relations_where<T>(
        &self,
        table: &'static str,
        filter: &RelationFilter,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let mut clauses = Vec::new();
        let mut args = Vec::new();
        if let Some(a) = &filter.account_id {
            args.push(a.clone());
            clauses.push(format!("account_id = ?{}", args.len()));
        }
        if let Some(t) = &filter.target_account_id {
            args.push(t.clone());
            clauses.push(format!("target_account_id = ?{}", args.len()));
        }
        if clauses.is_empty() {
            return Err(anyhow!("refusing to delete every row of {table}"));
        }
        let clause = clauses.join(" AND ");
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let rows: Vec<T> = get_many(
                &tx,
                &format!("SELECT json FROM {table} WHERE {clause}"),
                params_from_iter(args.iter()),
            )?;
            tx.execute(
                &format!("DELETE FROM {table} WHERE {clause}"),
                params_from_iter(args.iter()),
            )?;
            tx.commit()?;
            Ok(rows)
        })
        .await
    }

    async fn delete_by_id(&self, table: &'static str, id: &str) -> Result<()> {
        let id = id.to_string();
        self.blocking(move |conn| {
            conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])?;
            Ok(())
        })
        .await
    }

    async fn get_by_id<T>(&self, table: &'static str, id: &str) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let id = id.to_string();
        self.blocking(move |conn| {
            get_one(conn, &format!("SELECT json FROM {table} WHERE id = ?1"), params![id])
        })
        .await
    }

    async fn paged<T>(
        &self,
        base: &'static str,
        args: Vec<String>,
        page: &Page<String>,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let (sql, args) = page_sql(base, args, page);
        let ascending = walks_forward(page);
        self.blocking(move |conn| {
            let mut rows: Vec<T> = get_many(conn, &sql, params_from_iter(args.iter()))?;
            if ascending {
                rows.reverse();
            }
            Ok(rows)
        })
        .await
    }
}

fn ensure_columns(conn: &Connection, table: &str, cols: &[(&str, &str)]) -> Result<()> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
    let mut existing = std::collections::HashSet::new();
    for r in rows {
        existing.insert(r?);
    }
    for (name, ty) in cols {
        if !existing.contains(*name) {
            conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {name} {ty}"), [])?;
        }
    }
    Ok(())
}

/// Appends the page bounds to `base`, which must end in a WHERE clause
/// over a sortable `id` column. Bounds are exclusive.
fn page_sql(base: &str, mut args: Vec<String>, page: &Page<String>) -> (String, Vec<String>) {
    let mut sql = base.to_string();
    if let Some(min) = page.get_min() {
        args.push(min.clone());
        sql.push_str(&format!(" AND id > ?{}", args.len()));
    }
    if let Some(max) = page.get_max() {
        args.push(max.clone());
        sql.push_str(&format!(" AND id < ?{}", args.len()));
    }
    if walks_forward(page) {
        sql.push_str(" ORDER BY id ASC");
    } else {
        sql.push_str(" ORDER BY id DESC");
    }
    if let Some(limit) = page.get_limit() {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    (sql, args)
}

/// Ascending pages with a minimum start right after it; everything else
/// starts from the newest row.
fn walks_forward(page: &Page<String>) -> bool {
    page.order() == Order::Ascending && page.get_min().is_some()
}

fn get_one<T: DeserializeOwned>(
    conn: &Connection,
    sql: &str,
    args: impl rusqlite::Params,
) -> Result<T> {
    let blob: Option<Vec<u8>> = conn.query_row(sql, args, |r| r.get(0)).optional()?;
    let blob = blob.ok_or(Error::NotFound)?;
    Ok(serde_json::from_slice(&blob)?)
}

fn get_many<T: DeserializeOwned>(
    conn: &Connection,
    sql: &str,
    args: impl rusqlite::Params,
) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let blobs = stmt
        .query_map(args, |r| r.get::<_, Vec<u8>>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    blobs
        .iter()
        .map(|b| serde_json::from_slice(b).map_err(Into::into))
        .collect()
}

fn account_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Result<Account>> {
    let blob: Vec<u8> = r.get(0)?;
    let statuses: Option<i64> = r.get(1)?;
    let followers: Option<i64> = r.get(2)?;
    let following: Option<i64> = r.get(3)?;
    let follow_requests: Option<i64> = r.get(4)?;
    let last_status_at_ms: Option<i64> = r.get(5)?;
    Ok(serde_json::from_slice::<Account>(&blob)
        .map(|mut a| {
            a.stats = AccountStats {
                statuses_count: statuses.unwrap_or_default(),
                followers_count: followers.unwrap_or_default(),
                following_count: following.unwrap_or_default(),
                follow_requests_count: follow_requests.unwrap_or_default(),
                last_status_at_ms,
            };
            a
        })
        .map_err(Into::into))
}

fn accounts_from_rows(
    conn: &Connection,
    sql: &str,
    args: impl rusqlite::Params,
) -> Result<Vec<Account>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(args, account_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().collect()
}

/// Constraint violations surface as [`Error::AlreadyExists`].
fn insert_err(e: rusqlite::Error) -> anyhow::Error {
    match &e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::AlreadyExists.into()
        }
        _ => e.into(),
    }
}

fn updated(changed: usize) -> Result<()> {
    if changed == 0 {
        return Err(Error::NotFound.into());
    }
    Ok(())
}

#[async_trait]
impl Storage for SocialDb {
    async fn get_account_by_id(&self, id: &str) -> Result<Account> {
        self.get_account_where("id", id).await
    }

    async fn get_account_by_uri(&self, uri: &str) -> Result<Account> {
        self.get_account_where("uri", uri).await
    }

    async fn get_account_by_url(&self, url: &str) -> Result<Account> {
        self.get_account_where("url", url).await
    }

    async fn put_account(&self, account: &Account) -> Result<()> {
        let json = serde_json::to_vec(account)?;
        let a = account.clone();
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO accounts(id, uri, url, domain, moderator, json) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![a.id, a.uri, a.url, a.domain, a.moderator, json],
            )
            .map_err(insert_err)?;
            tx.execute(
                r#"
                INSERT OR IGNORE INTO account_stats(account_id, statuses, followers, following, follow_requests, last_status_at_ms)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    a.id,
                    a.stats.statuses_count,
                    a.stats.followers_count,
                    a.stats.following_count,
                    a.stats.follow_requests_count,
                    a.stats.last_status_at_ms
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn update_account(&self, account: &Account) -> Result<()> {
        let json = serde_json::to_vec(account)?;
        let a = account.clone();
        self.blocking(move |conn| {
            updated(conn.execute(
                "UPDATE accounts SET uri=?2, url=?3, domain=?4, moderator=?5, json=?6 WHERE id=?1",
                params![a.id, a.uri, a.url, a.domain, a.moderator, json],
            )?)
        })
        .await
    }

    async fn adjust_account_stats(&self, account_id: &str, delta: StatsDelta) -> Result<()> {
        let id = account_id.to_string();
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO account_stats(account_id) VALUES (?1)",
                params![id],
            )?;
            tx.execute(
                r#"
                UPDATE account_stats SET
                  statuses = MAX(0, statuses + ?2),
                  followers = MAX(0, followers + ?3),
                  following = MAX(0, following + ?4),
                  follow_requests = MAX(0, follow_requests + ?5),
                  last_status_at_ms = (CASE WHEN ?6 IS NULL THEN last_status_at_ms
                                            ELSE MAX(COALESCE(last_status_at_ms, 0), ?6) END)
                WHERE account_id = ?1
                "#,
                params![
                    id,
                    delta.statuses,
                    delta.followers,
                    delta.following,
                    delta.follow_requests,
                    delta.last_status_at_ms
                ],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn delete_account(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM accounts WHERE id = ?1", params![id])?;
            tx.execute("DELETE FROM account_stats WHERE account_id = ?1", params![id])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_instance_moderators(&self) -> Result<Vec<Account>> {
        self.blocking(move |conn| {
            accounts_from_rows(
                conn,
                &format!("{ACCOUNT_SELECT} WHERE a.domain IS NULL AND a.moderator = 1"),
                [],
            )
        })
        .await
    }

    async fn get_status_by_id(&self, id: &str) -> Result<Status> {
        self.get_by_id("statuses", id).await
    }

    async fn get_status_by_uri(&self, uri: &str) -> Result<Status> {
        let uri = uri.to_string();
        self.blocking(move |conn| {
            get_one(conn, "SELECT json FROM statuses WHERE uri = ?1", params![uri])
        })
        .await
    }

    async fn get_status_boost(&self, boost_of_id: &str, account_id: &str) -> Result<Status> {
        let (b, a) = (boost_of_id.to_string(), account_id.to_string());
        self.blocking(move |conn| {
            get_one(
                conn,
                "SELECT json FROM statuses WHERE boost_of_id = ?1 AND account_id = ?2 LIMIT 1",
                params![b, a],
            )
        })
        .await
    }

    async fn get_status_boosts(&self, boost_of_id: &str) -> Result<Vec<Status>> {
        let b = boost_of_id.to_string();
        self.blocking(move |conn| {
            get_many(conn, "SELECT json FROM statuses WHERE boost_of_id = ?1", params![b])
        })
        .await
    }

    async fn get_account_status_ids(&self, account_id: &str) -> Result<Vec<String>> {
        let a = account_id.to_string();
        self.blocking(move |conn| {
            let mut stmt =
                conn.prepare("SELECT id FROM statuses WHERE account_id = ?1 ORDER BY id DESC")?;
            let ids = stmt
                .query_map(params![a], |r| r.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ids)
        })
        .await
    }

    async fn put_status(&self, status: &Status) -> Result<()> {
        let json = serde_json::to_vec(status)?;
        let s = status.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO statuses(id, uri, account_id, boost_of_id, json) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![s.id, s.uri, s.account_id, s.boost_of_id, json],
            )
            .map_err(insert_err)?;
            Ok(())
        })
        .await
    }

    async fn update_status(&self, status: &Status) -> Result<()> {
        let json = serde_json::to_vec(status)?;
        let s = status.clone();
        self.blocking(move |conn| {
            updated(conn.execute(
                "UPDATE statuses SET uri=?2, account_id=?3, boost_of_id=?4, json=?5 WHERE id=?1",
                params![s.id, s.uri, s.account_id, s.boost_of_id, json],
            )?)
        })
        .await
    }

    async fn delete_status_by_id(&self, id: &str) -> Result<()> {
        self.delete_by_id("statuses", id).await
    }

    async fn get_poll_by_id(&self, id: &str) -> Result<Poll> {
        self.get_by_id("polls", id).await
    }

    async fn put_poll(&self, poll: &Poll) -> Result<()> {
        let json = serde_json::to_vec(poll)?;
        let id = poll.id.clone();
        self.blocking(move |conn| {
            conn.execute("INSERT INTO polls(id, json) VALUES (?1, ?2)", params![id, json])
                .map_err(insert_err)?;
            Ok(())
        })
        .await
    }

    async fn update_poll(&self, poll: &Poll) -> Result<()> {
        let json = serde_json::to_vec(poll)?;
        let id = poll.id.clone();
        self.blocking(move |conn| {
            updated(conn.execute("UPDATE polls SET json=?2 WHERE id=?1", params![id, json])?)
        })
        .await
    }

    async fn delete_poll_by_id(&self, id: &str) -> Result<()> {
        let id = id.to_string();
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM polls WHERE id = ?1", params![id])?;
            tx.execute("DELETE FROM poll_votes WHERE poll_id = ?1", params![id])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn get_poll_vote(&self, poll_id: &str, account_id: &str) -> Result<PollVote> {
        let (p, a) = (poll_id.to_string(), account_id.to_string());
        self.blocking(move |conn| {
            get_one(
                conn,
                "SELECT json FROM poll_votes WHERE poll_id = ?1 AND account_id = ?2",
                params![p, a],
            )
        })
        .await
    }

    async fn get_poll_votes(&self, poll_id: &str) -> Result<Vec<PollVote>> {
        let p = poll_id.to_string();
        self.blocking(move |conn| {
            get_many(conn, "SELECT json FROM poll_votes WHERE poll_id = ?1", params![p])
        })
        .await
    }

    async fn put_poll_vote(&self, vote: &PollVote) -> Result<()> {
        let json = serde_json::to_vec(vote)?;
        let v = vote.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO poll_votes(id, poll_id, account_id, json) VALUES (?1, ?2, ?3, ?4)",
                params![v.id, v.poll_id, v.account_id, json],
            )
            .map_err(insert_err)?;
            Ok(())
        })
        .await
    }

    async fn get_follow(&self, account_id: &str, target_account_id: &str) -> Result<Follow> {
        self.get_relation("follows", account_id, target_account_id).await
    }

    async fn put_follow(&self, follow: &Follow) -> Result<()> {
        let json = serde_json::to_vec(follow)?;
        let f = follow.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO follows(id, uri, account_id, target_account_id, json) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![f.id, f.uri, f.account_id, f.target_account_id, json],
            )
            .map_err(insert_err)?;
            Ok(())
        })
        .await
    }

    async fn delete_follow(&self, account_id: &str, target_account_id: &str) -> Result<()> {
        let (a, t) = (account_id.to_string(), target_account_id.to_string());
        self.blocking(move |conn| {
            conn.execute(
                "DELETE FROM follows WHERE account_id = ?1 AND target_account_id = ?2",
                params![a, t],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_account_followers(&self, account_id: &str) -> Result<Vec<Follow>> {
        let a = account_id.to_string();
        self.blocking(move |conn| {
            get_many(
                conn,
                "SELECT json FROM follows WHERE target_account_id = ?1 ORDER BY id DESC",
                params![a],
            )
        })
        .await
    }

    async fn get_account_local_followers(&self, account_id: &str) -> Result<Vec<Follow>> {
        let a = account_id.to_string();
        self.blocking(move |conn| {
            get_many(
                conn,
                r#"
                SELECT f.json FROM follows f JOIN accounts a ON a.id = f.account_id
                WHERE f.target_account_id = ?1 AND a.domain IS NULL
                ORDER BY f.id DESC
                "#,
                params![a],
            )
        })
        .await
    }

    async fn delete_follows_where(&self, filter: &RelationFilter) -> Result<Vec<Follow>> {
        self.delete_relations_where("follows", filter).await
    }

    async fn get_follow_request(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> Result<FollowRequest> {
        self.get_relation("follow_requests", account_id, target_account_id)
            .await
    }

    async fn put_follow_request(&self, request: &FollowRequest) -> Result<()> {
        let json = serde_json::to_vec(request)?;
        let f = request.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO follow_requests(id, uri, account_id, target_account_id, json) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![f.id, f.uri, f.account_id, f.target_account_id, json],
            )
            .map_err(insert_err)?;
            Ok(())
        })
        .await
    }

    async fn accept_follow_request(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> Result<Follow> {
        let (a, t) = (account_id.to_string(), target_account_id.to_string());
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let request: FollowRequest = get_one(
                &tx,
                "SELECT json FROM follow_requests WHERE account_id = ?1 AND target_account_id = ?2",
                params![a, t],
            )?;
            tx.execute(
                "DELETE FROM follow_requests WHERE id = ?1",
                params![request.id],
            )?;
            let existing: Option<Follow> = match get_one(
                &tx,
                "SELECT json FROM follows WHERE account_id = ?1 AND target_account_id = ?2",
                params![a, t],
            ) {
                Ok(f) => Some(f),
                Err(e) if crate::error::is_not_found(&e) => None,
                Err(e) => return Err(e),
            };
            let follow = match existing {
                Some(f) => f,
                None => {
                    let follow = request.to_follow();
                    tx.execute(
                        "INSERT INTO follows(id, uri, account_id, target_account_id, json) VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![
                            follow.id,
                            follow.uri,
                            follow.account_id,
                            follow.target_account_id,
                            serde_json::to_vec(&follow)?
                        ],
                    )?;
                    follow
                }
            };
            tx.commit()?;
            Ok(follow)
        })
        .await
    }

    async fn delete_follow_request(
        &self,
        account_id: &str,
        target_account_id: &str,
    ) -> Result<()> {
        let (a, t) = (account_id.to_string(), target_account_id.to_string());
        self.blocking(move |conn| {
            conn.execute(
                "DELETE FROM follow_requests WHERE account_id = ?1 AND target_account_id = ?2",
                params![a, t],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_account_follow_requests(
        &self,
        target_account_id: &str,
        page: &Page<String>,
    ) -> Result<Vec<FollowRequest>> {
        self.paged(
            "SELECT json FROM follow_requests WHERE target_account_id = ?1",
            vec![target_account_id.to_string()],
            page,
        )
        .await
    }

    async fn delete_follow_requests_where(
        &self,
        filter: &RelationFilter,
    ) -> Result<Vec<FollowRequest>> {
        self.delete_relations_where("follow_requests", filter).await
    }

    async fn get_block(&self, account_id: &str, target_account_id: &str) -> Result<Block> {
        self.get_relation("blocks", account_id, target_account_id).await
    }

    async fn put_block(&self, block: &Block) -> Result<()> {
        let json = serde_json::to_vec(block)?;
        let b = block.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO blocks(id, uri, account_id, target_account_id, json) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![b.id, b.uri, b.account_id, b.target_account_id, json],
            )
            .map_err(insert_err)?;
            Ok(())
        })
        .await
    }

    async fn delete_block_by_id(&self, id: &str) -> Result<()> {
        self.delete_by_id("blocks", id).await
    }

    async fn get_account_blocks(
        &self,
        account_id: &str,
        page: &Page<String>,
    ) -> Result<Vec<Block>> {
        self.paged(
            "SELECT json FROM blocks WHERE account_id = ?1",
            vec![account_id.to_string()],
            page,
        )
        .await
    }

    async fn delete_blocks_where(&self, filter: &RelationFilter) -> Result<Vec<Block>> {
        self.delete_relations_where("blocks", filter).await
    }

    async fn get_status_fave(&self, account_id: &str, status_id: &str) -> Result<StatusFave> {
        let (a, s) = (account_id.to_string(), status_id.to_string());
        self.blocking(move |conn| {
            get_one(
                conn,
                "SELECT json FROM status_faves WHERE account_id = ?1 AND status_id = ?2",
                params![a, s],
            )
        })
        .await
    }

    async fn get_status_faves(&self, status_id: &str) -> Result<Vec<StatusFave>> {
        let s = status_id.to_string();
        self.blocking(move |conn| {
            get_many(conn, "SELECT json FROM status_faves WHERE status_id = ?1", params![s])
        })
        .await
    }

    async fn put_status_fave(&self, fave: &StatusFave) -> Result<()> {
        let json = serde_json::to_vec(fave)?;
        let f = fave.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO status_faves(id, uri, account_id, status_id, json) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![f.id, f.uri, f.account_id, f.status_id, json],
            )
            .map_err(insert_err)?;
            Ok(())
        })
        .await
    }

    async fn update_status_fave(&self, fave: &StatusFave) -> Result<()> {
        let json = serde_json::to_vec(fave)?;
        let id = fave.id.clone();
        self.blocking(move |conn| {
            updated(conn.execute(
                "UPDATE status_faves SET json = ?2 WHERE id = ?1",
                params![id, json],
            )?)
        })
        .await
    }

    async fn delete_status_fave_by_id(&self, id: &str) -> Result<()> {
        self.delete_by_id("status_faves", id).await
    }

    async fn get_notification(
        &self,
        notification_type: NotificationType,
        target_account_id: &str,
        origin_account_id: &str,
        status_id: &str,
    ) -> Result<Notification> {
        let args = [
            notification_type.as_str().to_string(),
            target_account_id.to_string(),
            origin_account_id.to_string(),
            status_id.to_string(),
        ];
        self.blocking(move |conn| {
            get_one(
                conn,
                r#"
                SELECT json FROM notifications
                WHERE type = ?1 AND target_account_id = ?2 AND origin_account_id = ?3 AND status_id = ?4
                "#,
                params_from_iter(args.iter()),
            )
        })
        .await
    }

    async fn put_notification(&self, notification: &Notification) -> Result<()> {
        let json = serde_json::to_vec(notification)?;
        let n = notification.clone();
        self.blocking(move |conn| {
            conn.execute(
                r#"
                INSERT INTO notifications(id, type, target_account_id, origin_account_id, status_id, json)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    n.id,
                    n.notification_type.as_str(),
                    n.target_account_id,
                    n.origin_account_id,
                    n.status_id.unwrap_or_default(),
                    json
                ],
            )
            .map_err(insert_err)?;
            Ok(())
        })
        .await
    }

    async fn get_account_notifications(
        &self,
        account_id: &str,
        page: &Page<String>,
    ) -> Result<Vec<Notification>> {
        self.paged(
            "SELECT json FROM notifications WHERE target_account_id = ?1",
            vec![account_id.to_string()],
            page,
        )
        .await
    }

    async fn delete_notifications_for_status(&self, status_id: &str) -> Result<()> {
        let s = status_id.to_string();
        self.blocking(move |conn| {
            conn.execute("DELETE FROM notifications WHERE status_id = ?1", params![s])?;
            Ok(())
        })
        .await
    }

    async fn delete_notifications_for_account(&self, account_id: &str) -> Result<()> {
        let a = account_id.to_string();
        self.blocking(move |conn| {
            conn.execute(
                "DELETE FROM notifications WHERE target_account_id = ?1 OR origin_account_id = ?1",
                params![a],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_user_mute(&self, account_id: &str, target_account_id: &str) -> Result<UserMute> {
        self.get_relation("user_mutes", account_id, target_account_id).await
    }

    async fn put_user_mute(&self, mute: &UserMute) -> Result<()> {
        let json = serde_json::to_vec(mute)?;
        let m = mute.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO user_mutes(id, account_id, target_account_id, json) VALUES (?1, ?2, ?3, ?4)",
                params![m.id, m.account_id, m.target_account_id, json],
            )
            .map_err(insert_err)?;
            Ok(())
        })
        .await
    }

    async fn delete_user_mute_by_id(&self, id: &str) -> Result<()> {
        self.delete_by_id("user_mutes", id).await
    }

    async fn get_thread_mute(&self, thread_id: &str, account_id: &str) -> Result<ThreadMute> {
        let (t, a) = (thread_id.to_string(), account_id.to_string());
        self.blocking(move |conn| {
            get_one(
                conn,
                "SELECT json FROM thread_mutes WHERE thread_id = ?1 AND account_id = ?2",
                params![t, a],
            )
        })
        .await
    }

    async fn put_thread_mute(&self, mute: &ThreadMute) -> Result<()> {
        let json = serde_json::to_vec(mute)?;
        let m = mute.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO thread_mutes(id, thread_id, account_id, json) VALUES (?1, ?2, ?3, ?4)",
                params![m.id, m.thread_id, m.account_id, json],
            )
            .map_err(insert_err)?;
            Ok(())
        })
        .await
    }

    async fn get_interaction_approval_by_id(&self, id: &str) -> Result<InteractionApproval> {
        self.get_by_id("interaction_approvals", id).await
    }

    async fn get_interaction_approval_by_uri(&self, uri: &str) -> Result<InteractionApproval> {
        let uri = uri.to_string();
        self.blocking(move |conn| {
            get_one(
                conn,
                "SELECT json FROM interaction_approvals WHERE uri = ?1",
                params![uri],
            )
        })
        .await
    }

    async fn put_interaction_approval(&self, approval: &InteractionApproval) -> Result<()> {
        let json = serde_json::to_vec(approval)?;
        let (id, uri) = (approval.id.clone(), approval.uri.clone());
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO interaction_approvals(id, uri, json) VALUES (?1, ?2, ?3)",
                params![id, uri, json],
            )
            .map_err(insert_err)?;
            Ok(())
        })
        .await
    }

    async fn get_report_by_id(&self, id: &str) -> Result<Report> {
        self.get_by_id("reports", id).await
    }

    async fn put_report(&self, report: &Report) -> Result<()> {
        let json = serde_json::to_vec(report)?;
        let id = report.id.clone();
        self.blocking(move |conn| {
            conn.execute("INSERT INTO reports(id, json) VALUES (?1, ?2)", params![id, json])
                .map_err(insert_err)?;
            Ok(())
        })
        .await
    }

    async fn get_list_by_id(&self, id: &str) -> Result<List> {
        self.get_by_id("lists", id).await
    }

    async fn put_list(&self, list: &List) -> Result<()> {
        let json = serde_json::to_vec(list)?;
        let (id, account_id) = (list.id.clone(), list.account_id.clone());
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO lists(id, account_id, json) VALUES (?1, ?2, ?3)",
                params![id, account_id, json],
            )
            .map_err(insert_err)?;
            Ok(())
        })
        .await
    }

    async fn put_list_entry(&self, entry: &ListEntry) -> Result<()> {
        let json = serde_json::to_vec(entry)?;
        let e = entry.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO list_entries(id, list_id, follow_id, json) VALUES (?1, ?2, ?3, ?4)",
                params![e.id, e.list_id, e.follow_id, json],
            )
            .map_err(insert_err)?;
            Ok(())
        })
        .await
    }

    async fn get_list_entries_for_follow(&self, follow_id: &str) -> Result<Vec<ListEntry>> {
        let f = follow_id.to_string();
        self.blocking(move |conn| {
            get_many(conn, "SELECT json FROM list_entries WHERE follow_id = ?1", params![f])
        })
        .await
    }

    async fn get_home_timeline(
        &self,
        account_id: &str,
        page: &Page<String>,
    ) -> Result<Vec<Status>> {
        self.paged(
            r#"
            SELECT json FROM statuses
            WHERE (account_id = ?1
                   OR account_id IN (SELECT target_account_id FROM follows WHERE account_id = ?1))
            "#,
            vec![account_id.to_string()],
            page,
        )
        .await
    }

    async fn get_list_timeline(&self, list_id: &str, page: &Page<String>) -> Result<Vec<Status>> {
        self.paged(
            r#"
            SELECT json FROM statuses
            WHERE account_id IN (
              SELECT f.target_account_id FROM list_entries e JOIN follows f ON f.id = e.follow_id
              WHERE e.list_id = ?1
            )
            "#,
            vec![list_id.to_string()],
            page,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{is_already_exists, is_not_found};
    use crate::paging::{max_id, min_id};

    fn open_temp() -> (SocialDb, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = SocialDb::open(dir.path().join("social.db")).expect("open");
        (db, dir)
    }

    fn account(id: &str, domain: Option<&str>) -> Account {
        Account {
            id: id.into(),
            uri: format!("https://{}/users/{id}", domain.unwrap_or("local.test")),
            url: format!("https://{}/@{id}", domain.unwrap_or("local.test")),
            username: id.into(),
            domain: domain.map(str::to_string),
            ..Default::default()
        }
    }

    fn follow(id: &str, from: &str, to: &str) -> Follow {
        Follow {
            id: id.into(),
            uri: format!("https://x/follows/{id}"),
            account_id: from.into(),
            target_account_id: to.into(),
            show_reblogs: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_rows_are_not_found_and_duplicates_already_exist() {
        let (db, _dir) = open_temp();
        let err = db.get_account_by_id("nope").await.unwrap_err();
        assert!(is_not_found(&err));

        db.put_account(&account("a", None)).await.unwrap();
        let err = db.put_account(&account("a", None)).await.unwrap_err();
        assert!(is_already_exists(&err));
        assert_eq!(db.get_account_by_uri("https://local.test/users/a").await.unwrap().id, "a");
    }

    #[tokio::test]
    async fn stats_adjust_in_place_and_never_go_negative() {
        let (db, _dir) = open_temp();
        db.put_account(&account("a", None)).await.unwrap();
        db.adjust_account_stats(
            "a",
            StatsDelta {
                statuses: 2,
                followers: -1,
                last_status_at_ms: Some(50),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        db.adjust_account_stats(
            "a",
            StatsDelta {
                statuses: -1,
                last_status_at_ms: Some(10),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        let stats = db.get_account_by_id("a").await.unwrap().stats;
        assert_eq!(stats.statuses_count, 1);
        assert_eq!(stats.followers_count, 0);
        assert_eq!(stats.last_status_at_ms, Some(50));
    }

    #[tokio::test]
    async fn accepting_a_request_moves_it_to_follows() {
        let (db, _dir) = open_temp();
        let req = FollowRequest {
            id: "r1".into(),
            uri: "https://remote/follows/1".into(),
            account_id: "a".into(),
            target_account_id: "b".into(),
            show_reblogs: true,
            ..Default::default()
        };
        db.put_follow_request(&req).await.unwrap();
        let follow = db.accept_follow_request("a", "b").await.unwrap();
        assert_eq!(follow.uri, req.uri);
        assert!(is_not_found(&db.get_follow_request("a", "b").await.unwrap_err()));
        assert_eq!(db.get_follow("a", "b").await.unwrap().id, "r1");
        assert!(is_not_found(&db.accept_follow_request("a", "b").await.unwrap_err()));
    }

    #[tokio::test]
    async fn bulk_delete_returns_rows_and_refuses_empty_filter() {
        let (db, _dir) = open_temp();
        db.put_follow(&follow("f1", "a", "b")).await.unwrap();
        db.put_follow(&follow("f2", "a", "c")).await.unwrap();
        db.put_follow(&follow("f3", "c", "a")).await.unwrap();

        let gone = db
            .delete_follows_where(&RelationFilter::from_account("a"))
            .await
            .unwrap();
        assert_eq!(gone.len(), 2);
        assert!(db.get_follow("c", "a").await.is_ok());
        assert!(db.delete_follows_where(&RelationFilter::default()).await.is_err());
    }

    #[tokio::test]
    async fn local_followers_skip_remote_accounts() {
        let (db, _dir) = open_temp();
        db.put_account(&account("local", None)).await.unwrap();
        db.put_account(&account("remote", Some("remote.test"))).await.unwrap();
        db.put_follow(&follow("f1", "local", "t")).await.unwrap();
        db.put_follow(&follow("f2", "remote", "t")).await.unwrap();

        let local = db.get_account_local_followers("t").await.unwrap();
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].account_id, "local");
        assert_eq!(db.get_account_followers("t").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn home_timeline_pages_newest_first() {
        let (db, _dir) = open_temp();
        db.put_follow(&follow("f1", "me", "friend")).await.unwrap();
        for (id, author) in [("01", "me"), ("02", "stranger"), ("03", "friend"), ("04", "me")] {
            db.put_status(&Status {
                id: id.into(),
                uri: format!("https://x/statuses/{id}"),
                account_id: author.into(),
                ..Default::default()
            })
            .await
            .unwrap();
        }

        let page = Page::new(min_id("", ""), max_id(""), 2);
        let ids: Vec<String> = db
            .get_home_timeline("me", &page)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["04", "03"]);

        let page = Page::new(min_id("", ""), max_id("03"), 2);
        let ids: Vec<String> = db
            .get_home_timeline("me", &page)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["01"]);

        // min_id walks forward from the bound but still returns newest first.
        let page = Page::new(min_id("00", ""), max_id(""), 2);
        let ids: Vec<String> = db
            .get_home_timeline("me", &page)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["03", "01"]);
    }

    #[tokio::test]
    async fn notifications_are_unique_per_type_and_subject() {
        let (db, _dir) = open_temp();
        let n = Notification {
            id: "n1".into(),
            notification_type: NotificationType::Favourite,
            target_account_id: "t".into(),
            origin_account_id: "o".into(),
            status_id: Some("s".into()),
            ..Default::default()
        };
        db.put_notification(&n).await.unwrap();
        let dup = Notification { id: "n2".into(), ..n.clone() };
        assert!(is_already_exists(&db.put_notification(&dup).await.unwrap_err()));
        let got = db
            .get_notification(NotificationType::Favourite, "t", "o", "s")
            .await
            .unwrap();
        assert_eq!(got, n);

        db.delete_notifications_for_status("s").await.unwrap();
        assert!(db
            .get_notification(NotificationType::Favourite, "t", "o", "s")
            .await
            .is_err());
    }
}
