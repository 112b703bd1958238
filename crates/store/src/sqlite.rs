//! SQLite backend with FTS5 full-text search over item text.
//!
//! Tables:
//! - `items` / `items_fts` — scored items, FTS index synced by triggers
//! - `keyword_index` — (keyword, item_id, score, observed_at) rows, written
//!   in the same transaction as their item
//! - `axes` / `evidence` — belief axes and their append-only evidence logs
//! - `drift_state` / `drift_alerts` — CUSUM accumulators and the alert log
//! - `merge_proposals` / `axis_redirects` — redundancy proposals and merges
//! - `axis_embeddings` — embedding cache keyed by axis id + content hash

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use tracing::{debug, info};
use worldview_core::axis::{
    BeliefAxis, DriftAlert, DriftDirection, DriftState, EvidenceEntry, MergeProposal,
    PoleAlignment,
};
use worldview_core::error::StoreError;
use worldview_core::item::{Item, ItemScores, KeywordEntry};
use worldview_core::store::{AxisStore, ItemStore};

/// The production SQLite store. Implements both [`ItemStore`] and
/// [`AxisStore`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database
    /// (useful for tests).
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        let statements: &[(&str, &str)] = &[
            (
                "items table",
                r#"
                CREATE TABLE IF NOT EXISTS items (
                    iid         INTEGER PRIMARY KEY AUTOINCREMENT,
                    id          TEXT UNIQUE NOT NULL,
                    source_id   TEXT NOT NULL,
                    text        TEXT NOT NULL,
                    engagement  INTEGER NOT NULL DEFAULT 0,
                    parent_id   TEXT,
                    created_at  TEXT NOT NULL,
                    keywords    TEXT NOT NULL DEFAULT '[]',
                    velocity    REAL NOT NULL DEFAULT 0.0,
                    trust       REAL NOT NULL DEFAULT 0.0,
                    alignment   REAL NOT NULL DEFAULT 0.0,
                    novelty     REAL NOT NULL DEFAULT 0.0,
                    total       REAL NOT NULL DEFAULT 0.0
                )
                "#,
            ),
            (
                "FTS5 table",
                r#"
                CREATE VIRTUAL TABLE IF NOT EXISTS items_fts USING fts5(
                    text,
                    content='items',
                    content_rowid='iid',
                    tokenize='porter unicode61'
                )
                "#,
            ),
            (
                "insert trigger",
                r#"
                CREATE TRIGGER IF NOT EXISTS items_ai AFTER INSERT ON items BEGIN
                    INSERT INTO items_fts(rowid, text) VALUES (new.iid, new.text);
                END
                "#,
            ),
            (
                "delete trigger",
                r#"
                CREATE TRIGGER IF NOT EXISTS items_ad AFTER DELETE ON items BEGIN
                    INSERT INTO items_fts(items_fts, rowid, text)
                    VALUES ('delete', old.iid, old.text);
                END
                "#,
            ),
            (
                "update trigger",
                r#"
                CREATE TRIGGER IF NOT EXISTS items_au AFTER UPDATE ON items BEGIN
                    INSERT INTO items_fts(items_fts, rowid, text)
                    VALUES ('delete', old.iid, old.text);
                    INSERT INTO items_fts(rowid, text) VALUES (new.iid, new.text);
                END
                "#,
            ),
            (
                "created_at index",
                "CREATE INDEX IF NOT EXISTS idx_items_created_at ON items(created_at DESC)",
            ),
            (
                "keyword_index table",
                r#"
                CREATE TABLE IF NOT EXISTS keyword_index (
                    keyword     TEXT NOT NULL,
                    item_id     TEXT NOT NULL,
                    score       REAL NOT NULL DEFAULT 0.0,
                    observed_at TEXT NOT NULL
                )
                "#,
            ),
            (
                "keyword window index",
                "CREATE INDEX IF NOT EXISTS idx_keyword_observed ON keyword_index(keyword, observed_at)",
            ),
            (
                "keyword item index",
                "CREATE INDEX IF NOT EXISTS idx_keyword_item ON keyword_index(item_id)",
            ),
            (
                "axes table",
                r#"
                CREATE TABLE IF NOT EXISTS axes (
                    id           TEXT PRIMARY KEY,
                    label        TEXT NOT NULL,
                    pole_left    TEXT NOT NULL,
                    pole_right   TEXT NOT NULL,
                    score        REAL NOT NULL DEFAULT 0.0,
                    confidence   REAL NOT NULL DEFAULT 0.0,
                    topics       TEXT NOT NULL DEFAULT '[]',
                    created_at   TEXT NOT NULL,
                    last_updated TEXT NOT NULL
                )
                "#,
            ),
            (
                "evidence table",
                r#"
                CREATE TABLE IF NOT EXISTS evidence (
                    eid                  INTEGER PRIMARY KEY AUTOINCREMENT,
                    axis_id              TEXT NOT NULL,
                    source               TEXT NOT NULL,
                    text                 TEXT NOT NULL,
                    observed_at          TEXT NOT NULL,
                    alignment            TEXT NOT NULL,
                    weight               REAL NOT NULL DEFAULT 1.0,
                    validator_confidence REAL
                )
                "#,
            ),
            (
                "evidence axis index",
                "CREATE INDEX IF NOT EXISTS idx_evidence_axis ON evidence(axis_id, eid)",
            ),
            (
                "drift_state table",
                r#"
                CREATE TABLE IF NOT EXISTS drift_state (
                    axis_id   TEXT PRIMARY KEY,
                    processed INTEGER NOT NULL DEFAULT 0,
                    cusum_pos REAL NOT NULL DEFAULT 0.0,
                    cusum_neg REAL NOT NULL DEFAULT 0.0
                )
                "#,
            ),
            (
                "drift_alerts table",
                r#"
                CREATE TABLE IF NOT EXISTS drift_alerts (
                    aid            INTEGER PRIMARY KEY AUTOINCREMENT,
                    axis_id        TEXT NOT NULL,
                    direction      TEXT NOT NULL,
                    value          REAL NOT NULL,
                    evidence_index INTEGER NOT NULL,
                    detected_at    TEXT NOT NULL
                )
                "#,
            ),
            (
                "merge_proposals table",
                r#"
                CREATE TABLE IF NOT EXISTS merge_proposals (
                    pid         INTEGER PRIMARY KEY AUTOINCREMENT,
                    axis_a      TEXT NOT NULL,
                    axis_b      TEXT NOT NULL,
                    similarity  REAL NOT NULL,
                    evidence_a  INTEGER NOT NULL,
                    evidence_b  INTEGER NOT NULL,
                    proposed_at TEXT NOT NULL
                )
                "#,
            ),
            (
                "axis_redirects table",
                r#"
                CREATE TABLE IF NOT EXISTS axis_redirects (
                    absorbed_id TEXT PRIMARY KEY,
                    target_id   TEXT NOT NULL
                )
                "#,
            ),
            (
                "axis_embeddings table",
                r#"
                CREATE TABLE IF NOT EXISTS axis_embeddings (
                    axis_id      TEXT PRIMARY KEY,
                    content_hash TEXT NOT NULL,
                    vector       BLOB NOT NULL
                )
                "#,
            ),
        ];

        for (name, sql) in statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| StoreError::MigrationFailed(format!("{name}: {e}")))?;
        }

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<Item, StoreError> {
        let get_text = |col: &str| -> Result<String, StoreError> {
            row.try_get(col)
                .map_err(|e| StoreError::QueryFailed(format!("{col} column: {e}")))
        };

        let id = get_text("id")?;
        let keywords_json = get_text("keywords")?;
        let keywords: Vec<String> =
            serde_json::from_str(&keywords_json).map_err(|e| StoreError::Corrupt {
                table: "items".into(),
                reason: format!("keywords for {id}: {e}"),
            })?;

        let created_at = parse_ts(&get_text("created_at")?, "items")?;
        let engagement: i64 = row
            .try_get("engagement")
            .map_err(|e| StoreError::QueryFailed(format!("engagement column: {e}")))?;

        Ok(Item {
            id,
            created_at,
            source_id: get_text("source_id")?,
            text: get_text("text")?,
            engagement: engagement.max(0) as u64,
            parent_id: row.try_get("parent_id").ok().flatten(),
            keywords,
            scores: ItemScores {
                velocity: row.try_get("velocity").unwrap_or(0.0),
                trust: row.try_get("trust").unwrap_or(0.0),
                alignment: row.try_get("alignment").unwrap_or(0.0),
                novelty: row.try_get("novelty").unwrap_or(0.0),
                total: row.try_get("total").unwrap_or(0.0),
            },
        })
    }

    fn row_to_evidence(row: &sqlx::sqlite::SqliteRow) -> Result<EvidenceEntry, StoreError> {
        let alignment_str: String = row
            .try_get("alignment")
            .map_err(|e| StoreError::QueryFailed(format!("alignment column: {e}")))?;
        let alignment = match alignment_str.as_str() {
            "left" => PoleAlignment::Left,
            "right" => PoleAlignment::Right,
            other => {
                return Err(StoreError::Corrupt {
                    table: "evidence".into(),
                    reason: format!("unknown alignment {other:?}"),
                });
            }
        };

        let observed_at_str: String = row
            .try_get("observed_at")
            .map_err(|e| StoreError::QueryFailed(format!("observed_at column: {e}")))?;

        Ok(EvidenceEntry {
            source: row
                .try_get("source")
                .map_err(|e| StoreError::QueryFailed(format!("source column: {e}")))?,
            text: row
                .try_get("text")
                .map_err(|e| StoreError::QueryFailed(format!("text column: {e}")))?,
            observed_at: parse_ts(&observed_at_str, "evidence")?,
            alignment,
            weight: row.try_get("weight").unwrap_or(1.0),
            validator_confidence: row.try_get("validator_confidence").ok().flatten(),
        })
    }

    async fn axis_header(&self, id: &str) -> Result<Option<BeliefAxis>, StoreError> {
        let row = sqlx::query("SELECT * FROM axes WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("axis by id: {e}")))?;

        row.as_ref().map(Self::row_to_axis_header).transpose()
    }

    fn row_to_axis_header(row: &sqlx::sqlite::SqliteRow) -> Result<BeliefAxis, StoreError> {
        let get_text = |col: &str| -> Result<String, StoreError> {
            row.try_get(col)
                .map_err(|e| StoreError::QueryFailed(format!("{col} column: {e}")))
        };

        let id = get_text("id")?;
        let topics_json = get_text("topics")?;
        let topics: Vec<String> =
            serde_json::from_str(&topics_json).map_err(|e| StoreError::Corrupt {
                table: "axes".into(),
                reason: format!("topics for {id}: {e}"),
            })?;

        Ok(BeliefAxis {
            id,
            label: get_text("label")?,
            pole_left: get_text("pole_left")?,
            pole_right: get_text("pole_right")?,
            score: row.try_get("score").unwrap_or(0.0),
            confidence: row.try_get("confidence").unwrap_or(0.0),
            topics,
            created_at: parse_ts(&get_text("created_at")?, "axes")?,
            last_updated: parse_ts(&get_text("last_updated")?, "axes")?,
            evidence: Vec::new(),
        })
    }

    async fn evidence_for(&self, axis_id: &str) -> Result<Vec<EvidenceEntry>, StoreError> {
        let rows = sqlx::query("SELECT * FROM evidence WHERE axis_id = ?1 ORDER BY eid ASC")
            .bind(axis_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("evidence for axis: {e}")))?;

        rows.iter().map(Self::row_to_evidence).collect()
    }

    /// Serialize an embedding vector to little-endian f32 bytes.
    fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
        blob.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }

    /// Build a safe FTS5 query from user text: each token quoted with
    /// prefix matching, joined with implicit AND.
    fn sanitize_fts_query(text: &str) -> String {
        text.split_whitespace()
            .map(|w| {
                let clean: String = w
                    .chars()
                    .filter(|c| c.is_alphanumeric() || *c == '_')
                    .collect();
                if clean.is_empty() {
                    String::new()
                } else {
                    format!("\"{clean}\"*")
                }
            })
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn parse_ts(s: &str, table: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            table: table.into(),
            reason: format!("bad timestamp {s:?}: {e}"),
        })
}

#[async_trait]
impl ItemStore for SqliteStore {
    async fn upsert_item(&self, item: &Item) -> Result<(), StoreError> {
        let keywords_json = serde_json::to_string(&item.keywords)
            .map_err(|e| StoreError::Storage(format!("keywords serialization: {e}")))?;
        let created_at = item.created_at.to_rfc3339();

        // Item row and keyword rows are one atomic unit.
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("begin tx: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO items
                (id, source_id, text, engagement, parent_id, created_at,
                 keywords, velocity, trust, alignment, novelty, total)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(id) DO UPDATE SET
                source_id = excluded.source_id,
                text = excluded.text,
                engagement = excluded.engagement,
                parent_id = excluded.parent_id,
                created_at = excluded.created_at,
                keywords = excluded.keywords,
                velocity = excluded.velocity,
                trust = excluded.trust,
                alignment = excluded.alignment,
                novelty = excluded.novelty,
                total = excluded.total
            "#,
        )
        .bind(&item.id)
        .bind(&item.source_id)
        .bind(&item.text)
        .bind(item.engagement as i64)
        .bind(&item.parent_id)
        .bind(&created_at)
        .bind(&keywords_json)
        .bind(item.scores.velocity)
        .bind(item.scores.trust)
        .bind(item.scores.alignment)
        .bind(item.scores.novelty)
        .bind(item.scores.total)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Storage(format!("item upsert: {e}")))?;

        sqlx::query("DELETE FROM keyword_index WHERE item_id = ?1")
            .bind(&item.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("keyword delete: {e}")))?;

        let entries = item.keywords.iter().map(|keyword| KeywordEntry {
            keyword: keyword.clone(),
            item_id: item.id.clone(),
            score: item.scores.total,
            observed_at: item.created_at,
        });
        for entry in entries {
            sqlx::query(
                "INSERT INTO keyword_index (keyword, item_id, score, observed_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(&entry.keyword)
            .bind(&entry.item_id)
            .bind(entry.score)
            .bind(entry.observed_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Storage(format!("keyword insert: {e}")))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("commit: {e}")))?;

        debug!(item_id = %item.id, keywords = item.keywords.len(), "Persisted item");
        Ok(())
    }

    async fn get_item(&self, id: &str) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query("SELECT * FROM items WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("item by id: {e}")))?;

        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn recent_items(&self, limit: usize) -> Result<Vec<Item>, StoreError> {
        let rows = sqlx::query("SELECT * FROM items ORDER BY created_at DESC LIMIT ?1")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("recent items: {e}")))?;

        rows.iter().map(Self::row_to_item).collect()
    }

    async fn search_items(&self, query: &str, limit: usize) -> Result<Vec<Item>, StoreError> {
        let fts_query = Self::sanitize_fts_query(query);
        if fts_query.is_empty() {
            return Ok(vec![]);
        }

        let rows = sqlx::query(
            r#"
            SELECT i.*, bm25(items_fts) AS rank
            FROM items_fts f
            JOIN items i ON i.iid = f.rowid
            WHERE items_fts MATCH ?1
            ORDER BY rank
            LIMIT ?2
            "#,
        )
        .bind(&fts_query)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("FTS5 search: {e}")))?;

        rows.iter().map(Self::row_to_item).collect()
    }

    async fn keyword_frequencies(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<HashMap<String, u64>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT keyword, COUNT(DISTINCT item_id) AS freq
            FROM keyword_index
            WHERE observed_at >= ?1 AND observed_at < ?2
            GROUP BY keyword
            "#,
        )
        .bind(since.to_rfc3339())
        .bind(until.to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("keyword frequencies: {e}")))?;

        let mut freqs = HashMap::with_capacity(rows.len());
        for row in &rows {
            let keyword: String = row
                .try_get("keyword")
                .map_err(|e| StoreError::QueryFailed(format!("keyword column: {e}")))?;
            let freq: i64 = row
                .try_get("freq")
                .map_err(|e| StoreError::QueryFailed(format!("freq column: {e}")))?;
            freqs.insert(keyword, freq.max(0) as u64);
        }
        Ok(freqs)
    }

    async fn item_count(&self) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM items")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("item count: {e}")))?;

        let cnt: i64 = row
            .try_get("cnt")
            .map_err(|e| StoreError::QueryFailed(format!("cnt column: {e}")))?;
        Ok(cnt.max(0) as u64)
    }
}

#[async_trait]
impl AxisStore for SqliteStore {
    async fn create_axis(&self, axis: &BeliefAxis) -> Result<(), StoreError> {
        if self.axis_header(&axis.id).await?.is_some() {
            return Err(StoreError::DuplicateAxis(axis.id.clone()));
        }

        let topics_json = serde_json::to_string(&axis.topics)
            .map_err(|e| StoreError::Storage(format!("topics serialization: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO axes
                (id, label, pole_left, pole_right, score, confidence,
                 topics, created_at, last_updated)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&axis.id)
        .bind(&axis.label)
        .bind(&axis.pole_left)
        .bind(&axis.pole_right)
        .bind(axis.score)
        .bind(axis.confidence)
        .bind(&topics_json)
        .bind(axis.created_at.to_rfc3339())
        .bind(axis.last_updated.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            // Second writer raced us to the same id.
            if e.to_string().contains("UNIQUE") {
                StoreError::DuplicateAxis(axis.id.clone())
            } else {
                StoreError::Storage(format!("axis insert: {e}"))
            }
        })?;

        // Seed evidence carried on the axis (a NewAxis delta may arrive
        // with its founding observations attached).
        for entry in &axis.evidence {
            self.append_evidence(&axis.id, entry).await?;
        }

        info!(axis_id = %axis.id, label = %axis.label, "Created belief axis");
        Ok(())
    }

    async fn get_axis(&self, id: &str) -> Result<Option<BeliefAxis>, StoreError> {
        let Some(mut axis) = self.axis_header(id).await? else {
            return Ok(None);
        };
        axis.evidence = self.evidence_for(id).await?;
        Ok(Some(axis))
    }

    async fn list_axes(&self) -> Result<Vec<BeliefAxis>, StoreError> {
        let rows = sqlx::query("SELECT * FROM axes ORDER BY created_at ASC, id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("list axes: {e}")))?;

        let mut axes = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut axis = Self::row_to_axis_header(row)?;
            axis.evidence = self.evidence_for(&axis.id).await?;
            axes.push(axis);
        }
        Ok(axes)
    }

    async fn append_evidence(
        &self,
        axis_id: &str,
        entry: &EvidenceEntry,
    ) -> Result<(), StoreError> {
        if self.axis_header(axis_id).await?.is_none() {
            return Err(StoreError::AxisNotFound(axis_id.into()));
        }

        sqlx::query(
            r#"
            INSERT INTO evidence
                (axis_id, source, text, observed_at, alignment, weight,
                 validator_confidence)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(axis_id)
        .bind(&entry.source)
        .bind(&entry.text)
        .bind(entry.observed_at.to_rfc3339())
        .bind(entry.alignment.to_string())
        .bind(entry.weight)
        .bind(entry.validator_confidence)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("evidence append: {e}")))?;

        debug!(axis_id, alignment = %entry.alignment, "Appended evidence");
        Ok(())
    }

    async fn update_axis_scores(
        &self,
        axis_id: &str,
        score: f64,
        confidence: f64,
        last_updated: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE axes SET score = ?1, confidence = ?2, last_updated = ?3 WHERE id = ?4",
        )
        .bind(score)
        .bind(confidence)
        .bind(last_updated.to_rfc3339())
        .bind(axis_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("axis score update: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AxisNotFound(axis_id.into()));
        }
        Ok(())
    }

    async fn drift_state(&self, axis_id: &str) -> Result<DriftState, StoreError> {
        let row = sqlx::query("SELECT * FROM drift_state WHERE axis_id = ?1")
            .bind(axis_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("drift state: {e}")))?;

        let Some(row) = row else {
            return Ok(DriftState::default());
        };

        let processed: i64 = row
            .try_get("processed")
            .map_err(|e| StoreError::QueryFailed(format!("processed column: {e}")))?;

        Ok(DriftState {
            processed: processed.max(0) as u64,
            cusum_pos: row.try_get("cusum_pos").unwrap_or(0.0),
            cusum_neg: row.try_get("cusum_neg").unwrap_or(0.0),
        })
    }

    async fn save_drift_state(
        &self,
        axis_id: &str,
        state: &DriftState,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO drift_state (axis_id, processed, cusum_pos, cusum_neg)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(axis_id) DO UPDATE SET
                processed = excluded.processed,
                cusum_pos = excluded.cusum_pos,
                cusum_neg = excluded.cusum_neg
            "#,
        )
        .bind(axis_id)
        .bind(state.processed as i64)
        .bind(state.cusum_pos)
        .bind(state.cusum_neg)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("drift state save: {e}")))?;

        Ok(())
    }

    async fn append_drift_alert(&self, alert: &DriftAlert) -> Result<(), StoreError> {
        let direction = match alert.direction {
            DriftDirection::TowardRight => "toward_right",
            DriftDirection::TowardLeft => "toward_left",
        };

        sqlx::query(
            r#"
            INSERT INTO drift_alerts
                (axis_id, direction, value, evidence_index, detected_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&alert.axis_id)
        .bind(direction)
        .bind(alert.value)
        .bind(alert.evidence_index as i64)
        .bind(alert.detected_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("drift alert append: {e}")))?;

        Ok(())
    }

    async fn list_drift_alerts(&self) -> Result<Vec<DriftAlert>, StoreError> {
        let rows = sqlx::query("SELECT * FROM drift_alerts ORDER BY aid ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("list drift alerts: {e}")))?;

        rows.iter()
            .map(|row| {
                let direction_str: String = row
                    .try_get("direction")
                    .map_err(|e| StoreError::QueryFailed(format!("direction column: {e}")))?;
                let direction = match direction_str.as_str() {
                    "toward_right" => DriftDirection::TowardRight,
                    "toward_left" => DriftDirection::TowardLeft,
                    other => {
                        return Err(StoreError::Corrupt {
                            table: "drift_alerts".into(),
                            reason: format!("unknown direction {other:?}"),
                        });
                    }
                };
                let evidence_index: i64 = row
                    .try_get("evidence_index")
                    .map_err(|e| StoreError::QueryFailed(format!("evidence_index column: {e}")))?;
                let detected_at_str: String = row
                    .try_get("detected_at")
                    .map_err(|e| StoreError::QueryFailed(format!("detected_at column: {e}")))?;

                Ok(DriftAlert {
                    axis_id: row
                        .try_get("axis_id")
                        .map_err(|e| StoreError::QueryFailed(format!("axis_id column: {e}")))?,
                    direction,
                    value: row.try_get("value").unwrap_or(0.0),
                    evidence_index: evidence_index.max(0) as u64,
                    detected_at: parse_ts(&detected_at_str, "drift_alerts")?,
                })
            })
            .collect()
    }

    async fn append_merge_proposal(&self, proposal: &MergeProposal) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO merge_proposals
                (axis_a, axis_b, similarity, evidence_a, evidence_b, proposed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&proposal.axis_a)
        .bind(&proposal.axis_b)
        .bind(proposal.similarity)
        .bind(proposal.evidence_a as i64)
        .bind(proposal.evidence_b as i64)
        .bind(proposal.proposed_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("merge proposal append: {e}")))?;

        Ok(())
    }

    async fn record_redirect(
        &self,
        absorbed_id: &str,
        target_id: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO axis_redirects (absorbed_id, target_id)
            VALUES (?1, ?2)
            ON CONFLICT(absorbed_id) DO UPDATE SET target_id = excluded.target_id
            "#,
        )
        .bind(absorbed_id)
        .bind(target_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("redirect record: {e}")))?;

        info!(absorbed_id, target_id, "Recorded axis redirect");
        Ok(())
    }

    async fn resolve_redirect(&self, id: &str) -> Result<Option<String>, StoreError> {
        let row = sqlx::query("SELECT target_id FROM axis_redirects WHERE absorbed_id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("redirect lookup: {e}")))?;

        row.map(|r| {
            r.try_get("target_id")
                .map_err(|e| StoreError::QueryFailed(format!("target_id column: {e}")))
        })
        .transpose()
    }

    async fn cached_embedding(
        &self,
        axis_id: &str,
        content_hash: &str,
    ) -> Result<Option<Vec<f32>>, StoreError> {
        let row = sqlx::query(
            "SELECT content_hash, vector FROM axis_embeddings WHERE axis_id = ?1",
        )
        .bind(axis_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("embedding lookup: {e}")))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let stored_hash: String = row
            .try_get("content_hash")
            .map_err(|e| StoreError::QueryFailed(format!("content_hash column: {e}")))?;

        // A label/pole edit changed the hash; the cached vector is stale.
        if stored_hash != content_hash {
            return Ok(None);
        }

        let blob: Vec<u8> = row
            .try_get("vector")
            .map_err(|e| StoreError::QueryFailed(format!("vector column: {e}")))?;
        Ok(Some(Self::blob_to_embedding(&blob)))
    }

    async fn put_embedding(
        &self,
        axis_id: &str,
        content_hash: &str,
        vector: &[f32],
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO axis_embeddings (axis_id, content_hash, vector)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(axis_id) DO UPDATE SET
                content_hash = excluded.content_hash,
                vector = excluded.vector
            "#,
        )
        .bind(axis_id)
        .bind(content_hash)
        .bind(Self::embedding_to_blob(vector))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("embedding put: {e}")))?;

        Ok(())
    }

    async fn axes_created_between(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS cnt FROM axes WHERE created_at >= ?1 AND created_at < ?2",
        )
        .bind(since.to_rfc3339())
        .bind(until.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("axes created between: {e}")))?;

        let cnt: i64 = row
            .try_get("cnt")
            .map_err(|e| StoreError::QueryFailed(format!("cnt column: {e}")))?;
        Ok(cnt.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use worldview_core::item::RawItem;

    async fn test_store() -> SqliteStore {
        SqliteStore::open("sqlite::memory:").await.unwrap()
    }

    fn make_item(id: &str, keywords: &[&str], total: f64) -> Item {
        let mut item = Item::from_raw(RawItem {
            id: id.into(),
            created_at: Utc::now(),
            source_id: "acct_1".into(),
            text: format!("text of {id}"),
            engagement: 3,
            parent_id: None,
        });
        item.keywords = keywords.iter().map(|s| s.to_string()).collect();
        item.scores.total = total;
        item
    }

    fn make_axis(id: &str, created_at: DateTime<Utc>) -> BeliefAxis {
        BeliefAxis {
            id: id.into(),
            label: "open models".into(),
            pole_left: "weights should stay closed".into(),
            pole_right: "weights should be open".into(),
            score: 0.0,
            confidence: 0.0,
            topics: vec!["ai".into()],
            created_at,
            last_updated: created_at,
            evidence: vec![],
        }
    }

    fn make_evidence(source: &str, alignment: PoleAlignment, weight: f64) -> EvidenceEntry {
        EvidenceEntry {
            source: source.into(),
            text: "observed statement".into(),
            observed_at: Utc::now(),
            alignment,
            weight,
            validator_confidence: Some(0.9),
        }
    }

    #[tokio::test]
    async fn item_round_trip() {
        let store = test_store().await;
        let item = make_item("t1", &["open models", "weights"], 4.2);
        store.upsert_item(&item).await.unwrap();

        let fetched = store.get_item("t1").await.unwrap().unwrap();
        assert_eq!(fetched.text, "text of t1");
        assert_eq!(fetched.keywords, vec!["open models", "weights"]);
        assert!((fetched.scores.total - 4.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let store = test_store().await;
        let item = make_item("t1", &["alpha", "beta"], 1.0);

        store.upsert_item(&item).await.unwrap();
        store.upsert_item(&item).await.unwrap();

        assert_eq!(store.item_count().await.unwrap(), 1);

        // Keyword rows were replaced, not duplicated.
        let freqs = store
            .keyword_frequencies(Utc::now() - Duration::hours(1), Utc::now())
            .await
            .unwrap();
        assert_eq!(freqs["alpha"], 1);
    }

    #[tokio::test]
    async fn reobservation_replaces_keywords() {
        let store = test_store().await;
        store
            .upsert_item(&make_item("t1", &["old topic"], 1.0))
            .await
            .unwrap();
        store
            .upsert_item(&make_item("t1", &["new topic"], 2.0))
            .await
            .unwrap();

        let freqs = store
            .keyword_frequencies(Utc::now() - Duration::hours(1), Utc::now())
            .await
            .unwrap();
        assert!(!freqs.contains_key("old topic"));
        assert_eq!(freqs["new topic"], 1);
    }

    #[tokio::test]
    async fn fts_search_finds_items() {
        let store = test_store().await;
        store
            .upsert_item(&make_item("t1", &[], 1.0))
            .await
            .unwrap();
        let mut other = make_item("t2", &[], 1.0);
        other.text = "a statement about quantum encryption policy".into();
        store.upsert_item(&other).await.unwrap();

        let results = store.search_items("quantum", 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "t2");
    }

    #[tokio::test]
    async fn keyword_frequencies_respect_window() {
        let store = test_store().await;
        let mut old = make_item("t_old", &["shared"], 1.0);
        old.created_at = Utc::now() - Duration::hours(48);
        store.upsert_item(&old).await.unwrap();
        store
            .upsert_item(&make_item("t_new", &["shared"], 1.0))
            .await
            .unwrap();

        let recent = store
            .keyword_frequencies(Utc::now() - Duration::hours(24), Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(recent["shared"], 1);

        let previous = store
            .keyword_frequencies(
                Utc::now() - Duration::hours(72),
                Utc::now() - Duration::hours(24),
            )
            .await
            .unwrap();
        assert_eq!(previous["shared"], 1);
    }

    #[tokio::test]
    async fn duplicate_axis_rejected_and_existing_untouched() {
        let store = test_store().await;
        let axis = make_axis("axis_open", Utc::now());
        store.create_axis(&axis).await.unwrap();

        let mut dup = make_axis("axis_open", Utc::now());
        dup.label = "something else".into();
        let err = store.create_axis(&dup).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateAxis(_)));

        let kept = store.get_axis("axis_open").await.unwrap().unwrap();
        assert_eq!(kept.label, "open models");
    }

    #[tokio::test]
    async fn evidence_appends_in_order() {
        let store = test_store().await;
        store.create_axis(&make_axis("a", Utc::now())).await.unwrap();

        store
            .append_evidence("a", &make_evidence("t1", PoleAlignment::Right, 1.0))
            .await
            .unwrap();
        store
            .append_evidence("a", &make_evidence("t2", PoleAlignment::Left, 0.5))
            .await
            .unwrap();

        let axis = store.get_axis("a").await.unwrap().unwrap();
        assert_eq!(axis.evidence.len(), 2);
        assert_eq!(axis.evidence[0].source, "t1");
        assert_eq!(axis.evidence[1].alignment, PoleAlignment::Left);
    }

    #[tokio::test]
    async fn evidence_for_unknown_axis_fails() {
        let store = test_store().await;
        let err = store
            .append_evidence("ghost", &make_evidence("t1", PoleAlignment::Right, 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AxisNotFound(_)));
    }

    #[tokio::test]
    async fn axis_scores_update_in_place() {
        let store = test_store().await;
        store.create_axis(&make_axis("a", Utc::now())).await.unwrap();

        let now = Utc::now();
        store.update_axis_scores("a", 0.6, 0.0625, now).await.unwrap();

        let axis = store.get_axis("a").await.unwrap().unwrap();
        assert!((axis.score - 0.6).abs() < 1e-9);
        assert!((axis.confidence - 0.0625).abs() < 1e-9);
    }

    #[tokio::test]
    async fn drift_state_round_trip() {
        let store = test_store().await;
        assert_eq!(store.drift_state("a").await.unwrap().processed, 0);

        let state = DriftState {
            processed: 7,
            cusum_pos: 3.5,
            cusum_neg: 0.0,
        };
        store.save_drift_state("a", &state).await.unwrap();

        let loaded = store.drift_state("a").await.unwrap();
        assert_eq!(loaded.processed, 7);
        assert!((loaded.cusum_pos - 3.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn drift_alerts_append_only() {
        let store = test_store().await;
        let alert = DriftAlert {
            axis_id: "a".into(),
            direction: DriftDirection::TowardRight,
            value: 4.0,
            evidence_index: 7,
            detected_at: Utc::now(),
        };
        store.append_drift_alert(&alert).await.unwrap();
        store.append_drift_alert(&alert).await.unwrap();

        let alerts = store.list_drift_alerts().await.unwrap();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].direction, DriftDirection::TowardRight);
        assert_eq!(alerts[0].evidence_index, 7);
    }

    #[tokio::test]
    async fn redirect_round_trip() {
        let store = test_store().await;
        store.record_redirect("axis_b", "axis_a").await.unwrap();

        assert_eq!(
            store.resolve_redirect("axis_b").await.unwrap().as_deref(),
            Some("axis_a")
        );
        assert!(store.resolve_redirect("axis_a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn embedding_cache_hit_and_stale_miss() {
        let store = test_store().await;
        let vector = vec![0.1f32, 0.2, 0.3];
        store.put_embedding("a", "hash_v1", &vector).await.unwrap();

        let hit = store.cached_embedding("a", "hash_v1").await.unwrap().unwrap();
        assert_eq!(hit.len(), 3);
        assert!((hit[1] - 0.2).abs() < 1e-6);

        // Content changed: the old vector is invisible.
        assert!(store.cached_embedding("a", "hash_v2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn axes_created_between_counts() {
        let store = test_store().await;
        store
            .create_axis(&make_axis("a", Utc::now() - Duration::days(2)))
            .await
            .unwrap();
        store.create_axis(&make_axis("b", Utc::now())).await.unwrap();

        let today = store
            .axes_created_between(Utc::now() - Duration::hours(12), Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(today, 1);
    }

    #[tokio::test]
    async fn list_axes_oldest_first() {
        let store = test_store().await;
        store.create_axis(&make_axis("newer", Utc::now())).await.unwrap();
        store
            .create_axis(&make_axis("older", Utc::now() - Duration::days(1)))
            .await
            .unwrap();

        let axes = store.list_axes().await.unwrap();
        assert_eq!(axes[0].id, "older");
        assert_eq!(axes[1].id, "newer");
    }
}
