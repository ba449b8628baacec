use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::errors::ImportError;
use crate::models::{Language, Plan, PlannedAction, QuestionType, Record};
use crate::planner::{ApplyMode, ApplyOutcome, LookupStore};

/// SQLite-backed question store. Owns the schema and the persistence
/// timestamps; the importer only sees the [`LookupStore`] contract.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        // One connection keeps `sqlite::memory:` databases shared across
        // queries; imports are sequential anyway.
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect(database_url)
            .await?;
        let store = SqliteStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS questions (
                question_id TEXT PRIMARY KEY,
                question_type TEXT NOT NULL,
                subject TEXT,
                knowledge_point TEXT,
                tags TEXT NOT NULL DEFAULT '[]',
                difficulty TEXT,
                language TEXT NOT NULL,
                content_zh TEXT NOT NULL,
                content_en TEXT,
                payload TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM questions")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    pub async fn get_record(&self, question_id: &str) -> Result<Option<Record>> {
        let row = sqlx::query("SELECT * FROM questions WHERE question_id = ?1")
            .bind(question_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(row_to_record).transpose()
    }

    async fn insert(&self, record: &Record) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO questions (question_id, question_type, subject, knowledge_point,
                                   tags, difficulty, language, content_zh, content_en,
                                   payload, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&record.question_id)
        .bind(record.question_type.as_str())
        .bind(&record.subject)
        .bind(&record.knowledge_point)
        .bind(serde_json::to_string(&record.tags)?)
        .bind(record.difficulty.map(|d| d.as_str()))
        .bind(record.language.as_str())
        .bind(&record.content_zh)
        .bind(&record.content_en)
        .bind(serde_json::to_string(&record.payload)?)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Replacement is total: every canonical column is overwritten.
    /// `created_at` is the one column an update leaves alone.
    async fn update(&self, record: &Record) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            r#"
            UPDATE questions
            SET question_type = ?2, subject = ?3, knowledge_point = ?4, tags = ?5,
                difficulty = ?6, language = ?7, content_zh = ?8, content_en = ?9,
                payload = ?10, updated_at = ?11
            WHERE question_id = ?1
            "#,
        )
        .bind(&record.question_id)
        .bind(record.question_type.as_str())
        .bind(&record.subject)
        .bind(&record.knowledge_point)
        .bind(serde_json::to_string(&record.tags)?)
        .bind(record.difficulty.map(|d| d.as_str()))
        .bind(record.language.as_str())
        .bind(&record.content_zh)
        .bind(&record.content_en)
        .bind(serde_json::to_string(&record.payload)?)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(anyhow!(
                "update of '{}' matched no existing row",
                record.question_id
            ));
        }
        Ok(())
    }

    async fn exec_action(&self, action: &PlannedAction) -> Result<()> {
        match action.plan {
            Plan::Insert => self.insert(&action.record).await,
            Plan::Update => self.update(&action.record).await,
            Plan::Skip => Ok(()),
        }
    }
}

fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<Record> {
    let type_str: String = row.get("question_type");
    let question_type = QuestionType::parse(&type_str)
        .with_context(|| format!("unknown question_type '{}' in store", type_str))?;
    let language_str: String = row.get("language");
    let language = Language::parse(&language_str)
        .with_context(|| format!("unknown language '{}' in store", language_str))?;
    let difficulty = row
        .get::<Option<String>, _>("difficulty")
        .map(|d| {
            crate::models::Difficulty::parse(&d)
                .with_context(|| format!("unknown difficulty '{}' in store", d))
        })
        .transpose()?;

    Ok(Record {
        question_id: row.get("question_id"),
        question_type,
        subject: row.get("subject"),
        knowledge_point: row.get("knowledge_point"),
        tags: serde_json::from_str(&row.get::<String, _>("tags"))?,
        difficulty,
        language,
        content_zh: row.get("content_zh"),
        content_en: row.get("content_en"),
        payload: serde_json::from_str(&row.get::<String, _>("payload"))?,
    })
}

#[async_trait]
impl LookupStore for SqliteStore {
    async fn get(&self, question_id: &str) -> Result<Option<Record>, ImportError> {
        self.get_record(question_id)
            .await
            .map_err(ImportError::StoreRead)
    }

    async fn apply(
        &self,
        actions: &[PlannedAction],
        mode: ApplyMode,
    ) -> Result<ApplyOutcome, ImportError> {
        match mode {
            ApplyMode::Atomic => {
                // One transaction for the whole batch; a failure rolls
                // everything back.
                let mut tx =
                    self.pool.begin().await.map_err(|e| ImportError::StoreFailure {
                        applied: 0,
                        total: actions.len(),
                        source: e.into(),
                    })?;
                for (i, action) in actions.iter().enumerate() {
                    if let Err(e) = exec_in_tx(&mut tx, action).await {
                        let _ = tx.rollback().await;
                        return Err(ImportError::StoreFailure {
                            applied: i,
                            total: actions.len(),
                            source: e,
                        });
                    }
                }
                tx.commit().await.map_err(|e| ImportError::StoreFailure {
                    applied: 0,
                    total: actions.len(),
                    source: e.into(),
                })?;
                Ok(ApplyOutcome {
                    applied: actions.len(),
                })
            }
            ApplyMode::PerRecord => {
                for (i, action) in actions.iter().enumerate() {
                    if let Err(e) = self.exec_action(action).await {
                        return Err(ImportError::StoreFailure {
                            applied: i,
                            total: actions.len(),
                            source: e,
                        });
                    }
                }
                Ok(ApplyOutcome {
                    applied: actions.len(),
                })
            }
        }
    }
}

async fn exec_in_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    action: &PlannedAction,
) -> Result<()> {
    let record = &action.record;
    let now = Utc::now().to_rfc3339();
    match action.plan {
        Plan::Insert => {
            sqlx::query(
                r#"
                INSERT INTO questions (question_id, question_type, subject, knowledge_point,
                                       tags, difficulty, language, content_zh, content_en,
                                       payload, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
                "#,
            )
            .bind(&record.question_id)
            .bind(record.question_type.as_str())
            .bind(&record.subject)
            .bind(&record.knowledge_point)
            .bind(serde_json::to_string(&record.tags)?)
            .bind(record.difficulty.map(|d| d.as_str()))
            .bind(record.language.as_str())
            .bind(&record.content_zh)
            .bind(&record.content_en)
            .bind(serde_json::to_string(&record.payload)?)
            .bind(&now)
            .bind(&now)
            .execute(&mut **tx)
            .await?;
        }
        Plan::Update => {
            sqlx::query(
                r#"
                UPDATE questions
                SET question_type = ?2, subject = ?3, knowledge_point = ?4, tags = ?5,
                    difficulty = ?6, language = ?7, content_zh = ?8, content_en = ?9,
                    payload = ?10, updated_at = ?11
                WHERE question_id = ?1
                "#,
            )
            .bind(&record.question_id)
            .bind(record.question_type.as_str())
            .bind(&record.subject)
            .bind(&record.knowledge_point)
            .bind(serde_json::to_string(&record.tags)?)
            .bind(record.difficulty.map(|d| d.as_str()))
            .bind(record.language.as_str())
            .bind(&record.content_zh)
            .bind(&record.content_en)
            .bind(serde_json::to_string(&record.payload)?)
            .bind(&now)
            .execute(&mut **tx)
            .await?;
        }
        Plan::Skip => {}
    }
    Ok(())
}
