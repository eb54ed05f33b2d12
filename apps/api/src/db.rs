use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS questions (
        id          UUID PRIMARY KEY,
        question    TEXT NOT NULL CHECK (length(trim(question)) > 0),
        type        VARCHAR(32) NOT NULL CHECK (type IN ('behavioral', 'technical', 'situational',
                        'coding', 'sql_query_writing', 'python_data_science')),
        category    VARCHAR(100) NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS practice_sessions (
        id                  UUID PRIMARY KEY,
        title               VARCHAR(255) NOT NULL,
        subject             VARCHAR(100) NOT NULL,
        created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        completed_at        TIMESTAMPTZ,
        total_questions     INTEGER NOT NULL DEFAULT 0 CHECK (total_questions >= 0),
        completed_questions INTEGER NOT NULL DEFAULT 0 CHECK (completed_questions >= 0),
        resume              TEXT,
        job_description     TEXT,
        candidate_analysis  TEXT,
        question_ids        UUID[] NOT NULL DEFAULT '{}'
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS responses (
        id             UUID PRIMARY KEY,
        session_id     UUID NOT NULL REFERENCES practice_sessions(id) ON DELETE CASCADE,
        question_id    UUID NOT NULL REFERENCES questions(id),
        question_text  TEXT NOT NULL,
        audio_url      TEXT,
        video_url      TEXT,
        text_response  TEXT,
        transcription  TEXT,
        evaluation     JSONB NOT NULL,
        created_at     TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_responses_session ON responses (session_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_questions_created ON questions (created_at DESC)",
];

/// Creates the tables on first start. Idempotent.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Database tables created/verified");
    Ok(())
}
