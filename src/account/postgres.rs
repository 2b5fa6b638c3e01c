use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, Connection, PgPool, Row};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use super::{Account, AccountStore, NewAccount, StoreError, StoreResult};

const ACCOUNT_COLUMNS: &str = "id, email, username, password_hash, verified, \
     verification_token_hash, verification_token_expiry, created_at, updated_at";

/// Postgres-backed account store.
#[derive(Clone, Debug)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations.
    ///
    /// # Errors
    /// Returns an error if a migration fails to apply.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .context("failed to run database migrations")
    }
}

fn db_span(operation: &'static str, statement: &str) -> tracing::Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn account_from_row(row: &PgRow) -> Account {
    Account {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        password_hash: row.get("password_hash"),
        verified: row.get("verified"),
        verification_token_hash: row.get("verification_token_hash"),
        verification_token_expiry: row.get("verification_token_expiry"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = $1");
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await
            .context("failed to lookup account by email")?;

        Ok(row.as_ref().map(account_from_row))
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Account>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await
            .context("failed to lookup account by id")?;

        Ok(row.as_ref().map(account_from_row))
    }

    async fn create(&self, account: NewAccount) -> StoreResult<Account> {
        let query = format!(
            r"
            INSERT INTO accounts
                (id, email, username, password_hash, verified,
                 verification_token_hash, verification_token_expiry)
            VALUES ($1, $2, $3, $4, FALSE, $5, $6)
            RETURNING {ACCOUNT_COLUMNS}
            "
        );
        let row = sqlx::query(&query)
            .bind(Uuid::new_v4())
            .bind(&account.email)
            .bind(&account.username)
            .bind(&account.password_hash)
            .bind(&account.verification_token_hash)
            .bind(account.verification_token_expiry)
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", &query))
            .await;

        match row {
            Ok(row) => Ok(account_from_row(&row)),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Duplicate),
            Err(err) => Err(StoreError::Backend(
                anyhow::Error::new(err).context("failed to insert account"),
            )),
        }
    }

    async fn save(&self, account: &Account) -> StoreResult<()> {
        let query = r"
            UPDATE accounts
            SET email = $2,
                username = $3,
                password_hash = $4,
                verified = $5,
                verification_token_hash = $6,
                verification_token_expiry = $7,
                updated_at = $8
            WHERE id = $1
        ";
        let result = sqlx::query(query)
            .bind(account.id)
            .bind(&account.email)
            .bind(&account.username)
            .bind(&account.password_hash)
            .bind(account.verified)
            .bind(&account.verification_token_hash)
            .bind(account.verification_token_expiry)
            .bind(account.updated_at)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(StoreError::Duplicate),
            Err(err) => Err(StoreError::Backend(
                anyhow::Error::new(err).context("failed to save account"),
            )),
        }
    }

    async fn consume_verification_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Account>> {
        // Match and clear in one statement so a token can only ever be consumed once.
        let query = format!(
            r"
            UPDATE accounts
            SET verified = TRUE,
                verification_token_hash = NULL,
                verification_token_expiry = NULL,
                updated_at = $2
            WHERE verification_token_hash = $1
              AND verification_token_expiry > $2
              AND verified = FALSE
            RETURNING {ACCOUNT_COLUMNS}
            "
        );
        let row = sqlx::query(&query)
            .bind(token_hash)
            .bind(now)
            .fetch_optional(&self.pool)
            .instrument(db_span("UPDATE", &query))
            .await
            .context("failed to consume verification token")?;

        Ok(row.as_ref().map(account_from_row))
    }

    async fn reissue_verification_token(
        &self,
        id: Uuid,
        token_hash: &str,
        expiry: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let query = r"
            UPDATE accounts
            SET verification_token_hash = $2,
                verification_token_expiry = $3,
                updated_at = NOW()
            WHERE id = $1
              AND verified = FALSE
        ";
        let result = sqlx::query(query)
            .bind(id)
            .bind(token_hash)
            .bind(expiry)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to reissue verification token")?;

        Ok(result.rows_affected() == 1)
    }

    async fn ping(&self) -> StoreResult<()> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .context("failed to acquire database connection")?;

        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .context("failed to ping database")?;

        Ok(())
    }
}
