//! `PostgreSQL` account store keyed by `Uuid`.
//!
//! Schema lives in `sql/schema.sql`. Uniqueness (username, login link,
//! email, phone number) is enforced by the database; unique violations come
//! back as store rejections. Confirmation tokens are stored hashed and are
//! redeemed and applied in a single statement.

use anyhow::Context;
use async_trait::async_trait;
use secrecy::SecretString;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{Instrument, Span};
use uuid::Uuid;

use super::lockout::LockoutPolicy;
use super::password::verify_password;
use super::utils::{
    duplicate_email, duplicate_phone, duplicate_username, generate_token, invalid_email,
    invalid_phone, invalid_token, login_already_associated, valid_email,
};
use crate::identity::{
    Account, AccountStore, Claim, LoginInfo, Mutation, NewAccount, Rejection, StoreCapabilities,
    StoreError, StoreResult,
};

const DEFAULT_TOKEN_TTL_SECONDS: i64 = 30 * 60;
const PURPOSE_CONFIRM_EMAIL: &str = "confirm_email";
const PURPOSE_CHANGE_PHONE: &str = "change_phone_number";

const ACCOUNT_COLUMNS: &str =
    "id, username, email, email_confirmed, phone_number, phone_number_confirmed";

#[derive(Clone, Debug)]
pub struct PgAccountStore {
    pool: PgPool,
    lockout: LockoutPolicy,
    token_ttl_seconds: i64,
}

impl PgAccountStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lockout: LockoutPolicy::default(),
            token_ttl_seconds: DEFAULT_TOKEN_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_lockout_policy(mut self, policy: LockoutPolicy) -> Self {
        self.lockout = policy;
        self
    }

    #[must_use]
    pub fn with_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn find_one(&self, query: &str, bind: &str) -> StoreResult<Option<Account<Uuid>>> {
        let row = sqlx::query(query)
            .bind(bind)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup account")?;
        Ok(row.as_ref().map(account_from_row).transpose().context("failed to decode account")?)
    }

    async fn store_token(
        &self,
        id: &Uuid,
        purpose: &str,
        phone_number: Option<&str>,
    ) -> StoreResult<String> {
        let token = generate_token()?;
        let query = r"
            INSERT INTO account_tokens (account_id, purpose, token_hash, phone_number, expires_at)
            VALUES ($1, $2, $3, $4, NOW() + ($5 * INTERVAL '1 second'))
            ON CONFLICT (account_id, purpose) DO UPDATE
            SET token_hash = EXCLUDED.token_hash,
                phone_number = EXCLUDED.phone_number,
                expires_at = EXCLUDED.expires_at
        ";
        let result = sqlx::query(query)
            .bind(id)
            .bind(purpose)
            .bind(hash_token(&token))
            .bind(phone_number)
            .bind(self.token_ttl_seconds)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await;

        match result {
            Ok(_) => Ok(token),
            Err(err) if is_foreign_key_violation(&err) => {
                Err(StoreError::UnknownAccount(id.to_string()))
            }
            Err(err) => Err(anyhow::Error::new(err)
                .context("failed to store confirmation token")
                .into()),
        }
    }

    async fn update_account(&self, query: &str, id: &Uuid) -> StoreResult<()> {
        let result = sqlx::query(query)
            .bind(id)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to update account")?;
        if result.rows_affected() == 0 {
            return Err(StoreError::UnknownAccount(id.to_string()));
        }
        Ok(())
    }
}

fn db_span(operation: &'static str, statement: &str) -> Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn account_from_row(row: &PgRow) -> Result<Account<Uuid>, sqlx::Error> {
    Ok(Account {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        email_confirmed: row.try_get("email_confirmed")?,
        phone_number: row.try_get("phone_number")?,
        phone_number_confirmed: row.try_get("phone_number_confirmed")?,
    })
}

/// Tokens are stored hashed so a database read never yields a usable token.
fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    has_sql_state(err, "23505")
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    has_sql_state(err, "23503")
}

fn has_sql_state(err: &sqlx::Error, state: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == state),
        _ => false,
    }
}

#[async_trait]
impl AccountStore for PgAccountStore {
    type Key = Uuid;

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities::all()
    }

    async fn find_by_id(&self, id: &Uuid) -> StoreResult<Option<Account<Uuid>>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", &query))
            .await
            .context("failed to lookup account by id")?;
        Ok(row.as_ref().map(account_from_row).transpose().context("failed to decode account")?)
    }

    async fn find_by_username(&self, username: &str) -> StoreResult<Option<Account<Uuid>>> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = $1");
        self.find_one(&query, username).await
    }

    async fn find_by_login(&self, login: &LoginInfo) -> StoreResult<Option<Account<Uuid>>> {
        let query = r"
            SELECT a.id, a.username, a.email, a.email_confirmed, a.phone_number, a.phone_number_confirmed
            FROM accounts a
            JOIN account_logins l ON l.account_id = a.id
            WHERE l.provider = $1 AND l.provider_key = $2
        ";
        let row = sqlx::query(query)
            .bind(&login.provider)
            .bind(&login.provider_key)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to lookup account by login")?;
        Ok(row.as_ref().map(account_from_row).transpose().context("failed to decode account")?)
    }

    async fn create(&self, account: NewAccount) -> Mutation<Account<Uuid>> {
        let query = format!("INSERT INTO accounts (username) VALUES ($1) RETURNING {ACCOUNT_COLUMNS}");
        let row = sqlx::query(&query)
            .bind(&account.username)
            .fetch_one(&self.pool)
            .instrument(db_span("INSERT", &query))
            .await;

        match row {
            Ok(row) => Ok(Ok(account_from_row(&row).context("failed to decode account")?)),
            Err(err) if is_unique_violation(&err) => {
                Ok(Err(Rejection::new(duplicate_username(&account.username))))
            }
            Err(err) => Err(anyhow::Error::new(err).context("failed to insert account").into()),
        }
    }

    async fn add_login(&self, id: &Uuid, login: LoginInfo) -> Mutation {
        let query =
            "INSERT INTO account_logins (provider, provider_key, account_id) VALUES ($1, $2, $3)";
        let result = sqlx::query(query)
            .bind(&login.provider)
            .bind(&login.provider_key)
            .bind(id)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await;

        match result {
            Ok(_) => Ok(Ok(())),
            Err(err) if is_unique_violation(&err) => {
                Ok(Err(Rejection::new(login_already_associated())))
            }
            Err(err) if is_foreign_key_violation(&err) => {
                Err(StoreError::UnknownAccount(id.to_string()))
            }
            Err(err) => Err(anyhow::Error::new(err).context("failed to insert login").into()),
        }
    }

    async fn set_email(&self, id: &Uuid, email: &str) -> Mutation {
        if !valid_email(email) {
            return Ok(Err(Rejection::new(invalid_email(email))));
        }

        let query = "UPDATE accounts SET email = $2, email_confirmed = FALSE WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .bind(email)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(StoreError::UnknownAccount(id.to_string())),
            Ok(_) => Ok(Ok(())),
            Err(err) if is_unique_violation(&err) => Ok(Err(Rejection::new(duplicate_email(email)))),
            Err(err) => Err(anyhow::Error::new(err).context("failed to set email").into()),
        }
    }

    async fn generate_email_confirmation_token(&self, id: &Uuid) -> StoreResult<String> {
        self.store_token(id, PURPOSE_CONFIRM_EMAIL, None).await
    }

    async fn confirm_email(&self, id: &Uuid, token: &str) -> Mutation {
        let query = r"
            WITH redeemed AS (
                DELETE FROM account_tokens
                WHERE account_id = $1 AND purpose = $2 AND token_hash = $3 AND expires_at > NOW()
                RETURNING account_id
            )
            UPDATE accounts SET email_confirmed = TRUE
            WHERE id IN (SELECT account_id FROM redeemed)
        ";
        let result = sqlx::query(query)
            .bind(id)
            .bind(PURPOSE_CONFIRM_EMAIL)
            .bind(hash_token(token))
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to confirm email")?;

        if result.rows_affected() == 0 {
            return Ok(Err(Rejection::new(invalid_token())));
        }
        Ok(Ok(()))
    }

    async fn set_phone_number(&self, id: &Uuid, phone_number: &str) -> Mutation {
        if phone_number.trim().is_empty() {
            return Ok(Err(Rejection::new(invalid_phone(phone_number))));
        }

        let query =
            "UPDATE accounts SET phone_number = $2, phone_number_confirmed = FALSE WHERE id = $1";
        let result = sqlx::query(query)
            .bind(id)
            .bind(phone_number)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(StoreError::UnknownAccount(id.to_string())),
            Ok(_) => Ok(Ok(())),
            Err(err) if is_unique_violation(&err) => {
                Ok(Err(Rejection::new(duplicate_phone(phone_number))))
            }
            Err(err) => Err(anyhow::Error::new(err).context("failed to set phone number").into()),
        }
    }

    async fn generate_change_phone_number_token(
        &self,
        id: &Uuid,
        phone_number: &str,
    ) -> StoreResult<String> {
        self.store_token(id, PURPOSE_CHANGE_PHONE, Some(phone_number))
            .await
    }

    async fn change_phone_number(&self, id: &Uuid, phone_number: &str, token: &str) -> Mutation {
        let query = r"
            WITH redeemed AS (
                DELETE FROM account_tokens
                WHERE account_id = $1 AND purpose = $2 AND token_hash = $3
                  AND phone_number = $4 AND expires_at > NOW()
                RETURNING account_id
            )
            UPDATE accounts SET phone_number = $4, phone_number_confirmed = TRUE
            WHERE id IN (SELECT account_id FROM redeemed)
        ";
        let result = sqlx::query(query)
            .bind(id)
            .bind(PURPOSE_CHANGE_PHONE)
            .bind(hash_token(token))
            .bind(phone_number)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Ok(Err(Rejection::new(invalid_token()))),
            Ok(_) => Ok(Ok(())),
            Err(err) if is_unique_violation(&err) => {
                Ok(Err(Rejection::new(duplicate_phone(phone_number))))
            }
            Err(err) => Err(anyhow::Error::new(err)
                .context("failed to change phone number")
                .into()),
        }
    }

    async fn claims(&self, id: &Uuid) -> StoreResult<Vec<Claim>> {
        let query = r"
            SELECT claim_type, claim_value FROM account_claims
            WHERE account_id = $1
            ORDER BY id
        ";
        let rows = sqlx::query(query)
            .bind(id)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to load claims")?;

        rows.iter()
            .map(|row| -> Result<Claim, sqlx::Error> {
                Ok(Claim::new(
                    row.try_get::<String, _>("claim_type")?,
                    row.try_get::<String, _>("claim_value")?,
                ))
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .context("failed to decode claims")
            .map_err(StoreError::from)
    }

    async fn add_claim(&self, id: &Uuid, claim: Claim) -> Mutation {
        let query =
            "INSERT INTO account_claims (account_id, claim_type, claim_value) VALUES ($1, $2, $3)";
        let result = sqlx::query(query)
            .bind(id)
            .bind(&claim.claim_type)
            .bind(&claim.value)
            .execute(&self.pool)
            .instrument(db_span("INSERT", query))
            .await;

        match result {
            Ok(_) => Ok(Ok(())),
            Err(err) if is_foreign_key_violation(&err) => {
                Err(StoreError::UnknownAccount(id.to_string()))
            }
            Err(err) => Err(anyhow::Error::new(err).context("failed to insert claim").into()),
        }
    }

    async fn roles(&self, id: &Uuid) -> StoreResult<Vec<String>> {
        let query = "SELECT role FROM account_roles WHERE account_id = $1 ORDER BY role";
        let rows = sqlx::query(query)
            .bind(id)
            .fetch_all(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to load roles")?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("role"))
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .context("failed to decode roles")
            .map_err(StoreError::from)
    }

    async fn check_password(
        &self,
        account: &Account<Uuid>,
        password: &SecretString,
    ) -> StoreResult<bool> {
        let query = "SELECT password_hash FROM accounts WHERE id = $1";
        let row = sqlx::query(query)
            .bind(account.id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to load password hash")?;

        let Some(row) = row else {
            return Err(StoreError::UnknownAccount(account.id.to_string()));
        };
        let password_hash: Option<String> = row
            .try_get("password_hash")
            .context("failed to decode password hash")?;

        Ok(password_hash.is_some_and(|phc| verify_password(password, &phc)))
    }

    async fn is_locked_out(&self, id: &Uuid) -> StoreResult<bool> {
        let query = "SELECT COALESCE(lockout_end > NOW(), FALSE) AS locked FROM accounts WHERE id = $1";
        let row = sqlx::query(query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(db_span("SELECT", query))
            .await
            .context("failed to load lockout state")?;

        let Some(row) = row else {
            return Err(StoreError::UnknownAccount(id.to_string()));
        };
        Ok(row.try_get("locked").context("failed to decode lockout state")?)
    }

    async fn access_failed(&self, id: &Uuid) -> Mutation {
        // SET expressions see the pre-update row, so the threshold check and
        // the counter reset happen in one atomic statement.
        let query = r"
            UPDATE accounts SET
                access_failed_count = CASE
                    WHEN access_failed_count + 1 >= $2 THEN 0
                    ELSE access_failed_count + 1
                END,
                lockout_end = CASE
                    WHEN access_failed_count + 1 >= $2 THEN NOW() + ($3 * INTERVAL '1 second')
                    ELSE lockout_end
                END
            WHERE id = $1
        ";
        let max_attempts = i32::try_from(self.lockout.max_failed_attempts()).unwrap_or(i32::MAX);
        let lockout_seconds =
            i64::try_from(self.lockout.lockout_duration().as_secs()).unwrap_or(i64::MAX);
        let result = sqlx::query(query)
            .bind(id)
            .bind(max_attempts)
            .bind(lockout_seconds)
            .execute(&self.pool)
            .instrument(db_span("UPDATE", query))
            .await
            .context("failed to record failed attempt")?;

        if result.rows_affected() == 0 {
            return Err(StoreError::UnknownAccount(id.to_string()));
        }
        Ok(Ok(()))
    }

    async fn reset_access_failed_count(&self, id: &Uuid) -> Mutation {
        self.update_account("UPDATE accounts SET access_failed_count = 0 WHERE id = $1", id)
            .await?;
        Ok(Ok(()))
    }
}
