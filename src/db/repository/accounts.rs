//! Panel account repository

use sqlx::PgPool;
use uuid::Uuid;

use crate::db::models::AccountRow;

const ACCOUNT_COLUMNS: &str = "id, email, name, password_hash, salt, server_name, server_url, \
                               api_key, role, created_at";

/// Fields for a new account. Hashing happens in the handler; the
/// repository only stores what it is given.
#[derive(Debug)]
pub struct NewAccount {
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub salt: String,
    pub server_name: Option<String>,
    pub server_url: Option<String>,
    pub api_key: Option<String>,
    pub role: String,
}

pub async fn find_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<AccountRow>, sqlx::Error> {
    sqlx::query_as::<_, AccountRow>(&format!(
        "SELECT {} FROM accounts WHERE email = $1",
        ACCOUNT_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<AccountRow>, sqlx::Error> {
    sqlx::query_as::<_, AccountRow>(&format!(
        "SELECT {} FROM accounts WHERE id = $1",
        ACCOUNT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn list(pool: &PgPool) -> Result<Vec<AccountRow>, sqlx::Error> {
    sqlx::query_as::<_, AccountRow>(&format!(
        "SELECT {} FROM accounts ORDER BY created_at",
        ACCOUNT_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

pub async fn insert(pool: &PgPool, account: &NewAccount) -> Result<AccountRow, sqlx::Error> {
    sqlx::query_as::<_, AccountRow>(&format!(
        r#"
        INSERT INTO accounts (id, email, name, password_hash, salt, server_name, server_url, api_key, role)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {}
        "#,
        ACCOUNT_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(&account.email)
    .bind(&account.name)
    .bind(&account.password_hash)
    .bind(&account.salt)
    .bind(&account.server_name)
    .bind(&account.server_url)
    .bind(&account.api_key)
    .bind(&account.role)
    .fetch_one(pool)
    .await
}

/// Update an existing account. The password hash/salt pair is only touched
/// when a new one is supplied.
pub async fn update(
    pool: &PgPool,
    id: Uuid,
    email: &str,
    name: &str,
    new_password: Option<(&str, &str)>,
    server_name: Option<&str>,
    server_url: Option<&str>,
    api_key: Option<&str>,
    role: &str,
) -> Result<Option<AccountRow>, sqlx::Error> {
    let row = match new_password {
        Some((hash, salt)) => {
            sqlx::query_as::<_, AccountRow>(&format!(
                r#"
                UPDATE accounts
                SET email = $2, name = $3, password_hash = $4, salt = $5,
                    server_name = $6, server_url = $7, api_key = $8, role = $9
                WHERE id = $1
                RETURNING {}
                "#,
                ACCOUNT_COLUMNS
            ))
            .bind(id)
            .bind(email)
            .bind(name)
            .bind(hash)
            .bind(salt)
            .bind(server_name)
            .bind(server_url)
            .bind(api_key)
            .bind(role)
            .fetch_optional(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, AccountRow>(&format!(
                r#"
                UPDATE accounts
                SET email = $2, name = $3, server_name = $4, server_url = $5,
                    api_key = $6, role = $7
                WHERE id = $1
                RETURNING {}
                "#,
                ACCOUNT_COLUMNS
            ))
            .bind(id)
            .bind(email)
            .bind(name)
            .bind(server_name)
            .bind(server_url)
            .bind(api_key)
            .bind(role)
            .fetch_optional(pool)
            .await?
        }
    };

    Ok(row)
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM accounts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
