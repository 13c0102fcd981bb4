//! Credential store: durable account records keyed by username.
//!
//! Usernames compare case-insensitively (COLLATE NOCASE on the column), so
//! uniqueness and lookups ignore case while the stored spelling is preserved.
//! Secrets arrive here already hashed; this module never sees plaintext.

use sqlx::SqlitePool;

use crate::error::AuthError;

/// Account lifecycle flag. Suspension and deletion are soft: the row stays,
/// so sessions and history keep valid references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountStatus {
    Active,
    Suspended,
    Deleted,
}

impl AccountStatus {
    pub fn as_i64(self) -> i64 {
        match self {
            AccountStatus::Active => 0,
            AccountStatus::Suspended => 1,
            AccountStatus::Deleted => 2,
        }
    }

    pub fn from_i64(v: i64) -> Self {
        match v {
            1 => AccountStatus::Suspended,
            2 => AccountStatus::Deleted,
            _ => AccountStatus::Active,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(AccountStatus::Active),
            "suspended" => Some(AccountStatus::Suspended),
            "deleted" => Some(AccountStatus::Deleted),
            _ => None,
        }
    }
}

/// One account row. `password_hash` is a PHC string; it must never be
/// serialized toward a client.
#[derive(Debug, Clone)]
pub struct Account {
    pub account_id: i64,
    pub username: String,
    pub password_hash: String,
    pub display_name: String,
    pub status: AccountStatus,
    pub created_at: i64,
}

type AccountRow = (i64, String, String, String, i64, i64);

fn row_to_account(row: AccountRow) -> Account {
    Account {
        account_id: row.0,
        username: row.1,
        password_hash: row.2,
        display_name: row.3,
        status: AccountStatus::from_i64(row.4),
        created_at: row.5,
    }
}

/// Insert a new account. The unique index on `username` is the authority on
/// duplicates; a violation surfaces as `DuplicateUsername`.
pub async fn create(
    pool: &SqlitePool,
    username: &str,
    password_hash: &str,
    display_name: &str,
    created_at: i64,
) -> Result<i64, AuthError> {
    let res = sqlx::query(
        "INSERT INTO accounts (username, password_hash, display_name, status, created_at)
         VALUES (?, ?, ?, 0, ?)",
    )
    .bind(username)
    .bind(password_hash)
    .bind(display_name)
    .bind(created_at)
    .execute(pool)
    .await;

    match res {
        Ok(done) => Ok(done.last_insert_rowid()),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(AuthError::DuplicateUsername)
        }
        Err(e) => Err(AuthError::Storage(e)),
    }
}

pub async fn find_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<Account>, sqlx::Error> {
    let row: Option<AccountRow> = sqlx::query_as(
        "SELECT account_id, username, password_hash, display_name, status, created_at
         FROM accounts WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(row_to_account))
}

pub async fn find_by_id(
    pool: &SqlitePool,
    account_id: i64,
) -> Result<Option<Account>, sqlx::Error> {
    let row: Option<AccountRow> = sqlx::query_as(
        "SELECT account_id, username, password_hash, display_name, status, created_at
         FROM accounts WHERE account_id = ?",
    )
    .bind(account_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(row_to_account))
}

pub async fn update_password_hash(
    pool: &SqlitePool,
    account_id: i64,
    new_hash: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE accounts SET password_hash = ? WHERE account_id = ?")
        .bind(new_hash)
        .bind(account_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_status(
    pool: &SqlitePool,
    account_id: i64,
    status: AccountStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE accounts SET status = ? WHERE account_id = ?")
        .bind(status.as_i64())
        .bind(account_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::connect_in_memory;

    #[tokio::test]
    async fn test_create_and_find() {
        let pool = connect_in_memory().await;
        let id = create(&pool, "Alice", "$argon2id$stub", "Alice A", 1_000).await.unwrap();

        let acc = find_by_username(&pool, "Alice").await.unwrap().unwrap();
        assert_eq!(acc.account_id, id);
        assert_eq!(acc.username, "Alice");
        assert_eq!(acc.status, AccountStatus::Active);
        assert_eq!(acc.created_at, 1_000);
    }

    #[tokio::test]
    async fn test_username_lookup_is_case_insensitive() {
        let pool = connect_in_memory().await;
        create(&pool, "Alice", "h", "", 0).await.unwrap();

        let acc = find_by_username(&pool, "aLiCe").await.unwrap();
        assert!(acc.is_some());
        // stored spelling preserved
        assert_eq!(acc.unwrap().username, "Alice");
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected_case_insensitively() {
        let pool = connect_in_memory().await;
        create(&pool, "alice", "h1", "", 0).await.unwrap();

        let err = create(&pool, "ALICE", "h2", "", 0).await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUsername));

        // original hash untouched
        let acc = find_by_username(&pool, "alice").await.unwrap().unwrap();
        assert_eq!(acc.password_hash, "h1");
    }

    #[tokio::test]
    async fn test_set_status_soft_deletes() {
        let pool = connect_in_memory().await;
        let id = create(&pool, "bob", "h", "", 0).await.unwrap();

        set_status(&pool, id, AccountStatus::Deleted).await.unwrap();

        // row still present, just flagged
        let acc = find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(acc.status, AccountStatus::Deleted);
    }

    #[tokio::test]
    async fn test_update_password_hash() {
        let pool = connect_in_memory().await;
        let id = create(&pool, "carol", "old", "", 0).await.unwrap();

        update_password_hash(&pool, id, "new").await.unwrap();

        let acc = find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(acc.password_hash, "new");
    }

    #[test]
    fn test_status_roundtrip() {
        for s in [AccountStatus::Active, AccountStatus::Suspended, AccountStatus::Deleted] {
            assert_eq!(AccountStatus::from_i64(s.as_i64()), s);
            assert_eq!(AccountStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(AccountStatus::parse("banned"), None);
    }
}
