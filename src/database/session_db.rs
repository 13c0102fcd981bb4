//! Session registry persistence.
//!
//! Every mutation is a single UPDATE/DELETE guarded by a WHERE clause on the
//! current state, so concurrent operations on one token serialize through the
//! storage layer and observe a consistent view.

use sqlx::SqlitePool;

use crate::session::{Session, SessionOrigin};

type SessionRow = (String, i64, i64, i64, i64, i64, i64);

fn row_to_session(row: SessionRow) -> Session {
    Session {
        token: row.0,
        account_id: row.1,
        origin: SessionOrigin::from_i64(row.2),
        issued_at: row.3,
        expires_at: row.4,
        last_seen: row.5,
        revoked: row.6 != 0,
    }
}

pub async fn insert(pool: &SqlitePool, s: &Session) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO sessions (token, account_id, origin, issued_at, expires_at, last_seen, revoked)
         VALUES (?, ?, ?, ?, ?, ?, 0)",
    )
    .bind(&s.token)
    .bind(s.account_id)
    .bind(s.origin.as_i64())
    .bind(s.issued_at)
    .bind(s.expires_at)
    .bind(s.last_seen)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get(pool: &SqlitePool, token: &str) -> Result<Option<Session>, sqlx::Error> {
    let row: Option<SessionRow> = sqlx::query_as(
        "SELECT token, account_id, origin, issued_at, expires_at, last_seen, revoked
         FROM sessions WHERE token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(row_to_session))
}

/// Refresh `last_seen` (and the expiry, under a sliding policy) for a session
/// that is still live at `now`. Returns the number of rows updated: 0 means
/// the session was missing, revoked, or already past expiry.
pub async fn touch(
    pool: &SqlitePool,
    token: &str,
    now: i64,
    new_expires_at: i64,
) -> Result<u64, sqlx::Error> {
    let done = sqlx::query(
        "UPDATE sessions SET last_seen = ?, expires_at = ?
         WHERE token = ? AND revoked = 0 AND expires_at > ?",
    )
    .bind(now)
    .bind(new_expires_at)
    .bind(token)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(done.rows_affected())
}

/// Flip the revoked flag. Returns rows updated (0 if unknown or already
/// revoked).
pub async fn revoke(pool: &SqlitePool, token: &str) -> Result<u64, sqlx::Error> {
    let done = sqlx::query("UPDATE sessions SET revoked = 1 WHERE token = ? AND revoked = 0")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(done.rows_affected())
}

pub async fn revoke_all_for_account(
    pool: &SqlitePool,
    account_id: i64,
) -> Result<u64, sqlx::Error> {
    let done = sqlx::query("UPDATE sessions SET revoked = 1 WHERE account_id = ? AND revoked = 0")
        .bind(account_id)
        .execute(pool)
        .await?;
    Ok(done.rows_affected())
}

/// Revoke live sessions for one (account, origin) pair. Used by the
/// single-session policy just before issuing a replacement.
pub async fn revoke_for_account_origin(
    pool: &SqlitePool,
    account_id: i64,
    origin: SessionOrigin,
) -> Result<u64, sqlx::Error> {
    let done = sqlx::query(
        "UPDATE sessions SET revoked = 1
         WHERE account_id = ? AND origin = ? AND revoked = 0",
    )
    .bind(account_id)
    .bind(origin.as_i64())
    .execute(pool)
    .await?;
    Ok(done.rows_affected())
}

/// Drop rows past expiry as of `now`. Validation does its own lazy expiry
/// check, so this is purely a space reclaim. Revoked rows are kept until they
/// expire so that validation keeps reporting them as revoked, not missing.
pub async fn delete_dead(pool: &SqlitePool, now: i64) -> Result<u64, sqlx::Error> {
    let done = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
        .bind(now)
        .execute(pool)
        .await?;
    Ok(done.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{account_db, connect_in_memory};

    async fn seed(pool: &SqlitePool, token: &str, expires_at: i64) -> Session {
        let account_id = account_db::create(pool, &format!("u{token}"), "h", "", 0)
            .await
            .unwrap();
        let s = Session {
            token: token.to_string(),
            account_id,
            origin: SessionOrigin::Rest,
            issued_at: 100,
            expires_at,
            last_seen: 100,
            revoked: false,
        };
        insert(pool, &s).await.unwrap();
        s
    }

    #[tokio::test]
    async fn test_insert_and_get_roundtrip() {
        let pool = connect_in_memory().await;
        let s = seed(&pool, "tok1", 1_000).await;

        let got = get(&pool, "tok1").await.unwrap().unwrap();
        assert_eq!(got.token, s.token);
        assert_eq!(got.account_id, s.account_id);
        assert_eq!(got.origin, SessionOrigin::Rest);
        assert!(!got.revoked);
    }

    #[tokio::test]
    async fn test_touch_skips_revoked_and_expired() {
        let pool = connect_in_memory().await;
        seed(&pool, "live", 1_000).await;
        seed(&pool, "old", 150).await;

        // live session at now=200 updates
        assert_eq!(touch(&pool, "live", 200, 1_200).await.unwrap(), 1);
        // expired session does not
        assert_eq!(touch(&pool, "old", 200, 1_200).await.unwrap(), 0);

        revoke(&pool, "live").await.unwrap();
        assert_eq!(touch(&pool, "live", 300, 1_300).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_revoke_is_single_shot() {
        let pool = connect_in_memory().await;
        seed(&pool, "tok", 1_000).await;

        assert_eq!(revoke(&pool, "tok").await.unwrap(), 1);
        assert_eq!(revoke(&pool, "tok").await.unwrap(), 0);
        assert_eq!(revoke(&pool, "missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_revoke_for_account_origin_leaves_other_origin() {
        let pool = connect_in_memory().await;
        let account_id = account_db::create(&pool, "dana", "h", "", 0).await.unwrap();
        for (tok, origin) in [("s1", SessionOrigin::Soap), ("r1", SessionOrigin::Rest)] {
            let s = Session {
                token: tok.into(),
                account_id,
                origin,
                issued_at: 0,
                expires_at: 1_000,
                last_seen: 0,
                revoked: false,
            };
            insert(&pool, &s).await.unwrap();
        }

        let n = revoke_for_account_origin(&pool, account_id, SessionOrigin::Soap)
            .await
            .unwrap();
        assert_eq!(n, 1);
        assert!(get(&pool, "s1").await.unwrap().unwrap().revoked);
        assert!(!get(&pool, "r1").await.unwrap().unwrap().revoked);
    }

    #[tokio::test]
    async fn test_delete_dead_reclaims_expired_only() {
        let pool = connect_in_memory().await;
        seed(&pool, "gone", 150).await;
        seed(&pool, "live", 1_000).await;
        seed(&pool, "rev", 1_000).await;
        revoke(&pool, "rev").await.unwrap();

        let n = delete_dead(&pool, 200).await.unwrap();
        assert_eq!(n, 1);
        assert!(get(&pool, "gone").await.unwrap().is_none());
        // revoked but unexpired rows survive the sweep
        assert!(get(&pool, "rev").await.unwrap().is_some());
        assert!(get(&pool, "live").await.unwrap().is_some());
    }
}
