use crate::db::models::{ConnectedAccount, NewConnection, NewReview, Review};
use crate::db::schema::SQLITE_INIT;
use crate::error::RelayError;
use crate::types::{Platform, Sentiment};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Pool, Row, Sqlite};
use std::str::FromStr;

pub type SqlitePool = Pool<Sqlite>;

const ACCOUNT_COLUMNS: &str = "id, user_id, platform, access_token, refresh_token, expires_at, \
     is_active, account_email, location_id, location_name, created_at, updated_at";

const REVIEW_COLUMNS: &str = "id, user_id, platform, platform_review_id, reviewer_name, \
     reviewer_avatar, rating, body, reviewed_at, ingested_at, blurb, sentiment";

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self, RelayError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let mut pool_opts = SqlitePoolOptions::new();
        if database_url.contains(":memory:") {
            // Every connection to :memory: is its own database.
            pool_opts = pool_opts
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_opts.connect_with(connect_opts).await?;
        let storage = Self::new(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), RelayError> {
        // sqlx::query runs a single statement at a time
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Create or update the connection for (user, platform). Returns the row id.
    /// A missing refresh token in `conn` keeps the one already stored.
    pub async fn upsert_connected_account(&self, conn: NewConnection) -> Result<i64, RelayError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO connected_accounts (
                user_id, platform, access_token, refresh_token, expires_at,
                is_active, account_email, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, 1, ?, ?, ?)
            ON CONFLICT(user_id, platform) DO UPDATE SET
                access_token=excluded.access_token,
                refresh_token=COALESCE(excluded.refresh_token, connected_accounts.refresh_token),
                expires_at=excluded.expires_at,
                is_active=1,
                account_email=COALESCE(excluded.account_email, connected_accounts.account_email),
                updated_at=excluded.updated_at
            "#,
        )
        .bind(&conn.user_id)
        .bind(conn.platform.as_str())
        .bind(conn.access_token)
        .bind(conn.refresh_token)
        .bind(conn.expires_at.map(|t| t.to_rfc3339()))
        .bind(conn.account_email)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let rec: (i64,) =
            sqlx::query_as("SELECT id FROM connected_accounts WHERE user_id = ? AND platform = ?")
                .bind(&conn.user_id)
                .bind(conn.platform.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(rec.0)
    }

    pub async fn get_connected_account(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<Option<ConnectedAccount>, RelayError> {
        let sql = format!(
            "SELECT {ACCOUNT_COLUMNS} FROM connected_accounts WHERE user_id = ? AND platform = ?"
        );
        let row = sqlx::query(&sql)
            .bind(user_id)
            .bind(platform.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_account).transpose()
    }

    /// Persist a refreshed token set. A `None` refresh token keeps the stored one.
    pub async fn update_tokens(
        &self,
        id: i64,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), RelayError> {
        sqlx::query(
            r#"UPDATE connected_accounts SET
                access_token = ?,
                refresh_token = COALESCE(?, refresh_token),
                expires_at = ?,
                updated_at = ?
              WHERE id = ?"#,
        )
        .bind(access_token)
        .bind(refresh_token)
        .bind(expires_at.map(|t| t.to_rfc3339()))
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Returns false when the user has no connection for `platform`.
    pub async fn set_location(
        &self,
        user_id: &str,
        platform: Platform,
        location_id: &str,
        location_name: &str,
    ) -> Result<bool, RelayError> {
        let res = sqlx::query(
            r#"UPDATE connected_accounts SET
                location_id = ?,
                location_name = ?,
                updated_at = ?
              WHERE user_id = ? AND platform = ?"#,
        )
        .bind(location_id)
        .bind(location_name)
        .bind(Utc::now().to_rfc3339())
        .bind(user_id)
        .bind(platform.as_str())
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn delete_connected_account(
        &self,
        user_id: &str,
        platform: Platform,
    ) -> Result<bool, RelayError> {
        let res = sqlx::query("DELETE FROM connected_accounts WHERE user_id = ? AND platform = ?")
            .bind(user_id)
            .bind(platform.as_str())
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn review_exists(
        &self,
        platform: Platform,
        platform_review_id: &str,
    ) -> Result<bool, RelayError> {
        let rec: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM reviews WHERE platform = ? AND platform_review_id = ? LIMIT 1",
        )
        .bind(platform.as_str())
        .bind(platform_review_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rec.is_some())
    }

    /// Single conditional insert on the dedup index. Returns the new row id, or
    /// `None` when a review with the same (platform, platform_review_id) exists.
    pub async fn insert_review_if_absent(
        &self,
        review: &NewReview,
        ingested_at: DateTime<Utc>,
    ) -> Result<Option<i64>, RelayError> {
        let res = sqlx::query(
            r#"
            INSERT INTO reviews (
                user_id, platform, platform_review_id, reviewer_name, reviewer_avatar,
                rating, body, reviewed_at, ingested_at, blurb, sentiment
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(platform, platform_review_id) DO NOTHING
            "#,
        )
        .bind(&review.user_id)
        .bind(review.platform.as_str())
        .bind(&review.platform_review_id)
        .bind(&review.reviewer_name)
        .bind(&review.reviewer_avatar)
        .bind(review.rating)
        .bind(&review.body)
        .bind(review.reviewed_at.to_rfc3339())
        .bind(ingested_at.to_rfc3339())
        .bind(&review.blurb)
        .bind(review.sentiment.map(|s| s.as_str()))
        .execute(&self.pool)
        .await?;

        if res.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(res.last_insert_rowid()))
    }

    pub async fn get_review(&self, user_id: &str, id: i64) -> Result<Option<Review>, RelayError> {
        let sql = format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = ? AND user_id = ?");
        let row = sqlx::query(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_review).transpose()
    }

    /// Newest first.
    pub async fn list_reviews(&self, user_id: &str, limit: i64) -> Result<Vec<Review>, RelayError> {
        let sql = format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE user_id = ? \
             ORDER BY reviewed_at DESC, id DESC LIMIT ?"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_review).collect()
    }

    pub async fn update_blurb(&self, id: i64, blurb: &str) -> Result<(), RelayError> {
        sqlx::query("UPDATE reviews SET blurb = ? WHERE id = ?")
            .bind(blurb)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Store a connect token for `user_id`, dropping any that already expired.
    pub async fn insert_connect_token(
        &self,
        token: &str,
        user_id: &str,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), RelayError> {
        sqlx::query("DELETE FROM connect_tokens WHERE expires_at <= ?")
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await?;
        sqlx::query("INSERT INTO connect_tokens (token, user_id, expires_at) VALUES (?, ?, ?)")
            .bind(token)
            .bind(user_id)
            .bind(expires_at.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Consume a connect token. The row is deleted whether or not it is still
    /// valid; returns the bound user id only for an unexpired token.
    pub async fn take_connect_token(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, RelayError> {
        let row: Option<(String, String)> = sqlx::query_as(
            "DELETE FROM connect_tokens WHERE token = ? RETURNING user_id, expires_at",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        let Some((user_id, expires_at)) = row else {
            return Ok(None);
        };
        if parse_ts(&expires_at)? <= now {
            return Ok(None);
        }
        Ok(Some(user_id))
    }

    fn row_to_account(row: SqliteRow) -> Result<ConnectedAccount, RelayError> {
        let platform: String = row.try_get("platform")?;
        let expires_at: Option<String> = row.try_get("expires_at")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;
        let is_active: i64 = row.try_get("is_active")?;

        Ok(ConnectedAccount {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            platform: parse_platform(&platform)?,
            access_token: row.try_get("access_token")?,
            refresh_token: row.try_get("refresh_token")?,
            expires_at: expires_at.as_deref().map(parse_ts).transpose()?,
            is_active: is_active != 0,
            account_email: row.try_get("account_email")?,
            location_id: row.try_get("location_id")?,
            location_name: row.try_get("location_name")?,
            created_at: parse_ts(&created_at)?,
            updated_at: parse_ts(&updated_at)?,
        })
    }

    fn row_to_review(row: SqliteRow) -> Result<Review, RelayError> {
        let platform: String = row.try_get("platform")?;
        let reviewed_at: String = row.try_get("reviewed_at")?;
        let ingested_at: String = row.try_get("ingested_at")?;
        let sentiment: Option<String> = row.try_get("sentiment")?;

        let sentiment = sentiment
            .as_deref()
            .map(Sentiment::from_str)
            .transpose()
            .map_err(|e| sqlx::Error::Decode(e.into()))?;

        Ok(Review {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            platform: parse_platform(&platform)?,
            platform_review_id: row.try_get("platform_review_id")?,
            reviewer_name: row.try_get("reviewer_name")?,
            reviewer_avatar: row.try_get("reviewer_avatar")?,
            rating: row.try_get("rating")?,
            body: row.try_get("body")?,
            reviewed_at: parse_ts(&reviewed_at)?,
            ingested_at: parse_ts(&ingested_at)?,
            blurb: row.try_get("blurb")?,
            sentiment,
        })
    }
}

fn parse_platform(s: &str) -> Result<Platform, sqlx::Error> {
    Platform::from_str(s).map_err(|e| sqlx::Error::Decode(e.into()))
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    Ok(DateTime::parse_from_rfc3339(s)
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
        .with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn memory_storage() -> Storage {
        Storage::connect("sqlite::memory:").await.unwrap()
    }

    fn google_connection(refresh: Option<&str>) -> NewConnection {
        NewConnection {
            user_id: "user-1".to_string(),
            platform: Platform::Google,
            access_token: "access-1".to_string(),
            refresh_token: refresh.map(str::to_string),
            expires_at: Some(Utc::now() + Duration::hours(1)),
            account_email: Some("owner@example.com".to_string()),
        }
    }

    fn review(platform_review_id: &str) -> NewReview {
        NewReview {
            user_id: "user-1".to_string(),
            platform: Platform::Google,
            platform_review_id: Some(platform_review_id.to_string()),
            reviewer_name: "Ada".to_string(),
            reviewer_avatar: None,
            rating: 5,
            body: "Lovely".to_string(),
            reviewed_at: Utc::now(),
            blurb: None,
            sentiment: Some(Sentiment::Positive),
        }
    }

    #[tokio::test]
    async fn upsert_keeps_single_row_per_user_platform() {
        let storage = memory_storage().await;
        let first = storage
            .upsert_connected_account(google_connection(Some("refresh-1")))
            .await
            .unwrap();
        let mut again = google_connection(None);
        again.access_token = "access-2".to_string();
        let second = storage.upsert_connected_account(again).await.unwrap();
        assert_eq!(first, second);

        let acct = storage
            .get_connected_account("user-1", Platform::Google)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(acct.access_token, "access-2");
        assert_eq!(acct.refresh_token.as_deref(), Some("refresh-1"));
        assert!(acct.is_active);
    }

    #[tokio::test]
    async fn update_tokens_without_refresh_token_keeps_previous() {
        let storage = memory_storage().await;
        let id = storage
            .upsert_connected_account(google_connection(Some("refresh-1")))
            .await
            .unwrap();
        let expiry = Utc::now() + Duration::hours(2);
        storage
            .update_tokens(id, "access-new", None, Some(expiry))
            .await
            .unwrap();

        let acct = storage
            .get_connected_account("user-1", Platform::Google)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(acct.access_token, "access-new");
        assert_eq!(acct.refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(
            acct.expires_at.map(|t| t.timestamp()),
            Some(expiry.timestamp())
        );
    }

    #[tokio::test]
    async fn insert_if_absent_rejects_duplicate_review() {
        let storage = memory_storage().await;
        let now = Utc::now();
        let first = storage
            .insert_review_if_absent(&review("r1"), now)
            .await
            .unwrap();
        assert!(first.is_some());
        let dup = storage
            .insert_review_if_absent(&review("r1"), now)
            .await
            .unwrap();
        assert!(dup.is_none());
        assert!(storage.review_exists(Platform::Google, "r1").await.unwrap());
        assert_eq!(storage.list_reviews("user-1", 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn manual_reviews_without_platform_id_are_not_deduplicated() {
        let storage = memory_storage().await;
        let mut manual = review("unused");
        manual.platform = Platform::Manual;
        manual.platform_review_id = None;
        let now = Utc::now();
        assert!(storage.insert_review_if_absent(&manual, now).await.unwrap().is_some());
        assert!(storage.insert_review_if_absent(&manual, now).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn location_and_disconnect() {
        let storage = memory_storage().await;
        assert!(
            !storage
                .set_location("user-1", Platform::Google, "accounts/1/locations/2", "Cafe")
                .await
                .unwrap()
        );
        storage
            .upsert_connected_account(google_connection(Some("refresh-1")))
            .await
            .unwrap();
        assert!(
            storage
                .set_location("user-1", Platform::Google, "accounts/1/locations/2", "Cafe")
                .await
                .unwrap()
        );
        let acct = storage
            .get_connected_account("user-1", Platform::Google)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(acct.location_name.as_deref(), Some("Cafe"));

        assert!(
            storage
                .delete_connected_account("user-1", Platform::Google)
                .await
                .unwrap()
        );
        assert!(
            storage
                .get_connected_account("user-1", Platform::Google)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn connect_tokens_are_single_use_and_expire() {
        let storage = memory_storage().await;
        let now = Utc::now();
        storage
            .insert_connect_token("tok-1", "user-1", now + chrono::Duration::minutes(10), now)
            .await
            .unwrap();
        storage
            .insert_connect_token(
                "tok-old",
                "user-2",
                now - chrono::Duration::seconds(1),
                now - chrono::Duration::minutes(11),
            )
            .await
            .unwrap();

        assert_eq!(
            storage.take_connect_token("tok-1", now).await.unwrap().as_deref(),
            Some("user-1")
        );
        assert_eq!(storage.take_connect_token("tok-1", now).await.unwrap(), None);
        assert_eq!(storage.take_connect_token("tok-old", now).await.unwrap(), None);
        assert_eq!(storage.take_connect_token("unknown", now).await.unwrap(), None);
    }

    #[tokio::test]
    async fn blurb_update_is_visible_on_read() {
        let storage = memory_storage().await;
        let id = storage
            .insert_review_if_absent(&review("r9"), Utc::now())
            .await
            .unwrap()
            .unwrap();
        storage.update_blurb(id, "A delightful spot.").await.unwrap();
        let stored = storage.get_review("user-1", id).await.unwrap().unwrap();
        assert_eq!(stored.blurb.as_deref(), Some("A delightful spot."));
        assert_eq!(stored.sentiment, Some(Sentiment::Positive));
        assert!(storage.get_review("someone-else", id).await.unwrap().is_none());
    }
}
