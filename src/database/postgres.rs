//! PostgreSQL Store
//!
//! `Store` implementation over a SQLx connection pool. Queries are checked at
//! runtime and mapped onto models through `FromRow`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{
    connection::Pagination,
    store::{Store, StoreResult},
};
use crate::models::{
    Book, Collection, CollectionDetail, CollectionFilter, CollectionSummary, NewCollection,
    NewUser, OAuthState, Rating, RatingSummary, User, UserSummary, VerificationToken,
};

const USER_COLUMNS: &str =
    "id, name, email, email_verified, image, slug, created_at, updated_at";

const COLLECTION_COLUMNS: &str = "id, title, description, user_id, created_at";

const TOKEN_COLUMNS: &str = "identifier, token, purpose, expires_at, created_at";

/// Collection joined with its owner; covers are gathered in book order
const SUMMARY_SELECT: &str = r#"
SELECT c.id, c.title, c.description, c.created_at,
       u.id AS owner_id, u.name AS owner_name, u.image AS owner_image, u.slug AS owner_slug,
       ARRAY(
           SELECT b.cover
           FROM collection_books cb
           JOIN books b ON b.id = cb.book_id
           WHERE cb.collection_id = c.id AND b.cover IS NOT NULL
           ORDER BY cb.position
       ) AS covers
FROM collections c
JOIN users u ON u.id = c.user_id
"#;

#[derive(Debug, FromRow)]
struct CollectionRow {
    id: Uuid,
    title: String,
    description: String,
    created_at: DateTime<Utc>,
    owner_id: Uuid,
    owner_name: Option<String>,
    owner_image: Option<String>,
    owner_slug: Option<String>,
    covers: Vec<String>,
}

impl CollectionRow {
    fn owner(&self) -> UserSummary {
        UserSummary {
            id: self.owner_id,
            name: self.owner_name.clone(),
            image: self.owner_image.clone(),
            slug: self.owner_slug.clone(),
        }
    }

    fn into_summary(self) -> CollectionSummary {
        let user = self.owner();
        CollectionSummary {
            id: self.id,
            title: self.title,
            description: self.description,
            created_at: self.created_at,
            user,
            covers: self.covers,
        }
    }

    fn into_detail(self, books: Vec<Book>) -> CollectionDetail {
        let user = self.owner();
        CollectionDetail {
            id: self.id,
            title: self.title,
            description: self.description,
            created_at: self.created_at,
            user,
            books,
        }
    }
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Deletes all collections, books, ratings, favourites and tokens, and
    /// every user except the one holding `keep_email`
    pub async fn purge_content(&self, keep_email: Option<&str>) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        for table in [
            "ratings",
            "collection_favourites",
            "collection_books",
            "collections",
            "books",
            "verification_tokens",
            "oauth_states",
        ] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM users WHERE $1::text IS NULL OR email IS DISTINCT FROM $1")
            .bind(keep_email)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Deletes every row of every table
    pub async fn nuke(&self) -> StoreResult<()> {
        sqlx::query(
            "TRUNCATE ratings, collection_favourites, collection_books, collections, books, \
             verification_tokens, oauth_states, accounts, users",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &CollectionFilter) {
        match filter {
            CollectionFilter::All => {}
            CollectionFilter::Owner(user_id) => {
                builder.push(" WHERE c.user_id = ").push_bind(*user_id);
            }
            CollectionFilter::Search(query) => {
                builder
                    .push(" WHERE (to_tsvector('english', c.title) @@ plainto_tsquery('english', ")
                    .push_bind(query.clone())
                    .push(") OR to_tsvector('english', c.description) @@ plainto_tsquery('english', ")
                    .push_bind(query.clone())
                    .push("))");
            }
        }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_user_by_slug(&self, slug: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE slug = $1",
            USER_COLUMNS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE email = $1",
            USER_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (name, email, email_verified, image, slug) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user.name)
        .bind(user.email)
        .bind(user.email_verified)
        .bind(user.image)
        .bind(user.slug)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn update_user_name(
        &self,
        id: Uuid,
        name: &str,
        slug: &str,
    ) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET name = $2, slug = $3, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .bind(name)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn clear_user_image(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET image = NULL, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn mark_email_verified(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET email_verified = NOW(), updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> StoreResult<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE slug = $1 AND ($2::uuid IS NULL OR id <> $2))",
        )
        .bind(slug)
        .bind(except)
        .fetch_one(&self.pool)
        .await?;

        Ok(taken)
    }

    async fn find_user_by_account(
        &self,
        provider: &str,
        subject: &str,
    ) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT u.id, u.name, u.email, u.email_verified, u.image, u.slug, \
                    u.created_at, u.updated_at \
             FROM users u \
             JOIN accounts a ON a.user_id = u.id \
             WHERE a.provider = $1 AND a.provider_account_id = $2",
        )
        .bind(provider)
        .bind(subject)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn link_account(&self, user_id: Uuid, provider: &str, subject: &str) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO accounts (user_id, provider, provider_account_id) VALUES ($1, $2, $3) \
             ON CONFLICT (provider, provider_account_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(provider)
        .bind(subject)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn replace_verification_token(&self, token: &VerificationToken) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM verification_tokens WHERE identifier = $1 AND purpose = $2")
            .bind(&token.identifier)
            .bind(token.purpose)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO verification_tokens (identifier, token, purpose, expires_at, created_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&token.identifier)
        .bind(&token.token)
        .bind(token.purpose)
        .bind(token.expires_at)
        .bind(token.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_verification_token(
        &self,
        token: &str,
    ) -> StoreResult<Option<VerificationToken>> {
        let token = sqlx::query_as::<_, VerificationToken>(&format!(
            "SELECT {} FROM verification_tokens WHERE token = $1",
            TOKEN_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    async fn delete_verification_token(&self, token: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM verification_tokens WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn apply_verified_email(
        &self,
        user_id: Uuid,
        token: &str,
        email: &str,
    ) -> StoreResult<Option<User>> {
        let mut tx = self.pool.begin().await?;

        let consumed = sqlx::query("DELETE FROM verification_tokens WHERE token = $1")
            .bind(token)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        if consumed == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET email = $2, email_verified = NOW(), updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(email)
        .fetch_optional(&mut *tx)
        .await?;

        if user.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(user)
    }

    async fn insert_oauth_state(&self, state: &OAuthState) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO oauth_states (state_token, redirect_url, expires_at, created_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(&state.state_token)
        .bind(&state.redirect_url)
        .bind(state.expires_at)
        .bind(state.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn take_oauth_state(&self, state_token: &str) -> StoreResult<Option<OAuthState>> {
        let state = sqlx::query_as::<_, OAuthState>(
            "DELETE FROM oauth_states WHERE state_token = $1 \
             RETURNING state_token, expires_at, redirect_url, created_at",
        )
        .bind(state_token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(state)
    }

    async fn list_collections(
        &self,
        filter: &CollectionFilter,
        page: Pagination,
    ) -> StoreResult<(Vec<CollectionSummary>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM collections c");
        Self::push_filter(&mut count, filter);
        let total = count
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut select = QueryBuilder::<Postgres>::new(SUMMARY_SELECT);
        Self::push_filter(&mut select, filter);
        select
            .push(" ORDER BY c.created_at DESC, c.id DESC LIMIT ")
            .push_bind(page.limit)
            .push(" OFFSET ")
            .push_bind(page.offset);

        let rows = select
            .build_query_as::<CollectionRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok((rows.into_iter().map(CollectionRow::into_summary).collect(), total))
    }

    async fn get_collection(&self, id: Uuid) -> StoreResult<Option<CollectionDetail>> {
        let row = sqlx::query_as::<_, CollectionRow>(&format!("{} WHERE c.id = $1", SUMMARY_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let books = sqlx::query_as::<_, Book>(
            "SELECT b.id, b.title, b.authors, b.description, b.cover, b.link, b.avg_rating \
             FROM collection_books cb \
             JOIN books b ON b.id = cb.book_id \
             WHERE cb.collection_id = $1 \
             ORDER BY cb.position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(row.into_detail(books)))
    }

    async fn find_collection(&self, id: Uuid) -> StoreResult<Option<Collection>> {
        let collection = sqlx::query_as::<_, Collection>(&format!(
            "SELECT {} FROM collections WHERE id = $1",
            COLLECTION_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(collection)
    }

    async fn create_collection(
        &self,
        owner: Uuid,
        collection: &NewCollection,
    ) -> StoreResult<Collection> {
        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Collection>(&format!(
            "INSERT INTO collections (title, description, user_id) VALUES ($1, $2, $3) \
             RETURNING {}",
            COLLECTION_COLUMNS
        ))
        .bind(&collection.title)
        .bind(&collection.description)
        .bind(owner)
        .fetch_one(&mut *tx)
        .await?;

        for (position, book) in collection.books.iter().enumerate() {
            // Existing books keep their stored metadata
            sqlx::query(
                "INSERT INTO books (id, title, authors, description, cover, link, avg_rating) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7) \
                 ON CONFLICT (id) DO NOTHING",
            )
            .bind(&book.id)
            .bind(&book.title)
            .bind(&book.authors)
            .bind(&book.description)
            .bind(&book.cover)
            .bind(&book.link)
            .bind(book.avg_rating)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO collection_books (collection_id, book_id, position) \
                 VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
            )
            .bind(created.id)
            .bind(&book.id)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn delete_collection(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM collections WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_favourited(&self, collection_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let favourited = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM collection_favourites \
             WHERE collection_id = $1 AND user_id = $2)",
        )
        .bind(collection_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(favourited)
    }

    async fn toggle_favourite(
        &self,
        collection_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<bool>> {
        let mut tx = self.pool.begin().await?;

        // Concurrent toggles on the same collection queue behind this lock
        let exists = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM collections WHERE id = $1 FOR UPDATE",
        )
        .bind(collection_id)
        .fetch_optional(&mut *tx)
        .await?;

        if exists.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let removed = sqlx::query(
            "DELETE FROM collection_favourites WHERE collection_id = $1 AND user_id = $2",
        )
        .bind(collection_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if removed == 0 {
            sqlx::query("INSERT INTO collection_favourites (collection_id, user_id) VALUES ($1, $2)")
                .bind(collection_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(Some(removed == 0))
    }

    async fn rating_summary(&self, collection_id: Uuid) -> StoreResult<RatingSummary> {
        let summary = sqlx::query_as::<_, RatingSummary>(
            "SELECT AVG(value) AS average, COUNT(*) AS count FROM ratings WHERE collection_id = $1",
        )
        .bind(collection_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(summary)
    }

    async fn get_rating(&self, collection_id: Uuid, user_id: Uuid) -> StoreResult<Option<Rating>> {
        let rating = sqlx::query_as::<_, Rating>(
            "SELECT user_id, collection_id, value, created_at, updated_at FROM ratings \
             WHERE collection_id = $1 AND user_id = $2",
        )
        .bind(collection_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(rating)
    }

    async fn upsert_rating(
        &self,
        collection_id: Uuid,
        user_id: Uuid,
        value: f64,
    ) -> StoreResult<Rating> {
        let rating = sqlx::query_as::<_, Rating>(
            "INSERT INTO ratings (user_id, collection_id, value) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, collection_id) \
             DO UPDATE SET value = EXCLUDED.value, updated_at = NOW() \
             RETURNING user_id, collection_id, value, created_at, updated_at",
        )
        .bind(user_id)
        .bind(collection_id)
        .bind(value)
        .fetch_one(&self.pool)
        .await?;

        Ok(rating)
    }
}
