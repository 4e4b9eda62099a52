//! Test doubles shared by the service and API tests: an in-memory `Store`
//! enforcing the schema's unique keys, foreign keys and cascades, a recording
//! mail transport and a fake image CDN.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::database::{Pagination, Store, StoreError, StoreResult};
use crate::models::{
    Book, BookInput, Collection, CollectionDetail, CollectionFilter, CollectionSummary,
    NewCollection, NewUser, OAuthState, Rating, RatingSummary, Session, User, VerificationToken,
};
use crate::service::book_catalog::{BookCatalog, CatalogError};
use crate::service::email_service::{MailTransport, OutgoingEmail};
use crate::service::image_cdn::{CdnError, ImageCdn};
use crate::utils::{slugify, AppResult};

#[derive(Default)]
struct State {
    users: Vec<User>,
    /// (provider, subject) -> user
    accounts: HashMap<(String, String), Uuid>,
    tokens: Vec<VerificationToken>,
    oauth_states: HashMap<String, OAuthState>,
    books: HashMap<String, Book>,
    collections: Vec<Collection>,
    /// (collection, book, position)
    collection_books: Vec<(Uuid, String, i32)>,
    favourites: HashSet<(Uuid, Uuid)>,
    ratings: Vec<Rating>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl State {
    /// Strictly increasing timestamps so newest-first ordering is stable
    fn now(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let now = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(now);
        now
    }

    /// Fails like the `<constraint>` foreign key when `id` has no user
    fn require_user(&self, id: Uuid, constraint: &str) -> StoreResult<()> {
        if self.users.iter().any(|u| u.id == id) {
            Ok(())
        } else {
            Err(StoreError::ForeignKeyViolation(constraint.to_string()))
        }
    }

    fn require_collection(&self, id: Uuid, constraint: &str) -> StoreResult<()> {
        if self.collections.iter().any(|c| c.id == id) {
            Ok(())
        } else {
            Err(StoreError::ForeignKeyViolation(constraint.to_string()))
        }
    }

    fn user_mut(&mut self, id: Uuid) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }

    fn check_unique_user(
        &self,
        id: Option<Uuid>,
        email: Option<&str>,
        slug: Option<&str>,
    ) -> StoreResult<()> {
        let others = self.users.iter().filter(|u| Some(u.id) != id);
        for user in others {
            if email.is_some() && user.email.as_deref() == email {
                return Err(StoreError::UniqueViolation("users_email_key".to_string()));
            }
            if slug.is_some() && user.slug.as_deref() == slug {
                return Err(StoreError::UniqueViolation("users_slug_key".to_string()));
            }
        }
        Ok(())
    }

    fn matches(&self, collection: &Collection, filter: &CollectionFilter) -> bool {
        match filter {
            CollectionFilter::All => true,
            CollectionFilter::Owner(owner) => collection.user_id == *owner,
            CollectionFilter::Search(query) => {
                let terms: Vec<String> = query
                    .split_whitespace()
                    .map(|t| t.to_lowercase())
                    .collect();
                let title = collection.title.to_lowercase();
                let description = collection.description.to_lowercase();

                !terms.is_empty()
                    && (terms.iter().all(|t| title.contains(t.as_str()))
                        || terms.iter().all(|t| description.contains(t.as_str())))
            }
        }
    }

    fn books_of(&self, collection_id: Uuid) -> Vec<Book> {
        let mut entries: Vec<_> = self
            .collection_books
            .iter()
            .filter(|(c, _, _)| *c == collection_id)
            .collect();
        entries.sort_by_key(|(_, _, position)| *position);

        entries
            .into_iter()
            .filter_map(|(_, book_id, _)| self.books.get(book_id).cloned())
            .collect()
    }

    fn summary(&self, collection: &Collection) -> Option<CollectionSummary> {
        let owner = self.users.iter().find(|u| u.id == collection.user_id)?;

        Some(CollectionSummary {
            id: collection.id,
            title: collection.title.clone(),
            description: collection.description.clone(),
            created_at: collection.created_at,
            user: owner.summary(),
            covers: self
                .books_of(collection.id)
                .into_iter()
                .filter_map(|b| b.cover)
                .collect(),
        })
    }

    fn remove_collection(&mut self, id: Uuid) -> bool {
        let before = self.collections.len();
        self.collections.retain(|c| c.id != id);
        self.collection_books.retain(|(c, _, _)| *c != id);
        self.favourites.retain(|(c, _)| *c != id);
        self.ratings.retain(|r| r.collection_id != id);
        self.collections.len() != before
    }
}

/// In-memory `Store` mirroring the schema's unique keys, foreign keys and
/// cascades
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Creates a verified user whose slug is derived from `name`
    pub async fn seed_user(&self, name: &str, email: &str) -> User {
        self.create_user(NewUser {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            email_verified: Some(Utc::now()),
            image: None,
            slug: Some(slugify(name)),
        })
        .await
        .unwrap()
    }

    pub async fn set_user_image(&self, id: Uuid, image: &str) {
        let mut state = self.state();
        if let Some(user) = state.user_mut(id) {
            user.image = Some(image.to_string());
        }
    }

    pub fn book_count(&self) -> usize {
        self.state().books.len()
    }

    pub fn collection_count(&self) -> usize {
        self.state().collections.len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.state().users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_slug(&self, slug: &str) -> StoreResult<Option<User>> {
        Ok(self
            .state()
            .users
            .iter()
            .find(|u| u.slug.as_deref() == Some(slug))
            .cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .state()
            .users
            .iter()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut state = self.state();
        state.check_unique_user(None, user.email.as_deref(), user.slug.as_deref())?;

        let now = state.now();
        let user = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            email_verified: user.email_verified,
            image: user.image,
            slug: user.slug,
            created_at: now,
            updated_at: now,
        };
        state.users.push(user.clone());
        Ok(user)
    }

    async fn update_user_name(
        &self,
        id: Uuid,
        name: &str,
        slug: &str,
    ) -> StoreResult<Option<User>> {
        let mut state = self.state();
        state.check_unique_user(Some(id), None, Some(slug))?;

        let now = state.now();
        Ok(state.user_mut(id).map(|user| {
            user.name = Some(name.to_string());
            user.slug = Some(slug.to_string());
            user.updated_at = now;
            user.clone()
        }))
    }

    async fn clear_user_image(&self, id: Uuid) -> StoreResult<Option<User>> {
        let mut state = self.state();
        let now = state.now();
        Ok(state.user_mut(id).map(|user| {
            user.image = None;
            user.updated_at = now;
            user.clone()
        }))
    }

    async fn mark_email_verified(&self, id: Uuid) -> StoreResult<Option<User>> {
        let mut state = self.state();
        let now = state.now();
        Ok(state.user_mut(id).map(|user| {
            user.email_verified = Some(now);
            user.updated_at = now;
            user.clone()
        }))
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<bool> {
        let mut state = self.state();
        let before = state.users.len();
        state.users.retain(|u| u.id != id);
        if state.users.len() == before {
            return Ok(false);
        }

        state.accounts.retain(|_, user_id| *user_id != id);
        let owned: Vec<Uuid> = state
            .collections
            .iter()
            .filter(|c| c.user_id == id)
            .map(|c| c.id)
            .collect();
        for collection_id in owned {
            state.remove_collection(collection_id);
        }
        state.favourites.retain(|(_, user_id)| *user_id != id);
        state.ratings.retain(|r| r.user_id != id);

        Ok(true)
    }

    async fn slug_taken(&self, slug: &str, except: Option<Uuid>) -> StoreResult<bool> {
        Ok(self
            .state()
            .users
            .iter()
            .any(|u| u.slug.as_deref() == Some(slug) && Some(u.id) != except))
    }

    async fn find_user_by_account(
        &self,
        provider: &str,
        subject: &str,
    ) -> StoreResult<Option<User>> {
        let state = self.state();
        let user_id = state
            .accounts
            .get(&(provider.to_string(), subject.to_string()))
            .copied();

        Ok(user_id.and_then(|id| state.users.iter().find(|u| u.id == id).cloned()))
    }

    async fn link_account(&self, user_id: Uuid, provider: &str, subject: &str) -> StoreResult<()> {
        let mut state = self.state();
        state.require_user(user_id, "accounts_user_id_fkey")?;
        state
            .accounts
            .entry((provider.to_string(), subject.to_string()))
            .or_insert(user_id);
        Ok(())
    }

    async fn replace_verification_token(&self, token: &VerificationToken) -> StoreResult<()> {
        let mut state = self.state();
        state
            .tokens
            .retain(|t| !(t.identifier == token.identifier && t.purpose == token.purpose));
        state.tokens.push(token.clone());
        Ok(())
    }

    async fn find_verification_token(
        &self,
        token: &str,
    ) -> StoreResult<Option<VerificationToken>> {
        Ok(self.state().tokens.iter().find(|t| t.token == token).cloned())
    }

    async fn delete_verification_token(&self, token: &str) -> StoreResult<bool> {
        let mut state = self.state();
        let before = state.tokens.len();
        state.tokens.retain(|t| t.token != token);
        Ok(state.tokens.len() != before)
    }

    async fn apply_verified_email(
        &self,
        user_id: Uuid,
        token: &str,
        email: &str,
    ) -> StoreResult<Option<User>> {
        let mut state = self.state();
        if !state.tokens.iter().any(|t| t.token == token)
            || !state.users.iter().any(|u| u.id == user_id)
        {
            return Ok(None);
        }
        state.check_unique_user(Some(user_id), Some(email), None)?;

        state.tokens.retain(|t| t.token != token);
        let now = state.now();
        Ok(state.user_mut(user_id).map(|user| {
            user.email = Some(email.to_string());
            user.email_verified = Some(now);
            user.updated_at = now;
            user.clone()
        }))
    }

    async fn insert_oauth_state(&self, state: &OAuthState) -> StoreResult<()> {
        self.state()
            .oauth_states
            .insert(state.state_token.clone(), state.clone());
        Ok(())
    }

    async fn take_oauth_state(&self, state_token: &str) -> StoreResult<Option<OAuthState>> {
        Ok(self.state().oauth_states.remove(state_token))
    }

    async fn list_collections(
        &self,
        filter: &CollectionFilter,
        page: Pagination,
    ) -> StoreResult<(Vec<CollectionSummary>, i64)> {
        let state = self.state();
        let mut matching: Vec<&Collection> = state
            .collections
            .iter()
            .filter(|c| state.matches(c, filter))
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = matching.len() as i64;
        let collections = matching
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .filter_map(|c| state.summary(c))
            .collect();

        Ok((collections, total))
    }

    async fn get_collection(&self, id: Uuid) -> StoreResult<Option<CollectionDetail>> {
        let state = self.state();
        let Some(collection) = state.collections.iter().find(|c| c.id == id) else {
            return Ok(None);
        };
        let Some(owner) = state.users.iter().find(|u| u.id == collection.user_id) else {
            return Ok(None);
        };

        Ok(Some(CollectionDetail {
            id: collection.id,
            title: collection.title.clone(),
            description: collection.description.clone(),
            created_at: collection.created_at,
            user: owner.summary(),
            books: state.books_of(collection.id),
        }))
    }

    async fn find_collection(&self, id: Uuid) -> StoreResult<Option<Collection>> {
        Ok(self.state().collections.iter().find(|c| c.id == id).cloned())
    }

    async fn create_collection(
        &self,
        owner: Uuid,
        collection: &NewCollection,
    ) -> StoreResult<Collection> {
        let mut state = self.state();
        state.require_user(owner, "collections_user_id_fkey")?;

        let now = state.now();
        let created = Collection {
            id: Uuid::new_v4(),
            title: collection.title.clone(),
            description: collection.description.clone(),
            user_id: owner,
            created_at: now,
        };

        for (position, book) in collection.books.iter().enumerate() {
            state
                .books
                .entry(book.id.clone())
                .or_insert_with(|| book.clone());
            state
                .collection_books
                .push((created.id, book.id.clone(), position as i32));
        }
        state.collections.push(created.clone());

        Ok(created)
    }

    async fn delete_collection(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.state().remove_collection(id))
    }

    async fn is_favourited(&self, collection_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        Ok(self.state().favourites.contains(&(collection_id, user_id)))
    }

    async fn toggle_favourite(
        &self,
        collection_id: Uuid,
        user_id: Uuid,
    ) -> StoreResult<Option<bool>> {
        let mut state = self.state();
        if !state.collections.iter().any(|c| c.id == collection_id) {
            return Ok(None);
        }

        let key = (collection_id, user_id);
        if state.favourites.remove(&key) {
            Ok(Some(false))
        } else {
            state.require_user(user_id, "collection_favourites_user_id_fkey")?;
            state.favourites.insert(key);
            Ok(Some(true))
        }
    }

    async fn rating_summary(&self, collection_id: Uuid) -> StoreResult<RatingSummary> {
        Ok(RatingSummary::from_values(
            self.state()
                .ratings
                .iter()
                .filter(|r| r.collection_id == collection_id)
                .map(|r| r.value),
        ))
    }

    async fn get_rating(&self, collection_id: Uuid, user_id: Uuid) -> StoreResult<Option<Rating>> {
        Ok(self
            .state()
            .ratings
            .iter()
            .find(|r| r.collection_id == collection_id && r.user_id == user_id)
            .cloned())
    }

    async fn upsert_rating(
        &self,
        collection_id: Uuid,
        user_id: Uuid,
        value: f64,
    ) -> StoreResult<Rating> {
        let mut state = self.state();
        state.require_collection(collection_id, "ratings_collection_id_fkey")?;
        state.require_user(user_id, "ratings_user_id_fkey")?;

        let now = state.now();

        if let Some(rating) = state
            .ratings
            .iter_mut()
            .find(|r| r.collection_id == collection_id && r.user_id == user_id)
        {
            rating.value = value;
            rating.updated_at = now;
            return Ok(rating.clone());
        }

        let rating = Rating {
            user_id,
            collection_id,
            value,
            created_at: now,
            updated_at: now,
        };
        state.ratings.push(rating.clone());
        Ok(rating)
    }
}

/// Mail transport that keeps every message
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for RecordingMailer {
    async fn send(&self, email: OutgoingEmail) -> AppResult<()> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

/// Image CDN that records upload keys and can be switched to fail
#[derive(Default)]
pub struct FakeCdn {
    uploads: Mutex<Vec<String>>,
    failing: Mutex<bool>,
}

impl FakeCdn {
    pub fn fail_uploads(&self) {
        *self.failing.lock().unwrap() = true;
    }

    pub fn uploaded_keys(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageCdn for FakeCdn {
    async fn upload(&self, _data_uri: &str, key: &str) -> Result<String, CdnError> {
        if *self.failing.lock().unwrap() {
            return Err(CdnError::Rejected("moderation failed".to_string()));
        }
        self.uploads.lock().unwrap().push(key.to_string());
        Ok(self.image_url(key))
    }

    fn image_url(&self, key: &str) -> String {
        format!("https://cdn.test/{}", key)
    }
}

/// Catalog answering every query with `max_results` numbered books
pub struct FakeCatalog;

#[async_trait]
impl BookCatalog for FakeCatalog {
    async fn search(&self, query: &str, max_results: u8) -> Result<Vec<Book>, CatalogError> {
        Ok((0..max_results)
            .map(|i| Book {
                id: format!("vol-{}", i),
                title: format!("{} #{}", query, i),
                authors: None,
                description: None,
                cover: None,
                link: format!("https://books.example.com/vol-{}", i),
                avg_rating: None,
            })
            .collect())
    }
}

/// Valid book input with a cover derived from `id`
pub fn book_input(id: &str) -> BookInput {
    BookInput {
        id: id.to_string(),
        title: "Dune".to_string(),
        authors: Some("Frank Herbert".to_string()),
        description: Some("Desert planet politics".to_string()),
        cover: Some(format!("https://covers.example.com/{}.jpg", id)),
        link: format!("https://books.example.com/{}", id),
        avg_rating: Some(4.5),
    }
}

/// Session for `user` valid for a day
pub fn session_for(user: &User) -> Session {
    Session::for_user(user, Utc::now() + Duration::days(1))
}
