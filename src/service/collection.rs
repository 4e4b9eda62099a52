//! Collection Service Implementation
//!
//! Business logic for collections: creation with book upsert, paginated
//! listing and search, favourites, ratings and owner-only deletion.

use std::collections::HashSet;

use log::info;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::database::{DynStore, Pagination, StoreError};
use crate::models::{
    Book, Collection, CollectionDetail, CollectionFilter, CollectionPage, CreateCollectionRequest,
    CreateCollectionResponse, NewCollection, RateCollectionRequest, Rating, RatingSummary,
    SearchQuery, Session, UserCollectionPage, UserCollectionsQuery,
};
use crate::utils::{
    error::{validation_message, AppError},
    validation::{is_valid_rating, messages},
};

/// Custom error types for the collection service
#[derive(Error, Debug)]
pub enum CollectionServiceError {
    /// Input validation failed with detailed error message
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Page number absent or below 1
    #[error("{}", messages::INVALID_PAGE)]
    InvalidPage,

    #[error("{}", messages::INVALID_RATING)]
    InvalidRating,

    #[error("Collection not found")]
    CollectionNotFound,

    #[error("User not found")]
    UserNotFound,

    /// Caller is not the owner of the collection
    #[error("Only the owner can delete this collection")]
    NotOwner,

    /// Owners may not favourite or rate their own collection
    #[error("You cannot {0} your own collection")]
    OwnCollection(&'static str),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<CollectionServiceError> for AppError {
    fn from(err: CollectionServiceError) -> Self {
        match err {
            CollectionServiceError::ValidationError(msg) => AppError::Validation(msg),
            CollectionServiceError::InvalidPage | CollectionServiceError::InvalidRating => {
                AppError::BadRequest(err.to_string())
            }
            CollectionServiceError::CollectionNotFound | CollectionServiceError::UserNotFound => {
                AppError::NotFound(err.to_string())
            }
            CollectionServiceError::NotOwner | CollectionServiceError::OwnCollection(_) => {
                AppError::Forbidden(err.to_string())
            }
            CollectionServiceError::Store(e) => e.into(),
        }
    }
}

/// Result type for collection service operations
pub type CollectionServiceResult<T> = Result<T, CollectionServiceError>;

/// Collection service for managing collections and their social metadata
#[derive(Clone)]
pub struct CollectionService {
    store: DynStore,
}

impl CollectionService {
    pub fn new(store: DynStore) -> Self {
        Self { store }
    }

    /// Page `page_number` of all collections, newest first
    pub async fn get_all(&self, page_number: Option<i64>) -> CollectionServiceResult<CollectionPage> {
        let page = page_for(page_number)?;
        self.page(CollectionFilter::All, page).await
    }

    /// Page of one user's collections, resolved by slug
    pub async fn get_all_by_user_slug(
        &self,
        query: UserCollectionsQuery,
    ) -> CollectionServiceResult<UserCollectionPage> {
        validate(&query)?;
        let page = page_for(query.page)?;

        let user = self
            .store
            .get_user_by_slug(&query.slug)
            .await?
            .ok_or(CollectionServiceError::UserNotFound)?;

        let CollectionPage {
            collections,
            total_pages,
        } = self.page(CollectionFilter::Owner(user.id), page).await?;

        Ok(UserCollectionPage {
            user: user.summary(),
            collections,
            total_pages,
        })
    }

    /// A single collection with its books. Absence is not an error.
    pub async fn get_by_id(&self, id: Uuid) -> CollectionServiceResult<Option<CollectionDetail>> {
        Ok(self.store.get_collection(id).await?)
    }

    /// Collections whose title or description matches the query
    pub async fn search(&self, query: SearchQuery) -> CollectionServiceResult<CollectionPage> {
        validate(&query)?;
        let page = page_for(query.page)?;

        let terms = query.query.trim();
        if terms.is_empty() {
            return Err(CollectionServiceError::ValidationError(
                "query: Query cannot be blank".to_string(),
            ));
        }

        self.page(CollectionFilter::Search(terms.to_string()), page)
            .await
    }

    /// Whether the caller has favourited the collection
    pub async fn is_favourited(
        &self,
        session: &Session,
        collection_id: Uuid,
    ) -> CollectionServiceResult<bool> {
        self.require_collection(collection_id).await?;
        Ok(self
            .store
            .is_favourited(collection_id, session.user_id)
            .await?)
    }

    /// Flips the caller's favourite and returns the new state
    pub async fn toggle_favourite(
        &self,
        session: &Session,
        collection_id: Uuid,
    ) -> CollectionServiceResult<bool> {
        let collection = self.require_collection(collection_id).await?;
        if collection.user_id == session.user_id {
            return Err(CollectionServiceError::OwnCollection("favourite"));
        }

        self.store
            .toggle_favourite(collection_id, session.user_id)
            .await?
            .ok_or(CollectionServiceError::CollectionNotFound)
    }

    /// Mean and count of all ratings of the collection
    pub async fn get_average_rating(
        &self,
        collection_id: Uuid,
    ) -> CollectionServiceResult<RatingSummary> {
        Ok(self.store.rating_summary(collection_id).await?)
    }

    /// The caller's own rating of the collection, if any
    pub async fn get_user_rating(
        &self,
        session: &Session,
        collection_id: Uuid,
    ) -> CollectionServiceResult<Option<Rating>> {
        Ok(self
            .store
            .get_rating(collection_id, session.user_id)
            .await?)
    }

    /// Creates a collection owned by the caller
    ///
    /// Books are upserted by catalog id: an existing book is attached as-is,
    /// a new one is stored with the submitted metadata. A book listed twice is
    /// attached once, at its first position.
    pub async fn create(
        &self,
        session: &Session,
        request: CreateCollectionRequest,
    ) -> CollectionServiceResult<CreateCollectionResponse> {
        validate(&request)?;

        let mut seen = HashSet::new();
        let books: Vec<Book> = request
            .books
            .into_iter()
            .filter(|book| seen.insert(book.id.clone()))
            .map(Book::from)
            .collect();

        let collection = NewCollection {
            title: request.title.trim().to_string(),
            description: request.description,
            books,
        };

        let created = self
            .store
            .create_collection(session.user_id, &collection)
            .await?;

        info!(
            "User {} created collection {} with {} books",
            session.user_id,
            created.id,
            collection.books.len()
        );

        Ok(CreateCollectionResponse { id: created.id })
    }

    /// Deletes a collection. Only its owner may do so.
    pub async fn delete(&self, session: &Session, id: Uuid) -> CollectionServiceResult<()> {
        let collection = self.require_collection(id).await?;
        if collection.user_id != session.user_id {
            return Err(CollectionServiceError::NotOwner);
        }

        if !self.store.delete_collection(id).await? {
            return Err(CollectionServiceError::CollectionNotFound);
        }

        info!("User {} deleted collection {}", session.user_id, id);
        Ok(())
    }

    /// Creates or overwrites the caller's rating of a collection
    pub async fn rate(
        &self,
        session: &Session,
        request: RateCollectionRequest,
    ) -> CollectionServiceResult<Rating> {
        if !is_valid_rating(request.rating) {
            return Err(CollectionServiceError::InvalidRating);
        }

        let collection = self.require_collection(request.id).await?;
        if collection.user_id == session.user_id {
            return Err(CollectionServiceError::OwnCollection("rate"));
        }

        Ok(self
            .store
            .upsert_rating(request.id, session.user_id, request.rating)
            .await?)
    }

    async fn page(
        &self,
        filter: CollectionFilter,
        page: Pagination,
    ) -> CollectionServiceResult<CollectionPage> {
        let (collections, total) = self.store.list_collections(&filter, page).await?;

        Ok(CollectionPage {
            collections,
            total_pages: page.total_pages(total),
        })
    }

    async fn require_collection(
        &self,
        id: Uuid,
    ) -> CollectionServiceResult<Collection> {
        self.store
            .find_collection(id)
            .await?
            .ok_or(CollectionServiceError::CollectionNotFound)
    }
}

fn page_for(page_number: Option<i64>) -> CollectionServiceResult<Pagination> {
    match page_number {
        Some(page) if page >= 1 => Ok(Pagination::collections(page)),
        _ => Err(CollectionServiceError::InvalidPage),
    }
}

fn validate<T: Validate>(input: &T) -> CollectionServiceResult<()> {
    input
        .validate()
        .map_err(|e| CollectionServiceError::ValidationError(validation_message(&e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{Store, COLLECTIONS_PER_PAGE};
    use crate::models::BookInput;
    use crate::test_support::{book_input, session_for, MemoryStore};
    use crate::utils::ErrorKind;
    use std::sync::Arc;

    struct Fixture {
        store: Arc<MemoryStore>,
        service: CollectionService,
        alice: Session,
        bob: Session,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::default());
        let alice = store.seed_user("Alice Reader", "alice@example.com").await;
        let bob = store.seed_user("Bob Writer", "bob@example.com").await;

        Fixture {
            service: CollectionService::new(store.clone()),
            store,
            alice: session_for(&alice),
            bob: session_for(&bob),
        }
    }

    fn create_request(title: &str, books: Vec<BookInput>) -> CreateCollectionRequest {
        CreateCollectionRequest {
            title: title.to_string(),
            description: String::new(),
            books,
        }
    }

    fn kind(err: CollectionServiceError) -> ErrorKind {
        AppError::from(err).kind()
    }

    // ============================================================================
    // Listing Tests
    // ============================================================================

    #[tokio::test]
    async fn test_get_all_pages_by_ten() {
        let f = fixture().await;
        for i in 0..23 {
            f.service
                .create(&f.alice, create_request(&format!("List {}", i), vec![]))
                .await
                .unwrap();
        }

        let first = f.service.get_all(Some(1)).await.unwrap();
        assert_eq!(first.collections.len(), COLLECTIONS_PER_PAGE as usize);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.collections[0].title, "List 22");

        let last = f.service.get_all(Some(3)).await.unwrap();
        assert_eq!(last.collections.len(), 3);
        assert_eq!(last.total_pages, 3);

        let beyond = f.service.get_all(Some(4)).await.unwrap();
        assert!(beyond.collections.is_empty());
    }

    #[tokio::test]
    async fn test_get_all_rejects_bad_page() {
        let f = fixture().await;

        for page in [None, Some(0), Some(-2)] {
            let err = f.service.get_all(page).await.unwrap_err();
            assert_eq!(kind(err), ErrorKind::BadRequest);
        }
    }

    #[tokio::test]
    async fn test_get_all_empty() {
        let f = fixture().await;
        let page = f.service.get_all(Some(1)).await.unwrap();
        assert!(page.collections.is_empty());
        assert_eq!(page.total_pages, 0);
    }

    #[tokio::test]
    async fn test_listing_includes_covers_and_owner() {
        let f = fixture().await;
        let mut no_cover = book_input("B3");
        no_cover.cover = None;

        f.service
            .create(
                &f.alice,
                create_request("Covers", vec![book_input("B1"), no_cover, book_input("B2")]),
            )
            .await
            .unwrap();

        let page = f.service.get_all(Some(1)).await.unwrap();
        let summary = &page.collections[0];
        assert_eq!(summary.user.id, f.alice.user_id);
        assert_eq!(summary.user.slug.as_deref(), Some("alice-reader"));
        assert_eq!(
            summary.covers,
            vec![
                "https://covers.example.com/B1.jpg".to_string(),
                "https://covers.example.com/B2.jpg".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_get_all_by_user_slug() {
        let f = fixture().await;
        f.service
            .create(&f.alice, create_request("Alice's", vec![]))
            .await
            .unwrap();
        f.service
            .create(&f.bob, create_request("Bob's", vec![]))
            .await
            .unwrap();

        let page = f
            .service
            .get_all_by_user_slug(UserCollectionsQuery {
                slug: "bob-writer".to_string(),
                page: Some(1),
            })
            .await
            .unwrap();

        assert_eq!(page.user.id, f.bob.user_id);
        assert_eq!(page.collections.len(), 1);
        assert_eq!(page.collections[0].title, "Bob's");
        assert_eq!(page.total_pages, 1);
    }

    #[tokio::test]
    async fn test_get_all_by_unknown_slug() {
        let f = fixture().await;
        let err = f
            .service
            .get_all_by_user_slug(UserCollectionsQuery {
                slug: "nobody".to_string(),
                page: Some(1),
            })
            .await
            .unwrap_err();

        assert_eq!(kind(err), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_get_by_id_missing_is_none() {
        let f = fixture().await;
        assert!(f.service.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    // ============================================================================
    // Search Tests
    // ============================================================================

    #[tokio::test]
    async fn test_search_matches_title_or_description() {
        let f = fixture().await;
        f.service
            .create(&f.alice, create_request("Space Operas", vec![]))
            .await
            .unwrap();
        f.service
            .create(
                &f.alice,
                CreateCollectionRequest {
                    title: "Weekend Reads".to_string(),
                    description: "Light space adventures".to_string(),
                    books: vec![],
                },
            )
            .await
            .unwrap();
        f.service
            .create(&f.alice, create_request("Cookbooks", vec![]))
            .await
            .unwrap();

        let page = f
            .service
            .search(SearchQuery {
                query: "space".to_string(),
                page: Some(1),
            })
            .await
            .unwrap();

        let mut titles: Vec<_> = page.collections.iter().map(|c| c.title.as_str()).collect();
        titles.sort();
        assert_eq!(titles, vec!["Space Operas", "Weekend Reads"]);
        assert_eq!(page.total_pages, 1);
    }

    #[tokio::test]
    async fn test_search_rejects_blank_query() {
        let f = fixture().await;
        let err = f
            .service
            .search(SearchQuery {
                query: "   ".to_string(),
                page: Some(1),
            })
            .await
            .unwrap_err();

        assert_eq!(kind(err), ErrorKind::BadRequest);
    }

    // ============================================================================
    // Creation Tests
    // ============================================================================

    #[tokio::test]
    async fn test_create_keeps_book_order() {
        let f = fixture().await;
        let created = f
            .service
            .create(
                &f.alice,
                create_request("Ordered", vec![book_input("B2"), book_input("B1")]),
            )
            .await
            .unwrap();

        let detail = f.service.get_by_id(created.id).await.unwrap().unwrap();
        let ids: Vec<_> = detail.books.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["B2", "B1"]);
        assert_eq!(detail.user.id, f.alice.user_id);
    }

    #[tokio::test]
    async fn test_create_shares_existing_books() {
        let f = fixture().await;
        let first = f
            .service
            .create(&f.alice, create_request("First", vec![book_input("B1")]))
            .await
            .unwrap();

        let mut renamed = book_input("B1");
        renamed.title = "A different title".to_string();
        let second = f
            .service
            .create(&f.bob, create_request("Second", vec![renamed, book_input("B2")]))
            .await
            .unwrap();

        assert_eq!(f.store.book_count(), 2);

        let first = f.service.get_by_id(first.id).await.unwrap().unwrap();
        let second = f.service.get_by_id(second.id).await.unwrap().unwrap();
        assert_eq!(first.books[0].id, "B1");
        assert_eq!(second.books[0].id, "B1");
        assert_eq!(second.books[0].title, "Dune");
    }

    #[tokio::test]
    async fn test_create_attaches_duplicate_once() {
        let f = fixture().await;
        let created = f
            .service
            .create(
                &f.alice,
                create_request("Dupes", vec![book_input("B1"), book_input("B1")]),
            )
            .await
            .unwrap();

        let detail = f.service.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(detail.books.len(), 1);
    }

    #[tokio::test]
    async fn test_create_validates_input() {
        let f = fixture().await;
        let err = f
            .service
            .create(&f.alice, create_request("", vec![]))
            .await
            .unwrap_err();

        assert_eq!(kind(err), ErrorKind::BadRequest);
        assert_eq!(f.store.collection_count(), 0);
    }

    // ============================================================================
    // Deletion Tests
    // ============================================================================

    #[tokio::test]
    async fn test_delete_by_non_owner_is_forbidden() {
        let f = fixture().await;
        let created = f
            .service
            .create(&f.alice, create_request("Mine", vec![]))
            .await
            .unwrap();

        let err = f.service.delete(&f.bob, created.id).await.unwrap_err();
        assert_eq!(kind(err), ErrorKind::Forbidden);
        assert!(f.service.get_by_id(created.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_by_owner() {
        let f = fixture().await;
        let created = f
            .service
            .create(&f.alice, create_request("Mine", vec![book_input("B1")]))
            .await
            .unwrap();

        f.service.delete(&f.alice, created.id).await.unwrap();
        assert!(f.service.get_by_id(created.id).await.unwrap().is_none());

        let err = f.service.delete(&f.alice, created.id).await.unwrap_err();
        assert_eq!(kind(err), ErrorKind::NotFound);
    }

    // ============================================================================
    // Favourite Tests
    // ============================================================================

    #[tokio::test]
    async fn test_toggle_favourite_pair_restores_state() {
        let f = fixture().await;
        let created = f
            .service
            .create(&f.alice, create_request("Faves", vec![]))
            .await
            .unwrap();

        assert!(!f.service.is_favourited(&f.bob, created.id).await.unwrap());
        assert!(f.service.toggle_favourite(&f.bob, created.id).await.unwrap());
        assert!(f.service.is_favourited(&f.bob, created.id).await.unwrap());
        assert!(!f.service.toggle_favourite(&f.bob, created.id).await.unwrap());
        assert!(!f.service.is_favourited(&f.bob, created.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_owner_cannot_favourite() {
        let f = fixture().await;
        let created = f
            .service
            .create(&f.alice, create_request("Mine", vec![]))
            .await
            .unwrap();

        let err = f
            .service
            .toggle_favourite(&f.alice, created.id)
            .await
            .unwrap_err();
        assert_eq!(kind(err), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_favourite_missing_collection() {
        let f = fixture().await;
        let err = f
            .service
            .is_favourited(&f.bob, Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(kind(err), ErrorKind::NotFound);

        let err = f
            .service
            .toggle_favourite(&f.bob, Uuid::new_v4())
            .await
            .unwrap_err();
        assert_eq!(kind(err), ErrorKind::NotFound);
    }

    // ============================================================================
    // Rating Tests
    // ============================================================================

    #[tokio::test]
    async fn test_rate_out_of_bounds() {
        let f = fixture().await;
        let created = f
            .service
            .create(&f.alice, create_request("Rated", vec![]))
            .await
            .unwrap();

        for rating in [0.0, 0.25, 5.5, 3.3, -1.0] {
            let err = f
                .service
                .rate(
                    &f.bob,
                    RateCollectionRequest {
                        id: created.id,
                        rating,
                    },
                )
                .await
                .unwrap_err();
            assert_eq!(kind(err), ErrorKind::BadRequest);
        }
    }

    #[tokio::test]
    async fn test_rate_own_collection_is_forbidden() {
        let f = fixture().await;
        let created = f
            .service
            .create(&f.alice, create_request("Rated", vec![]))
            .await
            .unwrap();

        let err = f
            .service
            .rate(
                &f.alice,
                RateCollectionRequest {
                    id: created.id,
                    rating: 5.0,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(kind(err), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn test_rate_twice_overwrites() {
        let f = fixture().await;
        let created = f
            .service
            .create(&f.alice, create_request("Rated", vec![]))
            .await
            .unwrap();

        for rating in [2.0, 3.5] {
            f.service
                .rate(
                    &f.bob,
                    RateCollectionRequest {
                        id: created.id,
                        rating,
                    },
                )
                .await
                .unwrap();
        }

        let summary = f.service.get_average_rating(created.id).await.unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.average, Some(3.5));

        let mine = f
            .service
            .get_user_rating(&f.bob, created.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mine.value, 3.5);
        assert!(f
            .service
            .get_user_rating(&f.alice, created.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_rate_missing_collection() {
        let f = fixture().await;
        let err = f
            .service
            .rate(
                &f.bob,
                RateCollectionRequest {
                    id: Uuid::new_v4(),
                    rating: 4.0,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(kind(err), ErrorKind::NotFound);
    }

    // ============================================================================
    // Deleted Account Tests
    // ============================================================================

    #[tokio::test]
    async fn test_deleted_user_session_is_unauthorized() {
        let f = fixture().await;
        let created = f
            .service
            .create(&f.alice, create_request("Still here", vec![]))
            .await
            .unwrap();
        assert!(f.store.delete_user(f.bob.user_id).await.unwrap());

        let err = f
            .service
            .create(&f.bob, create_request("Orphan", vec![book_input("B1")]))
            .await
            .unwrap_err();
        assert_eq!(kind(err), ErrorKind::Unauthorized);

        let err = f
            .service
            .rate(
                &f.bob,
                RateCollectionRequest {
                    id: created.id,
                    rating: 4.0,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(kind(err), ErrorKind::Unauthorized);

        let err = f
            .service
            .toggle_favourite(&f.bob, created.id)
            .await
            .unwrap_err();
        assert_eq!(kind(err), ErrorKind::Unauthorized);

        assert_eq!(f.store.collection_count(), 1);
        assert_eq!(f.store.book_count(), 0);
    }

    // ============================================================================
    // Scenario Tests
    // ============================================================================

    #[tokio::test]
    async fn test_sci_fi_picks_scenario() {
        let f = fixture().await;

        let created = f
            .service
            .create(
                &f.alice,
                create_request("Sci-Fi Picks", vec![book_input("B1"), book_input("B2")]),
            )
            .await
            .unwrap();

        assert!(f.service.toggle_favourite(&f.bob, created.id).await.unwrap());
        assert!(f.service.is_favourited(&f.bob, created.id).await.unwrap());

        let before = f.service.get_average_rating(created.id).await.unwrap();
        assert_eq!(before.average, None);
        assert_eq!(before.count, 0);

        f.service
            .rate(
                &f.bob,
                RateCollectionRequest {
                    id: created.id,
                    rating: 4.5,
                },
            )
            .await
            .unwrap();

        let after = f.service.get_average_rating(created.id).await.unwrap();
        assert_eq!(after.average, Some(4.5));
        assert_eq!(after.count, 1);
    }

    #[tokio::test]
    async fn test_deleting_owner_removes_collections() {
        let f = fixture().await;
        let created = f
            .service
            .create(&f.alice, create_request("Gone", vec![]))
            .await
            .unwrap();

        f.store.delete_user(f.alice.user_id).await.unwrap();
        assert!(f.service.get_by_id(created.id).await.unwrap().is_none());
    }
}
