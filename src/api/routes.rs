//! API Route Definitions
//!
//! Procedures are served under `/rpc/<router>.<procedure>`: queries as `GET`
//! with their input in the query string, mutations as `POST` with a JSON
//! body. The RouterBuilder enables procedure groups selectively, e.g. to run
//! a read-only replica that serves only the public collection queries.

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use super::{auth_handlers, book_handlers, collection_handlers, handlers, middleware};
use super::handlers::AppState;
use super::middleware::SessionAuth;

/// Builder for creating API routes with configurable procedure groups
#[derive(Default)]
pub struct RouterBuilder {
    /// Whether to enable the health check endpoint (GET /health)
    health_check: bool,
    /// Public collection queries (getAll, getAllByUserSlug, getById, search, getAverageRating)
    collection_queries: bool,
    /// Caller-specific collection queries and all collection mutations
    collection_mutations: bool,
    /// `user.*` procedures
    user_procedures: bool,
    /// `book.search`
    book_search: bool,
    /// Google OAuth and magic-link sign-in under /auth
    sign_in: bool,
}

impl RouterBuilder {
    /// Creates a new router builder with all routes disabled by default
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a router builder with every procedure enabled
    pub fn with_all_routes() -> Self {
        Self {
            health_check: true,
            collection_queries: true,
            collection_mutations: true,
            user_procedures: true,
            book_search: true,
            sign_in: true,
        }
    }

    /// Public, unauthenticated reads only
    pub fn with_readonly_routes() -> Self {
        Self {
            health_check: true,
            collection_queries: true,
            book_search: true,
            ..Self::default()
        }
    }

    /// Only the health check endpoint
    pub fn with_minimal_routes() -> Self {
        Self {
            health_check: true,
            ..Self::default()
        }
    }

    pub fn health_check(mut self, enabled: bool) -> Self {
        self.health_check = enabled;
        self
    }

    pub fn collection_queries(mut self, enabled: bool) -> Self {
        self.collection_queries = enabled;
        self
    }

    pub fn collection_mutations(mut self, enabled: bool) -> Self {
        self.collection_mutations = enabled;
        self
    }

    pub fn user_procedures(mut self, enabled: bool) -> Self {
        self.user_procedures = enabled;
        self
    }

    pub fn book_search(mut self, enabled: bool) -> Self {
        self.book_search = enabled;
        self
    }

    pub fn sign_in(mut self, enabled: bool) -> Self {
        self.sign_in = enabled;
        self
    }

    /// Builds the Axum router with the configured routes
    ///
    /// Protected procedures are wrapped in the auth middleware, which
    /// validates session tokens and resolves their user through `auth`.
    pub fn build(self, auth: SessionAuth) -> Router<AppState> {
        let mut public = Router::new();
        let mut protected = Router::new();

        if self.health_check {
            public = public.route("/health", get(handlers::health_check));
        }

        if self.collection_queries {
            public = public
                .route("/rpc/collection.getAll", get(collection_handlers::get_all))
                .route(
                    "/rpc/collection.getAllByUserSlug",
                    get(collection_handlers::get_all_by_user_slug),
                )
                .route("/rpc/collection.getById", get(collection_handlers::get_by_id))
                .route("/rpc/collection.search", get(collection_handlers::search))
                .route(
                    "/rpc/collection.getAverageRating",
                    get(collection_handlers::get_average_rating),
                );
        }

        if self.collection_mutations {
            protected = protected
                .route(
                    "/rpc/collection.isFavourited",
                    get(collection_handlers::is_favourited),
                )
                .route(
                    "/rpc/collection.getUserRating",
                    get(collection_handlers::get_user_rating),
                )
                .route("/rpc/collection.create", post(collection_handlers::create))
                .route("/rpc/collection.delete", post(collection_handlers::delete))
                .route("/rpc/collection.rate", post(collection_handlers::rate))
                .route(
                    "/rpc/collection.toggleFavourite",
                    post(collection_handlers::toggle_favourite),
                );
        }

        if self.user_procedures {
            protected = protected
                .route("/rpc/user.getUser", get(handlers::get_user))
                .route("/rpc/user.updateProfile", post(handlers::update_profile))
                .route("/rpc/user.verifyEmail", post(handlers::verify_email))
                .route("/rpc/user.delete", post(handlers::delete_user));
        }

        if self.book_search {
            public = public.route("/rpc/book.search", get(book_handlers::search_books));
        }

        if self.sign_in {
            public = public
                .route(
                    "/auth/signin/google",
                    get(auth_handlers::initiate_google_oauth),
                )
                .route(
                    "/auth/callback/google",
                    get(auth_handlers::handle_google_callback),
                )
                .route("/auth/signin/email", post(auth_handlers::request_magic_link))
                .route(
                    "/auth/callback/email",
                    post(auth_handlers::consume_magic_link),
                );
        }

        if self.collection_mutations || self.user_procedures {
            public = public.merge(
                protected.route_layer(from_fn_with_state(auth, middleware::auth_middleware)),
            );
        }

        public
    }
}

/// Creates all API routes
pub fn create_routes(auth: SessionAuth) -> Router<AppState> {
    RouterBuilder::with_all_routes().build(auth)
}
