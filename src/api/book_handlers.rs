//! Book Catalog Handlers

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use log::debug;
use validator::Validate;

use super::handlers::{invalid_input, AppState, SuccessResponse};
use crate::{
    models::{Book, BookSearchQuery},
    service::book_catalog::DEFAULT_MAX_RESULTS,
    utils::error::{validation_message, AppError, AppResult},
};

/// `book.search`: proxies a free-text query to the external catalog
pub async fn search_books(
    State(state): State<AppState>,
    query: Result<Query<BookSearchQuery>, QueryRejection>,
) -> AppResult<Json<SuccessResponse<Vec<Book>>>> {
    let Query(query) = query.map_err(invalid_input)?;
    query
        .validate()
        .map_err(|e| AppError::Validation(validation_message(&e)))?;

    let terms = query.query.trim();
    if terms.is_empty() {
        return Err(AppError::Validation("Query cannot be blank".to_string()));
    }

    let max_results = query.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
    debug!("book.search {:?} (max {})", terms, max_results);

    let books = state.book_catalog.search(terms, max_results).await?;
    Ok(Json(SuccessResponse::new(books)))
}
