//! Collection Procedure Handlers
//!
//! `collection.*` queries read their input from the query string; mutations
//! take a JSON body. Procedures that need a caller read the session placed in
//! the request extensions by the auth middleware.

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Extension, Json,
};

use super::handlers::{invalid_input, AppState, SuccessResponse};
use super::middleware::AuthUser;
use crate::{
    models::{
        CollectionDetail, CollectionIdRequest, CollectionPage, CreateCollectionRequest,
        CreateCollectionResponse, FavouriteState, PageQuery, RateCollectionRequest, Rating,
        RatingSummary, SearchQuery, UserCollectionPage, UserCollectionsQuery,
    },
    utils::error::AppResult,
};

/// `collection.getAll`
pub async fn get_all(
    State(state): State<AppState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> AppResult<Json<SuccessResponse<CollectionPage>>> {
    let Query(query) = query.map_err(invalid_input)?;
    let page = state.collection_service.get_all(query.page).await?;
    Ok(Json(SuccessResponse::new(page)))
}

/// `collection.getAllByUserSlug`
pub async fn get_all_by_user_slug(
    State(state): State<AppState>,
    query: Result<Query<UserCollectionsQuery>, QueryRejection>,
) -> AppResult<Json<SuccessResponse<UserCollectionPage>>> {
    let Query(query) = query.map_err(invalid_input)?;
    let page = state.collection_service.get_all_by_user_slug(query).await?;
    Ok(Json(SuccessResponse::new(page)))
}

/// `collection.getById`; `data` is null when the collection does not exist
pub async fn get_by_id(
    State(state): State<AppState>,
    query: Result<Query<CollectionIdRequest>, QueryRejection>,
) -> AppResult<Json<SuccessResponse<Option<CollectionDetail>>>> {
    let Query(query) = query.map_err(invalid_input)?;
    let collection = state.collection_service.get_by_id(query.id).await?;
    Ok(Json(SuccessResponse::new(collection)))
}

/// `collection.search`
pub async fn search(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> AppResult<Json<SuccessResponse<CollectionPage>>> {
    let Query(query) = query.map_err(invalid_input)?;
    let page = state.collection_service.search(query).await?;
    Ok(Json(SuccessResponse::new(page)))
}

/// `collection.isFavourited`
pub async fn is_favourited(
    State(state): State<AppState>,
    Extension(AuthUser(session)): Extension<AuthUser>,
    query: Result<Query<CollectionIdRequest>, QueryRejection>,
) -> AppResult<Json<SuccessResponse<FavouriteState>>> {
    let Query(query) = query.map_err(invalid_input)?;
    let favourited = state
        .collection_service
        .is_favourited(&session, query.id)
        .await?;
    Ok(Json(SuccessResponse::new(FavouriteState { favourited })))
}

/// `collection.getAverageRating`
pub async fn get_average_rating(
    State(state): State<AppState>,
    query: Result<Query<CollectionIdRequest>, QueryRejection>,
) -> AppResult<Json<SuccessResponse<RatingSummary>>> {
    let Query(query) = query.map_err(invalid_input)?;
    let summary = state.collection_service.get_average_rating(query.id).await?;
    Ok(Json(SuccessResponse::new(summary)))
}

/// `collection.getUserRating`
pub async fn get_user_rating(
    State(state): State<AppState>,
    Extension(AuthUser(session)): Extension<AuthUser>,
    query: Result<Query<CollectionIdRequest>, QueryRejection>,
) -> AppResult<Json<SuccessResponse<Option<Rating>>>> {
    let Query(query) = query.map_err(invalid_input)?;
    let rating = state
        .collection_service
        .get_user_rating(&session, query.id)
        .await?;
    Ok(Json(SuccessResponse::new(rating)))
}

/// `collection.create`
pub async fn create(
    State(state): State<AppState>,
    Extension(AuthUser(session)): Extension<AuthUser>,
    request: Result<Json<CreateCollectionRequest>, JsonRejection>,
) -> AppResult<Json<SuccessResponse<CreateCollectionResponse>>> {
    let Json(request) = request.map_err(invalid_input)?;
    let created = state.collection_service.create(&session, request).await?;
    Ok(Json(SuccessResponse::new(created)))
}

/// `collection.delete`
pub async fn delete(
    State(state): State<AppState>,
    Extension(AuthUser(session)): Extension<AuthUser>,
    request: Result<Json<CollectionIdRequest>, JsonRejection>,
) -> AppResult<Json<SuccessResponse<()>>> {
    let Json(request) = request.map_err(invalid_input)?;
    state.collection_service.delete(&session, request.id).await?;
    Ok(Json(SuccessResponse::new(())))
}

/// `collection.rate`
pub async fn rate(
    State(state): State<AppState>,
    Extension(AuthUser(session)): Extension<AuthUser>,
    request: Result<Json<RateCollectionRequest>, JsonRejection>,
) -> AppResult<Json<SuccessResponse<Rating>>> {
    let Json(request) = request.map_err(invalid_input)?;
    let rating = state.collection_service.rate(&session, request).await?;
    Ok(Json(SuccessResponse::new(rating)))
}

/// `collection.toggleFavourite`
pub async fn toggle_favourite(
    State(state): State<AppState>,
    Extension(AuthUser(session)): Extension<AuthUser>,
    request: Result<Json<CollectionIdRequest>, JsonRejection>,
) -> AppResult<Json<SuccessResponse<FavouriteState>>> {
    let Json(request) = request.map_err(invalid_input)?;
    let favourited = state
        .collection_service
        .toggle_favourite(&session, request.id)
        .await?;
    Ok(Json(SuccessResponse::new(FavouriteState { favourited })))
}
