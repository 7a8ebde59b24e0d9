use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use axum_helpers::{
    ObjectIdPath, ValidatedJson,
    errors::responses::{
        BadRequestObjectIdResponse, BadRequestValidationResponse, ConflictResponse,
        InternalServerErrorResponse, NotFoundResponse, ServiceUnavailableResponse,
    },
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

use crate::error::UserResult;
use crate::models::{Action, ChangePassword, CreateUser, ListQuery, Role, UpdateUser, UserResponse};
use crate::repository::UserRepository;
use crate::service::UserService;

/// Envelope for a page of users
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserListResponse {
    /// Number of users in `data`
    pub results: usize,
    pub page: u64,
    pub data: Vec<UserResponse>,
}

/// Envelope for a single user
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserDataResponse {
    pub data: UserResponse,
}

/// Envelope for get-by-id, which keeps the array shape of a query result
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserLookupResponse {
    pub data: Vec<UserResponse>,
}

/// Envelope for a soft delete
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActiveResponse {
    pub active: bool,
}

/// OpenAPI documentation for Users API
#[derive(OpenApi)]
#[openapi(
    paths(
        list_users,
        create_user,
        get_user,
        update_user,
        delete_user,
        change_password,
    ),
    components(
        schemas(
            UserResponse,
            CreateUser,
            UpdateUser,
            ChangePassword,
            Role,
            Action,
            UserListResponse,
            UserDataResponse,
            UserLookupResponse,
            ActiveResponse
        ),
        responses(
            NotFoundResponse,
            BadRequestValidationResponse,
            BadRequestObjectIdResponse,
            ConflictResponse,
            ServiceUnavailableResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = "Users", description = "User management endpoints (MongoDB)")
    )
)]
pub struct ApiDoc;

/// Create the users router with all HTTP endpoints
pub fn router<R: UserRepository + 'static>(service: UserService<R>) -> Router {
    let shared_service = Arc::new(service);

    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
        .route("/change-password/{id}", put(change_password))
        .with_state(shared_service)
}

/// List users, five per page by default
#[utoipa::path(
    get,
    path = "",
    tag = "Users",
    params(ListQuery),
    responses(
        (status = 200, description = "A page of users", body = UserListResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn list_users<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    Query(query): Query<ListQuery>,
) -> UserResult<Json<UserListResponse>> {
    let page = service.list_users(query).await?;

    Ok(Json(UserListResponse {
        results: page.users.len(),
        page: page.page,
        data: page.users,
    }))
}

/// Create a new user
#[utoipa::path(
    post,
    path = "",
    tag = "Users",
    request_body = CreateUser,
    responses(
        (status = 201, description = "User created successfully", body = UserDataResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 409, response = ConflictResponse),
        (status = 503, response = ServiceUnavailableResponse)
    )
)]
async fn create_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    ValidatedJson(input): ValidatedJson<CreateUser>,
) -> UserResult<impl IntoResponse> {
    let user = service.create_user(input).await?;
    Ok((StatusCode::CREATED, Json(UserDataResponse { data: user })))
}

/// Get a user by ID
#[utoipa::path(
    get,
    path = "/{id}",
    tag = "Users",
    params(
        ("id" = String, Path, description = "User ObjectId (24 hex characters)")
    ),
    responses(
        (status = 200, description = "User found", body = UserLookupResponse),
        (status = 400, response = BadRequestObjectIdResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn get_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    ObjectIdPath(id): ObjectIdPath,
) -> UserResult<Json<UserLookupResponse>> {
    let user = service.get_user(id).await?;
    Ok(Json(UserLookupResponse { data: vec![user] }))
}

/// Update a user's profile, role or email
#[utoipa::path(
    put,
    path = "/{id}",
    tag = "Users",
    params(
        ("id" = String, Path, description = "User ObjectId (24 hex characters)")
    ),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated successfully", body = UserDataResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 409, response = ConflictResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn update_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    ObjectIdPath(id): ObjectIdPath,
    ValidatedJson(input): ValidatedJson<UpdateUser>,
) -> UserResult<Json<UserDataResponse>> {
    let user = service.update_user(id, input).await?;
    Ok(Json(UserDataResponse { data: user }))
}

/// Deactivate a user (soft delete)
#[utoipa::path(
    delete,
    path = "/{id}",
    tag = "Users",
    params(
        ("id" = String, Path, description = "User ObjectId (24 hex characters)")
    ),
    responses(
        (status = 200, description = "User deactivated", body = ActiveResponse),
        (status = 400, response = BadRequestObjectIdResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn delete_user<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    ObjectIdPath(id): ObjectIdPath,
) -> UserResult<Json<ActiveResponse>> {
    let user = service.deactivate_user(id).await?;
    Ok(Json(ActiveResponse {
        active: user.active,
    }))
}

/// Replace a user's password
#[utoipa::path(
    put,
    path = "/change-password/{id}",
    tag = "Users",
    params(
        ("id" = String, Path, description = "User ObjectId (24 hex characters)")
    ),
    request_body = ChangePassword,
    responses(
        (status = 200, description = "Password changed", body = UserDataResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn change_password<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    ObjectIdPath(id): ObjectIdPath,
    ValidatedJson(input): ValidatedJson<ChangePassword>,
) -> UserResult<Json<UserDataResponse>> {
    let user = service.change_password(id, input).await?;
    Ok(Json(UserDataResponse { data: user }))
}
