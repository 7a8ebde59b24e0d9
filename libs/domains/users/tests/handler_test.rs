//! Handler tests for the Users domain
//!
//! These drive the users router with `oneshot` over the in-memory repository:
//! - Request deserialization and validation
//! - Response envelopes and status codes
//! - Error responses
//!
//! Stored state is checked through a clone of the repository, which shares
//! the same map as the one inside the router.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use domain_users::models::NewUser;
use domain_users::password::verify_password;
use domain_users::*;
use http_body_util::BodyExt;
use ::mongodb::bson::oid::ObjectId;
use serde_json::{Value, json};
use test_utils::TestDataBuilder;
use tower::ServiceExt; // For oneshot()

// Helper to parse JSON response body
async fn json_body<T: serde::de::DeserializeOwned>(body: Body) -> T {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn setup() -> (Router, InMemoryUserRepository) {
    let repo = InMemoryUserRepository::new();
    let app = handlers::router(UserService::new(repo.clone()));
    (app, repo)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn create(app: &Router, body: Value) -> UserResponse {
    let response = app
        .clone()
        .oneshot(json_request("POST", "/", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let envelope: Value = json_body(response.into_body()).await;
    serde_json::from_value(envelope["data"].clone()).unwrap()
}

async fn stored(repo: &InMemoryUserRepository, id: &str) -> User {
    let id = ObjectId::parse_str(id).unwrap();
    repo.get_by_id(id).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_create_user_returns_201_without_password() {
    let (app, repo) = setup();
    let builder = TestDataBuilder::from_test_name("handler_create_201");

    let response = app
        .oneshot(json_request(
            "POST",
            "/",
            json!({
                "name": "John  Doe!",
                "email": builder.email("john"),
                "password": builder.password(),
                "phone": "555-0100",
                "profileImg": "john.png",
                "role": "editor",
                "actions": ["delete"]
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = json_body(response.into_body()).await;
    let data = &body["data"];
    assert_eq!(data["slug"], "john-doe");
    assert_eq!(data["role"], "editor");
    assert_eq!(data["actions"], json!(["read", "create", "update"]));
    assert_eq!(data["active"], false);
    assert_eq!(data["profileImg"], "john.png");
    assert!(data.get("password").is_none());

    let user = stored(&repo, data["id"].as_str().unwrap()).await;
    assert_ne!(user.password, builder.password());
    assert!(verify_password(&builder.password(), &user.password).unwrap());
}

#[tokio::test]
async fn test_create_user_actions_follow_role() {
    let (app, _) = setup();
    let builder = TestDataBuilder::from_test_name("handler_create_roles");

    for (role, expected) in [
        ("user", json!(["read"])),
        ("writer", json!(["read", "create"])),
        ("editor", json!(["read", "create", "update"])),
        ("admin", json!(["read", "create", "update", "delete"])),
    ] {
        let user = create(
            &app,
            json!({
                "name": role,
                "email": builder.email(role),
                "password": builder.password(),
                "role": role,
                "actions": ["read", "create", "update", "delete"]
            }),
        )
        .await;

        assert_eq!(serde_json::to_value(&user.actions).unwrap(), expected);
    }
}

#[tokio::test]
async fn test_create_user_trims_padded_email() {
    let (app, repo) = setup();

    let response = app
        .oneshot(json_request(
            "POST",
            "/",
            json!({ "name": "Jane", "email": "  Jane@Example.com ", "password": "secret123" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["data"]["email"], "jane@example.com");

    let user = stored(&repo, body["data"]["id"].as_str().unwrap()).await;
    assert_eq!(user.email, "jane@example.com");
}

#[tokio::test]
async fn test_create_user_transliterates_slug() {
    let (app, _) = setup();
    let builder = TestDataBuilder::from_test_name("handler_create_slug");

    let user = create(
        &app,
        json!({ "name": "Иван Петров", "email": builder.email("ivan"), "password": builder.password() }),
    )
    .await;

    assert_eq!(user.name, "Иван Петров");
    assert_eq!(user.slug, "ivan-petrov");
}

#[tokio::test]
async fn test_create_user_missing_fields_returns_400() {
    let (app, repo) = setup();

    let response = app
        .oneshot(json_request("POST", "/", json!({ "name": "Jane" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["status"], 400);
    assert_eq!(body["error"], "VALIDATION_ERROR");
    assert!(body["details"]["email"].is_array());
    assert!(body["details"]["password"].is_array());

    assert!(repo.list(0, 10).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_user_short_password_returns_400() {
    let (app, _) = setup();

    let response = app
        .oneshot(json_request(
            "POST",
            "/",
            json!({ "name": "Jane", "email": "jane@example.com", "password": "short" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_user_duplicate_email_returns_409() {
    let (app, repo) = setup();
    let builder = TestDataBuilder::from_test_name("handler_duplicate");
    let body = json!({
        "name": "First",
        "email": builder.email("dup"),
        "password": builder.password()
    });

    create(&app, body).await;

    let response = app
        .oneshot(json_request(
            "POST",
            "/",
            json!({
                "name": "Second",
                "email": builder.email("dup").to_uppercase(),
                "password": builder.password()
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["error"], "CONFLICT");

    let users = repo.list(0, 10).await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name, "First");
}

#[tokio::test]
async fn test_get_user_returns_array_envelope() {
    let (app, _) = setup();
    let builder = TestDataBuilder::from_test_name("handler_get");
    let user = create(
        &app,
        json!({ "name": "Jane", "email": builder.email("jane"), "password": builder.password() }),
    )
    .await;

    let response = app
        .oneshot(empty_request("GET", &format!("/{}", user.id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["id"], user.id);
}

#[tokio::test]
async fn test_get_user_not_found_returns_404() {
    let (app, _) = setup();

    let response = app
        .oneshot(empty_request("GET", &format!("/{}", ObjectId::new())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_get_user_invalid_id_returns_400() {
    let (app, _) = setup();

    let response = app
        .oneshot(empty_request("GET", "/not-an-object-id"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["error"], "INVALID_OBJECT_ID");
}

#[tokio::test]
async fn test_list_users_second_page() {
    let (app, repo) = setup();
    let start = Utc::now();

    for i in 0..12 {
        let mut user = User::new(NewUser {
            name: format!("User {}", i + 1),
            slug: format!("user-{}", i + 1),
            email: format!("user{}@example.com", i + 1),
            password_hash: "hash".to_string(),
            phone: None,
            profile_img: None,
            role: Role::User,
        });
        user.created_at = start + Duration::seconds(i);
        repo.create(user).await.unwrap();
    }

    let response = app
        .oneshot(empty_request("GET", "/?page=2&limit=5"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["results"], 5);
    assert_eq!(body["page"], 2);

    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["User 6", "User 7", "User 8", "User 9", "User 10"]);
}

#[tokio::test]
async fn test_list_users_defaults_and_lenient_params() {
    let (app, _) = setup();

    let response = app
        .oneshot(empty_request("GET", "/?page=abc&limit=-1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["results"], 0);
    assert_eq!(body["page"], 1);
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_update_name_keeps_password_hash() {
    let (app, repo) = setup();
    let builder = TestDataBuilder::from_test_name("handler_update_name");
    let user = create(
        &app,
        json!({ "name": "Jane", "email": builder.email("jane"), "password": builder.password() }),
    )
    .await;
    let before = stored(&repo, &user.id).await;

    let response = app
        .oneshot(json_request(
            "PUT",
            &format!("/{}", user.id),
            json!({ "name": "Jane Q Public", "password": "ignored-password" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["data"]["name"], "Jane Q Public");
    assert_eq!(body["data"]["slug"], "jane-q-public");

    let after = stored(&repo, &user.id).await;
    assert_eq!(after.password, before.password);
    assert!(after.updated_at >= before.updated_at);
}

#[tokio::test]
async fn test_update_role_rewrites_actions() {
    let (app, _) = setup();
    let builder = TestDataBuilder::from_test_name("handler_update_role");
    let user = create(
        &app,
        json!({ "name": "Jane", "email": builder.email("jane"), "password": builder.password() }),
    )
    .await;
    assert_eq!(user.actions, vec![Action::Read]);

    let response = app
        .oneshot(json_request(
            "PUT",
            &format!("/{}", user.id),
            json!({ "role": "admin" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["data"]["role"], "admin");
    assert_eq!(
        body["data"]["actions"],
        json!(["read", "create", "update", "delete"])
    );
}

#[tokio::test]
async fn test_update_unknown_user_returns_404() {
    let (app, _) = setup();

    let response = app
        .oneshot(json_request(
            "PUT",
            &format!("/{}", ObjectId::new()),
            json!({ "name": "Ghost" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_to_taken_email_returns_409() {
    let (app, _) = setup();
    let builder = TestDataBuilder::from_test_name("handler_update_email");
    create(
        &app,
        json!({ "name": "A", "email": builder.email("a"), "password": builder.password() }),
    )
    .await;
    let second = create(
        &app,
        json!({ "name": "B", "email": builder.email("b"), "password": builder.password() }),
    )
    .await;

    let response = app
        .oneshot(json_request(
            "PUT",
            &format!("/{}", second.id),
            json!({ "email": builder.email("a") }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_update_unknown_user_with_taken_email_returns_404() {
    let (app, _) = setup();
    let builder = TestDataBuilder::from_test_name("handler_update_missing_taken");
    create(
        &app,
        json!({ "name": "A", "email": builder.email("a"), "password": builder.password() }),
    )
    .await;

    let response = app
        .oneshot(json_request(
            "PUT",
            &format!("/{}", ObjectId::new()),
            json!({ "email": builder.email("a") }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_normalises_padded_email() {
    let (app, repo) = setup();
    let builder = TestDataBuilder::from_test_name("handler_update_padded");
    let user = create(
        &app,
        json!({ "name": "Jane", "email": builder.email("jane"), "password": builder.password() }),
    )
    .await;

    let response = app
        .oneshot(json_request(
            "PUT",
            &format!("/{}", user.id),
            json!({ "email": "  New.Address@Example.COM " }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["data"]["email"], "new.address@example.com");
    assert_eq!(stored(&repo, &user.id).await.email, "new.address@example.com");
}

#[tokio::test]
async fn test_update_with_empty_body_keeps_fields() {
    let (app, repo) = setup();
    let builder = TestDataBuilder::from_test_name("handler_update_empty");
    let user = create(
        &app,
        json!({
            "name": "Jane Doe",
            "email": builder.email("jane"),
            "password": builder.password(),
            "phone": "555-0100"
        }),
    )
    .await;

    let response = app
        .oneshot(json_request("PUT", &format!("/{}", user.id), json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["data"]["name"], "Jane Doe");
    assert_eq!(body["data"]["slug"], "jane-doe");
    assert_eq!(body["data"]["email"], user.email);
    assert_eq!(body["data"]["phone"], "555-0100");

    let after = stored(&repo, &user.id).await;
    assert_eq!(after.name, "Jane Doe");
    assert_eq!(after.slug, "jane-doe");
}

#[tokio::test]
async fn test_delete_is_soft() {
    let (app, _) = setup();
    let builder = TestDataBuilder::from_test_name("handler_soft_delete");
    let user = create(
        &app,
        json!({ "name": "Jane", "email": builder.email("jane"), "password": builder.password() }),
    )
    .await;

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", &format!("/{}", user.id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body, json!({ "active": false }));

    let response = app
        .oneshot(empty_request("GET", &format!("/{}", user.id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["data"][0]["active"], false);
}

#[tokio::test]
async fn test_delete_unknown_user_returns_404() {
    let (app, _) = setup();

    let response = app
        .oneshot(empty_request("DELETE", &format!("/{}", ObjectId::new())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_change_password() {
    let (app, repo) = setup();
    let builder = TestDataBuilder::from_test_name("handler_change_password");
    let user = create(
        &app,
        json!({ "name": "Jane", "email": builder.email("jane"), "password": builder.password() }),
    )
    .await;

    let response = app
        .oneshot(json_request(
            "PUT",
            &format!("/change-password/{}", user.id),
            json!({ "newPwd": "secret123" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["data"]["id"], user.id);
    assert!(body["data"].get("password").is_none());

    let after = stored(&repo, &user.id).await;
    assert_ne!(after.password, "secret123");
    assert!(verify_password("secret123", &after.password).unwrap());
    assert!(!verify_password(&builder.password(), &after.password).unwrap());
}

#[tokio::test]
async fn test_change_password_validates_length() {
    let (app, _) = setup();

    let response = app
        .oneshot(json_request(
            "PUT",
            &format!("/change-password/{}", ObjectId::new()),
            json!({ "newPwd": "short" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_change_password_unknown_user_returns_404() {
    let (app, _) = setup();

    let response = app
        .oneshot(json_request(
            "PUT",
            &format!("/change-password/{}", ObjectId::new()),
            json!({ "newPwd": "secret123" }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unreachable_database_returns_503() {
    let client =
        ::mongodb::Client::with_uri_str("mongodb://127.0.0.1:1/?serverSelectionTimeoutMS=200")
            .await
            .unwrap();
    let repo = MongoUserRepository::new(client.database("users_unreachable"));
    let app = handlers::router(UserService::new(repo));

    let response = app
        .oneshot(empty_request("GET", &format!("/{}", ObjectId::new())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = json_body(response.into_body()).await;
    assert_eq!(body["error"], "DATABASE_UNAVAILABLE");
}
