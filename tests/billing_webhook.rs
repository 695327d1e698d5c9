use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::{Extension, Router};
use hmac::{Hmac, Mac};
use rewrite_backend::routes;
use rewrite_backend::transform::{OpenAiTransformer, TextTransformer};
use serde_json::json;
use sha2::Sha256;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt; // for `oneshot`

fn app(pool: PgPool) -> Router {
    let transformer: Arc<dyn TextTransformer> = Arc::new(OpenAiTransformer::new(
        "http://127.0.0.1:9",
        None,
        "test-model",
        Duration::from_secs(1),
    ));
    routes::api_routes()
        .layer(Extension(pool))
        .layer(Extension(transformer))
}

fn sign(body: &str) -> String {
    std::env::set_var("BILLING_WEBHOOK_SECRET", "whsec-test");
    let mut mac = Hmac::<Sha256>::new_from_slice(b"whsec-test").unwrap();
    mac.update(body.as_bytes());
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

async fn deliver(app: &Router, body: &str, signature: &str) -> StatusCode {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/billing/webhook")
                .header("content-type", "application/json")
                .header("x-webhook-signature", signature)
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    response.status()
}

async fn stored_tier(pool: &PgPool, user_id: &str) -> (String, Option<String>) {
    let row = sqlx::query("SELECT tier, subscription_id FROM usage_records WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .unwrap();
    (row.get("tier"), row.get("subscription_id"))
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn upgrade_event_sets_tier(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let app = app(pool.clone());

    let body = json!({
        "event": "subscription.created",
        "user_id": "user-up",
        "data": { "tier": "pro", "subscription_id": "sub_123" },
    })
    .to_string();
    let status = deliver(&app, &body, &sign(&body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        stored_tier(&pool, "user-up").await,
        ("pro".to_string(), Some("sub_123".to_string()))
    );
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn cancellation_resets_to_free_and_keeps_counters(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    sqlx::query(
        r#"
        INSERT INTO usage_records (user_id, tier, rewrites_today, rewrites_total, last_rewrite_date, subscription_id)
        VALUES ($1, 'pro', 7, 400, CURRENT_DATE, 'sub_456')
        "#,
    )
    .bind("user-down")
    .execute(&pool)
    .await
    .unwrap();

    let app = app(pool.clone());
    let body = json!({ "event": "subscription.deleted", "user_id": "user-down" }).to_string();
    let status = deliver(&app, &body, &sign(&body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        stored_tier(&pool, "user-down").await,
        ("free".to_string(), None)
    );

    let (today, total): (i32, i64) = {
        let row = sqlx::query(
            "SELECT rewrites_today, rewrites_total FROM usage_records WHERE user_id = $1",
        )
        .bind("user-down")
        .fetch_one(&pool)
        .await
        .unwrap();
        (row.get("rewrites_today"), row.get("rewrites_total"))
    };
    assert_eq!((today, total), (7, 400));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn bad_signature_is_rejected(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let app = app(pool.clone());

    let body = json!({
        "event": "subscription.created",
        "user_id": "user-forged",
        "data": { "tier": "pro" },
    })
    .to_string();
    // sign() also pins the secret env var for the process
    let _ = sign(&body);
    let status = deliver(&app, &body, "sha256=deadbeef").await;
    assert_ne!(status, StatusCode::OK);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM usage_records")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 0);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL with Postgres server"]
async fn unknown_events_are_acknowledged(pool: PgPool) {
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let app = app(pool.clone());

    let body = json!({ "event": "invoice.paid", "user_id": "user-x" }).to_string();
    let status = deliver(&app, &body, &sign(&body)).await;
    assert_eq!(status, StatusCode::OK);
}
