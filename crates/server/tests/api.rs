use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use sea_orm::Database;
use serde_json::{Value, json};
use tower::ServiceExt;

use engine::Engine;
use migration::MigratorTrait;
use server::{ServerConfig, ServerState, router};

async fn app() -> Router {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    let engine = Engine::builder().database(db.clone()).build();
    let config = ServerConfig {
        jwt_secret: "test-secret".to_string(),
        admin_username: Some("admin".to_string()),
        admin_password: Some("admin-pass".to_string()),
        ai: None,
        proxy_url: None,
    };
    router(ServerState::new(engine, db, config))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

async fn login(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/auth/login",
            None,
            json!({"username": "admin", "password": "admin-pass"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn bootstrap_login_succeeds_and_is_repeatable() {
    let app = app().await;
    let first = login(&app).await;
    let second = login(&app).await;
    assert!(!first.is_empty());
    assert!(!second.is_empty());
}

#[tokio::test]
async fn wrong_password_and_unknown_user_are_indistinguishable() {
    let app = app().await;
    login(&app).await;

    let wrong_pass = app
        .clone()
        .oneshot(post_json(
            "/api/auth/login",
            None,
            json!({"username": "admin", "password": "nope"}),
        ))
        .await
        .unwrap();
    let unknown_user = app
        .clone()
        .oneshot(post_json(
            "/api/auth/login",
            None,
            json!({"username": "ghost", "password": "nope"}),
        ))
        .await
        .unwrap();

    assert_eq!(wrong_pass.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(wrong_pass).await,
        body_json(unknown_user).await
    );
}

#[tokio::test]
async fn protected_routes_require_credentials() {
    let app = app().await;
    let response = app
        .clone()
        .oneshot(get("/api/records?startMonth=2026-01&endMonth=2026-01", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn record_create_and_daily_report_round_trip() {
    let app = app().await;
    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/records",
            Some(&token),
            json!({
                "kind": "支出",
                "category": "饮食",
                "amountCents": 4580,
                "date": "2026-01-05",
                "remark": "午餐"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(get(
            "/api/records?startMonth=2026-01&endMonth=2026-01",
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["granularity"], "daily");
    let buckets = body["buckets"].as_array().unwrap();
    assert_eq!(buckets.len(), 31);
    assert_eq!(buckets[4]["label"], "2026-01-05");
    assert_eq!(buckets[4]["totalCents"], 4580);
}

#[tokio::test]
async fn report_accepts_member_id_all() {
    let app = app().await;
    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/records",
            Some(&token),
            json!({
                "kind": "支出",
                "category": "饮食",
                "amountCents": 2500,
                "date": "2026-01-10"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(get(
            "/api/records?startMonth=2026-01&endMonth=2026-01&memberId=all",
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["buckets"][9]["totalCents"], 2500);
}

#[tokio::test]
async fn record_with_unknown_category_is_rejected() {
    let app = app().await;
    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/records",
            Some(&token),
            json!({
                "kind": "支出",
                "category": "不存在的分类",
                "amountCents": 100,
                "date": "2026-01-05"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_report_range_is_rejected() {
    let app = app().await;
    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(get(
            "/api/records?startMonth=2026-03&endMonth=2026-01",
            Some(&token),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn batch_import_reports_per_row_failures() {
    let app = app().await;
    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/records/batch",
            Some(&token),
            json!({"records": [
                {"kind": "支出", "category": "饮食", "amountCents": 4580, "date": "2026-01-05"},
                {"kind": "支出", "category": "饮食", "amountCents": 0, "date": "2026-01-05"},
                {"kind": "不明", "category": "饮食", "amountCents": 100, "date": "2026-01-05"}
            ]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["inserted"], 1);
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0]["index"], 1);
    assert_eq!(errors[1]["index"], 2);
}

#[tokio::test]
async fn batch_with_no_valid_rows_fails() {
    let app = app().await;
    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/records/batch",
            Some(&token),
            json!({"records": [
                {"kind": "支出", "category": "饮食", "amountCents": 0, "date": "2026-01-05"}
            ]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn duplicate_member_name_conflicts() {
    let app = app().await;
    let token = login(&app).await;

    let created = app
        .clone()
        .oneshot(post_json(
            "/api/members",
            Some(&token),
            json!({"name": "小明"}),
        ))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);

    let duplicate = app
        .clone()
        .oneshot(post_json(
            "/api/members",
            Some(&token),
            json!({"name": "小明"}),
        ))
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn member_nickname_cleared_by_explicit_null() {
    let app = app().await;
    let token = login(&app).await;

    let created = app
        .clone()
        .oneshot(post_json(
            "/api/members",
            Some(&token),
            json!({"name": "小明", "nickname": "明明"}),
        ))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let member_id = body_json(created).await["id"].as_i64().unwrap();

    let patched = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/members/{member_id}"))
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"nickname": null}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(patched.status(), StatusCode::OK);
    assert!(body_json(patched).await["nickname"].is_null());

    // A patch that omits the field leaves the stored value alone.
    let repatched = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/members/{member_id}"))
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"nickname": "小小明"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(repatched.status(), StatusCode::OK);

    let untouched = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/members/{member_id}"))
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"color": "#45B7D1"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(untouched.status(), StatusCode::OK);
    assert_eq!(body_json(untouched).await["nickname"], "小小明");
}

#[tokio::test]
async fn api_token_grants_access_but_cannot_manage_tokens() {
    let app = app().await;
    let jwt = login(&app).await;

    let created = app
        .clone()
        .oneshot(post_json(
            "/api/auth/tokens",
            Some(&jwt),
            json!({"name": "sync-bot"}),
        ))
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let token_value = body_json(created).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    // Programmatic access works.
    let listing = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/members")
                .header("x-api-token", &token_value)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(listing.status(), StatusCode::OK);

    // A token cannot mint more tokens.
    let minting = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/tokens")
                .header("x-api-token", &token_value)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"name": "evil"}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(minting.status(), StatusCode::UNAUTHORIZED);

    // Listing under the JWT shows a masked value and the usage timestamp.
    let summaries = app
        .clone()
        .oneshot(get("/api/auth/tokens", Some(&jwt)))
        .await
        .unwrap();
    let body = body_json(summaries).await;
    let entry = &body.as_array().unwrap()[0];
    assert_ne!(entry["token"], token_value.as_str());
    assert!(!entry["lastUsedAt"].is_null());
}

#[tokio::test]
async fn disabled_api_token_is_rejected() {
    let app = app().await;
    let jwt = login(&app).await;

    let created = app
        .clone()
        .oneshot(post_json(
            "/api/auth/tokens",
            Some(&jwt),
            json!({"name": "sync-bot"}),
        ))
        .await
        .unwrap();
    let body = body_json(created).await;
    let token_value = body["token"].as_str().unwrap().to_string();
    let token_id = body["id"].as_i64().unwrap();

    let toggled = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/auth/tokens/{token_id}"))
                .header(header::AUTHORIZATION, format!("Bearer {jwt}"))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json!({"isActive": false}).to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(toggled.status(), StatusCode::OK);

    let rejected = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/members")
                .header("x-api-token", &token_value)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn ai_endpoints_answer_503_without_a_configured_collaborator() {
    let app = app().await;
    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/bill/analyze",
            Some(&token),
            json!({"text": "1月5日 午餐 45.8元"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn tabular_import_returns_candidates_without_persisting() {
    let app = app().await;
    let token = login(&app).await;

    let csv = "\
支付宝交易记录明细查询\n\
账号:\n\
起始日期:\n\
终止日期:\n\
交易号,商家订单号,创建时间,付款时间,类型,空,空,交易对方,商品名称,金额,收/支,交易状态,服务费,退款,备注\n\
tx1,o1,2026-01-16,2026-01-16 17:44:03,其他,,,美团外卖,晚餐,100.00,支出,交易成功,,,\n";

    let boundary = "bill-import-test";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"format\"\r\n\r\n\
         alipay\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"alipay.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {csv}\r\n\
         --{boundary}--\r\n"
    );

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/bill/import")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let parsed = body_json(response).await;
    assert_eq!(parsed["count"], 1);
    assert_eq!(parsed["records"][0]["kind"], "支出");
    assert_eq!(parsed["records"][0]["category"], "饮食");
    assert_eq!(parsed["records"][0]["amountCents"], 10000);

    // Candidates are not persisted.
    let report = app
        .clone()
        .oneshot(get(
            "/api/records?startMonth=2026-01&endMonth=2026-01",
            Some(&token),
        ))
        .await
        .unwrap();
    let report = body_json(report).await;
    assert!(
        report["buckets"]
            .as_array()
            .unwrap()
            .iter()
            .all(|b| b["totalCents"] == 0)
    );
}

#[tokio::test]
async fn pdf_upload_requires_a_pdf_extension() {
    let app = app().await;
    let token = login(&app).await;

    let boundary = "pdf-ext-test";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"notes.txt\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         hello\r\n\
         --{boundary}--\r\n"
    );

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/bill/parse-pdf")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn proxy_endpoint_answers_503_when_unconfigured() {
    let app = app().await;
    let token = login(&app).await;

    let boundary = "proxy-test";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"bill.pdf\"\r\n\
         Content-Type: application/pdf\r\n\r\n\
         %PDF-1.4\r\n\
         --{boundary}--\r\n"
    );

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/bill/parse-proxy")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn me_returns_the_session_identity() {
    let app = app().await;
    let token = login(&app).await;

    let response = app
        .clone()
        .oneshot(get("/api/auth/me", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["username"], "admin");
}
