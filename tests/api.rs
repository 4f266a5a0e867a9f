//! End-to-end tests driving the full router with in-memory SQLite

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use data_encoding::BASE64;
use hmac::{Hmac, Mac};
use serde_json::{json, Value};
use sha2::Sha256;
use tower::ServiceExt;

use learnhub::api::{build_router, AppState};
use learnhub::cache::MemoryCache;
use learnhub::config::AuthConfig;
use learnhub::db::{create_test_pool, migrations};

struct TestApp {
    router: Router,
    state: AppState,
}

impl TestApp {
    async fn new() -> Self {
        Self::with_auth(AuthConfig::default()).await
    }

    async fn with_auth(auth: AuthConfig) -> Self {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let cache = std::sync::Arc::new(MemoryCache::new());
        let state = AppState::new(pool, cache, &auth);
        let router = build_router(state.clone(), "http://localhost:3000");
        Self { router, state }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.dispatch(request).await
    }

    async fn dispatch(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    /// Register and return the session token
    async fn register(&self, email: &str, name: &str) -> String {
        let (status, body) = self
            .post(
                "/api/auth/register",
                None,
                json!({ "email": email, "name": name, "password": "password123" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    async fn instructor(&self, email: &str) -> String {
        let token = self.register(email, "Grace").await;
        let (status, body) = self
            .send(
                Method::PUT,
                "/api/user/role",
                Some(&token),
                Some(json!({ "role": "instructor" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], "instructor");
        token
    }

    /// A published course with one preview lesson; returns (course_id, lesson_id)
    async fn published_course(&self, token: &str, title: &str, price_cents: i64) -> (i64, i64) {
        let (status, course) = self
            .post(
                "/api/courses",
                Some(token),
                json!({
                    "title": title,
                    "description": "Learn by building",
                    "price_cents": price_cents,
                    "category": "programming",
                    "level": "beginner"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create course failed: {}", course);
        let course_id = course["id"].as_i64().unwrap();

        let (status, module) = self
            .post(
                &format!("/api/courses/{}/modules", course_id),
                Some(token),
                json!({ "title": "Getting started" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, lesson) = self
            .post(
                &format!("/api/modules/{}/lessons", module["id"]),
                Some(token),
                json!({ "title": "Hello", "content": "First steps", "duration_minutes": 5 }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = self
            .post(&format!("/api/courses/{}/publish", course_id), Some(token), json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);

        (course_id, lesson["id"].as_i64().unwrap())
    }

    async fn published_post(&self, token: &str, title: &str) -> i64 {
        let (status, post) = self
            .post(
                "/api/blog",
                Some(token),
                json!({ "title": title, "content": "Some **markdown**", "status": "published" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create post failed: {}", post);
        post["id"].as_i64().unwrap()
    }

    async fn count(&self, sql: &str, id: i64) -> i64 {
        let pool = self.state.pool.sqlite().unwrap();
        sqlx::query_scalar::<_, i64>(sql)
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_protected_routes_require_authentication() {
    let app = TestApp::new().await;

    let cases = [
        (Method::GET, "/api/user"),
        (Method::GET, "/api/enrollments"),
        (Method::GET, "/api/cart"),
        (Method::GET, "/api/orders"),
        (Method::POST, "/api/checkout"),
        (Method::POST, "/api/blog"),
        (Method::POST, "/api/blog/1/like"),
        (Method::POST, "/api/blog/1/comments"),
        (Method::POST, "/api/courses"),
        (Method::POST, "/api/courses/1/enroll"),
        (Method::GET, "/api/instructor/stats"),
        (Method::PUT, "/api/admin/users/1/role"),
    ];
    for (method, uri) in cases {
        let (status, body) = app.send(method.clone(), uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    let (status, _) = app.get("/api/user", Some("not-a-session")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_public_routes_work_without_session() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/courses", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);

    let (status, body) = app.get("/api/blog", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"], json!([]));

    let (status, body) = app.get("/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);
}

#[tokio::test]
async fn test_first_user_is_admin_and_session_cookie_works() {
    let app = TestApp::new().await;
    app.register("admin@example.com", "Ada").await;
    let student = app.register("student@example.com", "Sam").await;

    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "admin@example.com", "password": "password123" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "admin");

    let request = Request::builder()
        .uri("/api/user")
        .header(header::COOKIE, format!("session={}", student))
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.dispatch(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "student");
    assert!(body["student_profile"].is_object());
}

#[tokio::test]
async fn test_role_guards() {
    let app = TestApp::new().await;
    app.register("admin@example.com", "Ada").await;
    let student = app.register("student@example.com", "Sam").await;

    let (status, body) = app
        .post("/api/courses", Some(&student), json!({ "title": "Nope" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, _) = app
        .send(
            Method::PUT,
            "/api/user/role",
            Some(&student),
            Some(json!({ "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .post(
            "/api/admin/coupons",
            Some(&student),
            json!({ "code": "FREE", "discount_percent": 100 }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_course_listing_returns_declared_fields() {
    let app = TestApp::new().await;
    app.register("admin@example.com", "Ada").await;
    let teacher = app.instructor("teacher@example.com").await;
    app.published_course(&teacher, "Rust for Beginners", 0).await;

    let (status, body) = app.get("/api/courses?level=beginner&search=rust", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    let item = body["items"][0].as_object().unwrap();
    let mut keys: Vec<&str> = item.keys().map(String::as_str).collect();
    keys.sort_unstable();
    let mut expected = vec![
        "id",
        "title",
        "slug",
        "description",
        "thumbnail",
        "price_cents",
        "category",
        "level",
        "instructor",
        "lesson_count",
        "enrollment_count",
        "created_at",
    ];
    expected.sort_unstable();
    assert_eq!(keys, expected);
    assert_eq!(item["slug"], "rust-for-beginners");
    assert_eq!(item["instructor"]["name"], "Grace");
    assert_eq!(item["lesson_count"], 1);

    let (status, _) = app.get("/api/courses?level=wizard", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_free_enrollment_and_progress() {
    let app = TestApp::new().await;
    app.register("admin@example.com", "Ada").await;
    let teacher = app.instructor("teacher@example.com").await;
    let (course_id, lesson_id) = app.published_course(&teacher, "Free Course", 0).await;
    let student = app.register("student@example.com", "Sam").await;

    let (status, _) = app
        .get(
            &format!("/api/courses/{}/lessons/{}", course_id, lesson_id),
            Some(&student),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(&format!("/api/courses/{}/enroll", course_id), Some(&student), json!({}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["enrolled"], true);

    let (status, lesson) = app
        .get(
            &format!("/api/courses/{}/lessons/{}", course_id, lesson_id),
            Some(&student),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lesson["content"], "First steps");

    let (status, progress) = app
        .post(&format!("/api/lessons/{}/complete", lesson_id), Some(&student), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress["percent"], 100);

    let (_, enrollments) = app.get("/api/enrollments", Some(&student)).await;
    assert_eq!(enrollments.as_array().unwrap().len(), 1);
    assert_eq!(enrollments[0]["course"]["id"], course_id);
    assert_eq!(enrollments[0]["progress"]["completed_lessons"], 1);

    let (_, stats) = app.get("/api/instructor/stats", Some(&teacher)).await;
    assert_eq!(stats["total_enrollments"], 1);
}

#[tokio::test]
async fn test_paid_course_checkout_flow() {
    let app = TestApp::new().await;
    let admin = app.register("admin@example.com", "Ada").await;
    let teacher = app.instructor("teacher@example.com").await;
    let (course_id, _) = app.published_course(&teacher, "Paid Course", 5000).await;
    let student = app.register("student@example.com", "Sam").await;

    let (status, _) = app
        .post(&format!("/api/courses/{}/enroll", course_id), Some(&student), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post(
            "/api/admin/coupons",
            Some(&admin),
            json!({ "code": "half", "discount_percent": 50 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, quote) = app.get("/api/coupons/HALF", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["discount_percent"], 50);

    let (status, cart) = app
        .post("/api/cart", Some(&student), json!({ "course_id": course_id }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["subtotal_cents"], 5000);

    let (status, order) = app
        .post("/api/checkout", Some(&student), json!({ "coupon_code": "HALF" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "checkout failed: {}", order);
    assert_eq!(order["status"], "pending");
    assert_eq!(order["total_cents"], 2500);

    let (_, cart) = app.get("/api/cart", Some(&student)).await;
    assert_eq!(cart["items"], json!([]));

    let order_uri = format!("/api/orders/{}/complete", order["id"]);
    let (status, _) = app.post(&order_uri, Some(&teacher), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, order) = app.post(&order_uri, Some(&student), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "completed");

    let (status, _) = app.post(&order_uri, Some(&student), json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, detail) = app
        .get(&format!("/api/courses/{}", course_id), Some(&student))
        .await;
    assert_eq!(detail["is_enrolled"], true);
}

#[tokio::test]
async fn test_cart_checks_out_once() {
    let app = TestApp::new().await;
    app.register("admin@example.com", "Ada").await;
    let teacher = app.instructor("teacher@example.com").await;
    let (course_id, _) = app.published_course(&teacher, "Paid Course", 5000).await;
    let student = app.register("student@example.com", "Sam").await;

    app.post("/api/cart", Some(&student), json!({ "course_id": course_id }))
        .await;
    let (status, _) = app.post("/api/checkout", Some(&student), json!({})).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.post("/api/checkout", Some(&student), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (_, orders) = app.get("/api/orders", Some(&student)).await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_single_use_coupon_redeems_once() {
    let app = TestApp::new().await;
    let admin = app.register("admin@example.com", "Ada").await;
    let teacher = app.instructor("teacher@example.com").await;
    let (course_id, _) = app.published_course(&teacher, "Paid Course", 1000).await;
    let first = app.register("first@example.com", "Fay").await;
    let second = app.register("second@example.com", "Sid").await;

    let (status, coupon) = app
        .post(
            "/api/admin/coupons",
            Some(&admin),
            json!({ "code": "ONCE", "discount_percent": 50, "max_uses": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let mut orders = Vec::new();
    for buyer in [&first, &second] {
        app.post("/api/cart", Some(buyer), json!({ "course_id": course_id }))
            .await;
        let (status, order) = app
            .post("/api/checkout", Some(buyer), json!({ "coupon_code": "ONCE" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        orders.push(order["id"].clone());
    }

    let (status, _) = app
        .post(&format!("/api/orders/{}/complete", orders[0]), Some(&first), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post(&format!("/api/orders/{}/complete", orders[1]), Some(&second), json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let coupon_id = coupon["id"].as_i64().unwrap();
    assert_eq!(
        app.count("SELECT used_count FROM coupons WHERE id = ?", coupon_id).await,
        1
    );
}

#[tokio::test]
async fn test_wishlist_toggles() {
    let app = TestApp::new().await;
    app.register("admin@example.com", "Ada").await;
    let teacher = app.instructor("teacher@example.com").await;
    let (course_id, _) = app.published_course(&teacher, "Wishful", 1000).await;
    let student = app.register("student@example.com", "Sam").await;

    let (_, state) = app
        .post("/api/wishlist", Some(&student), json!({ "course_id": course_id }))
        .await;
    assert_eq!(state["wishlisted"], true);
    let (_, list) = app.get("/api/wishlist", Some(&student)).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (_, state) = app
        .post("/api/wishlist", Some(&student), json!({ "course_id": course_id }))
        .await;
    assert_eq!(state["wishlisted"], false);
    let (_, list) = app.get("/api/wishlist", Some(&student)).await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn test_like_twice_toggles_off() {
    let app = TestApp::new().await;
    let author = app.register("admin@example.com", "Ada").await;
    let reader = app.register("reader@example.com", "Rita").await;
    let post_id = app.published_post(&author, "Toggle me").await;
    let like_uri = format!("/api/blog/{}/like", post_id);

    let (status, state) = app.post(&like_uri, Some(&reader), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state, json!({ "liked": true, "like_count": 1 }));

    let (_, detail) = app.get(&format!("/api/blog/{}", post_id), Some(&reader)).await;
    assert_eq!(detail["liked"], true);

    let (_, state) = app.post(&like_uri, Some(&reader), json!({})).await;
    assert_eq!(state, json!({ "liked": false, "like_count": 0 }));

    let likes = app
        .count("SELECT COUNT(*) FROM blog_likes WHERE blog_id = ?", post_id)
        .await;
    assert_eq!(likes, 0);

    let (_, detail) = app.get(&format!("/api/blog/{}", post_id), Some(&reader)).await;
    assert_eq!(detail["liked"], false);
    assert_eq!(detail["like_count"], 0);
}

#[tokio::test]
async fn test_delete_post_removes_comments_and_likes() {
    let app = TestApp::new().await;
    let author = app.register("admin@example.com", "Ada").await;
    let reader = app.register("reader@example.com", "Rita").await;
    let post_id = app.published_post(&author, "Short lived").await;

    let (status, comment) = app
        .post(
            &format!("/api/blog/{}/comments", post_id),
            Some(&reader),
            json!({ "content": "  Nice post  " }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(comment["content"], "Nice post");
    app.post(&format!("/api/blog/{}/like", post_id), Some(&reader), json!({}))
        .await;

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/blog/{}", post_id), Some(&reader), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/blog/{}", post_id), Some(&author), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&format!("/api/blog/{}", post_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let comments = app
        .count("SELECT COUNT(*) FROM blog_comments WHERE blog_id = ?", post_id)
        .await;
    let likes = app
        .count("SELECT COUNT(*) FROM blog_likes WHERE blog_id = ?", post_id)
        .await;
    assert_eq!((comments, likes), (0, 0));
}

#[tokio::test]
async fn test_empty_search_returns_nothing() {
    let app = TestApp::new().await;
    let author = app.register("admin@example.com", "Ada").await;
    app.published_post(&author, "Searchable title").await;

    for uri in ["/api/blog/search", "/api/blog/search?q=", "/api/blog/search?q=%20%20"] {
        let (status, body) = app.get(uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]), "{}", uri);
    }

    let (_, body) = app.get("/api/blog/search?q=SEARCHABLE", None).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_views_and_trending() {
    let app = TestApp::new().await;
    let author = app.register("admin@example.com", "Ada").await;
    let quiet = app.published_post(&author, "Quiet").await;
    let busy = app.published_post(&author, "Busy").await;

    for _ in 0..3 {
        let (status, _) = app
            .post(&format!("/api/blog/{}/view", busy), None, json!({}))
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    let (_, detail) = app.get(&format!("/api/blog/{}", busy), None).await;
    assert_eq!(detail["view_count"], 3);

    let (_, trending) = app.get("/api/blog/trending?limit=2&days=7", None).await;
    assert_eq!(trending[0]["id"], busy);
    assert_eq!(trending[1]["id"], quiet);

    let (_, sorted) = app.get("/api/blog?sort=most_viewed", None).await;
    assert_eq!(sorted["items"][0]["id"], busy);
}

#[tokio::test]
async fn test_login_is_throttled_after_repeated_failures() {
    let app = TestApp::new().await;
    app.register("admin@example.com", "Ada").await;

    let bad = json!({ "email": "admin@example.com", "password": "wrong-password" });
    for _ in 0..5 {
        let (status, _) = app.post("/api/auth/login", None, bad.clone()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let good = json!({ "email": "admin@example.com", "password": "password123" });
    let (status, body) = app.post("/api/auth/login", None, good).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["error"]["code"], "RATE_LIMITED");
}

fn signed_request(secret_key: &[u8], body: &Value) -> Request<Body> {
    let payload = body.to_string();
    let id = "msg_test_1";
    let timestamp = chrono::Utc::now().timestamp().to_string();

    let mut mac = Hmac::<Sha256>::new_from_slice(secret_key).unwrap();
    mac.update(format!("{}.{}.{}", id, timestamp, payload).as_bytes());
    let signature = BASE64.encode(&mac.finalize().into_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/webhooks/auth")
        .header(header::CONTENT_TYPE, "application/json")
        .header("svix-id", id)
        .header("svix-timestamp", timestamp)
        .header("svix-signature", format!("v1,{}", signature))
        .body(Body::from(payload))
        .unwrap()
}

#[tokio::test]
async fn test_webhook_syncs_provider_users() {
    let key = b"super-secret-signing-key";
    let app = TestApp::with_auth(AuthConfig {
        webhook_secret: Some(format!("whsec_{}", BASE64.encode(key))),
        ..AuthConfig::default()
    })
    .await;

    let created = json!({
        "type": "user.created",
        "data": {
            "id": "user_2abc",
            "email_addresses": [{ "id": "idn_1", "email_address": "Ada@Example.com" }],
            "primary_email_address_id": "idn_1",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "public_metadata": { "role": "instructor" }
        }
    });
    let (status, outcome) = app.dispatch(signed_request(key, &created)).await;
    assert_eq!(status, StatusCode::OK, "webhook failed: {}", outcome);
    assert_eq!(outcome["result"], "upserted");

    let mut tampered = signed_request(key, &created);
    *tampered.body_mut() = Body::from(json!({ "type": "user.deleted" }).to_string());
    let (status, _) = app.dispatch(tampered).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut ancient = signed_request(key, &created);
    ancient.headers_mut().insert(
        "svix-timestamp",
        header::HeaderValue::from_static("-9223372036854775808"),
    );
    let (status, _) = app.dispatch(ancient).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let deleted = json!({ "type": "user.deleted", "data": { "id": "user_2abc" } });
    let (status, outcome) = app.dispatch(signed_request(key, &deleted)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome, json!({ "result": "deleted", "existed": true }));
}

#[tokio::test]
async fn test_webhook_rejects_unsigned_and_unconfigured() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post("/api/webhooks/auth", None, json!({ "type": "user.created" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, _) = app
        .dispatch(signed_request(b"any-key", &json!({ "type": "user.created" })))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}
