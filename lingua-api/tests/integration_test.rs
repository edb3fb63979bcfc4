/// Integration tests for the Lingua API
///
/// Each test builds a fresh app over the in-memory store and drives it through
/// the router, so middleware, extractors and the error envelope are exercised
/// exactly as in production.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{course_with_schedule, test_config, TestContext, PASSWORD, WEBHOOK_SECRET};
use lingua_shared::auth::identity::ProviderProfile;
use lingua_shared::models::user::UserRole;
use lingua_shared::payments::{signature_header, SIGNATURE_HEADER};
use serde_json::json;

fn webhook_request(body: &serde_json::Value, secret: &str) -> Request<Body> {
    let raw = body.to_string();
    let header = signature_header(secret, chrono::Utc::now().timestamp(), raw.as_bytes());
    Request::builder()
        .method("POST")
        .uri("/api/webhooks/payments")
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, header)
        .body(Body::from(raw))
        .unwrap()
}

fn checkout_event(event_id: &str, enrollment_id: &str) -> serde_json::Value {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "data": { "enrollment_id": enrollment_id }
    })
}

fn reset_token(body: &str) -> String {
    let start = body.find("token=").expect("reset link in email") + "token=".len();
    body[start..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let ctx = TestContext::new();

    let response = ctx.get("/health", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "healthy");
    assert_eq!(response.body["database"], "connected");
    assert_eq!(response.body["backend"], "memory");
    assert_eq!(response.header("x-content-type-options"), Some("nosniff"));
}

#[tokio::test]
async fn test_health_reports_unavailable_store() {
    let ctx = TestContext::new();
    ctx.store.set_unavailable(true);

    let response = ctx.get("/health", None).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "degraded");
    assert_eq!(response.body["database"], "disconnected");
}

#[tokio::test]
async fn test_register_sets_session_cookie() {
    let ctx = TestContext::new();

    let response = ctx
        .post(
            "/api/auth/register",
            None,
            json!({ "email": "Ana@Example.com", "password": "SecureP4ss", "name": "Ana" }),
        )
        .await;

    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["status"], "success");
    assert_eq!(response.body["message"], "Account created");
    assert_eq!(response.body["user"]["email"], "ana@example.com");
    assert_eq!(response.body["user"]["role"], "STUDENT");
    assert_eq!(response.body["redirect"], "/dashboard");

    let cookie = response.cookie("lingua_session").expect("session cookie");
    let raw = response.set_cookies().join("\n");
    assert!(raw.contains("HttpOnly"));
    assert!(raw.contains("SameSite=Lax"));

    // The cookie alone authenticates later requests
    let request = Request::builder()
        .uri("/api/auth/session")
        .header("cookie", cookie)
        .body(Body::empty())
        .unwrap();
    let session = ctx.call(request).await;
    assert_eq!(session.status, StatusCode::OK);
    assert_eq!(session.body["session"]["role"], "STUDENT");
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_weak_passwords() {
    let ctx = TestContext::new();
    ctx.user("taken@example.com", UserRole::Student).await;

    let duplicate = ctx
        .post(
            "/api/auth/register",
            None,
            json!({ "email": "taken@example.com", "password": "SecureP4ss" }),
        )
        .await;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(duplicate.body["status"], "error");

    let weak = ctx
        .post(
            "/api/auth/register",
            None,
            json!({ "email": "new@example.com", "password": "alllowercase" }),
        )
        .await;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);
    assert_eq!(weak.body["status"], "error");
    assert_eq!(weak.body["error"], "validation_error");
    assert_eq!(weak.body["details"][0]["field"], "password");
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let ctx = TestContext::new();
    ctx.user("ana@example.com", UserRole::Student).await;

    let unknown = ctx
        .post("/api/auth/login", None, json!({ "email": "nobody@example.com", "password": PASSWORD }))
        .await;
    let wrong = ctx
        .post("/api/auth/login", None, json!({ "email": "ana@example.com", "password": "Wrong1234" }))
        .await;

    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.body, wrong.body);
    assert!(unknown.cookie("lingua_session").is_none());
}

#[tokio::test]
async fn test_login_honours_safe_callback_only() {
    let ctx = TestContext::new();
    ctx.user("ana@example.com", UserRole::Student).await;

    let local = ctx
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "ana@example.com", "password": PASSWORD, "callbackUrl": "/dashboard/messages" }),
        )
        .await;
    assert_eq!(local.status, StatusCode::OK);
    assert_eq!(local.body["redirect"], "/dashboard/messages");

    let external = ctx
        .post(
            "/api/auth/login",
            None,
            json!({ "email": "ana@example.com", "password": PASSWORD, "callbackUrl": "https://evil.example" }),
        )
        .await;
    assert_eq!(external.body["redirect"], "/dashboard");
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let ctx = TestContext::new();

    let response = ctx.post("/api/auth/logout", None, json!({})).await;

    assert_eq!(response.status, StatusCode::OK);
    let raw = response.set_cookies().join("\n");
    assert!(raw.starts_with("lingua_session=;"));
    assert!(raw.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_refresh_session_carries_new_image() {
    let ctx = TestContext::new();
    let ana = ctx.user("ana@example.com", UserRole::Student).await;
    let token = ctx.token_for(&ana);

    let refreshed = ctx
        .post(
            "/api/auth/session",
            Some(&token),
            json!({ "image": "https://cdn.example/ana.png" }),
        )
        .await;
    assert_eq!(refreshed.status, StatusCode::OK);
    assert_eq!(refreshed.body["user"]["image"], "https://cdn.example/ana.png");

    let new_token = refreshed.body["token"].as_str().unwrap().to_string();
    let session = ctx.get("/api/auth/session", Some(&new_token)).await;
    assert_eq!(session.body["session"]["image"], "https://cdn.example/ana.png");
}

#[tokio::test]
async fn test_session_requires_authentication() {
    let ctx = TestContext::new();

    let anonymous = ctx.get("/api/auth/session", None).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let garbage = ctx.get("/api/auth/session", Some("not-a-jwt")).await;
    assert_eq!(garbage.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_guard_redirects_anonymous_to_login_with_callback() {
    let ctx = TestContext::new();

    let response = ctx.get("/dashboard/messages?tab=unread", None).await;

    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(
        response.header("location"),
        Some("/login?callbackUrl=%2Fdashboard%2Fmessages%3Ftab%3Dunread")
    );
}

#[tokio::test]
async fn test_guard_sends_signed_in_users_away_from_login() {
    let ctx = TestContext::new();
    let ana = ctx.user("ana@example.com", UserRole::Student).await;

    let response = ctx.get("/login", Some(&ctx.token_for(&ana))).await;

    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.header("location"), Some("/dashboard"));

    let anonymous = ctx.get("/login?callbackUrl=%2Fdashboard%2Fteacher", None).await;
    assert_eq!(anonymous.status, StatusCode::OK);
    assert_eq!(anonymous.body["callback_url"], "/dashboard/teacher");
    assert_eq!(anonymous.body["providers"], json!(["credentials"]));
}

#[tokio::test]
async fn test_guard_keeps_students_out_of_admin_area() {
    let ctx = TestContext::new();
    let student = ctx.user("ana@example.com", UserRole::Student).await;
    let admin = ctx.user("boss@example.com", UserRole::Admin).await;

    let denied = ctx.get("/dashboard/admin/students", Some(&ctx.token_for(&student))).await;
    assert_eq!(denied.status, StatusCode::SEE_OTHER);
    assert_eq!(denied.header("location"), Some("/dashboard"));

    let allowed = ctx.get("/dashboard/admin/students", Some(&ctx.token_for(&admin))).await;
    assert_eq!(allowed.status, StatusCode::OK);
    assert_eq!(allowed.header("cache-control"), Some("no-store"));
    assert_eq!(allowed.body["users"][0]["email"], "ana@example.com");
}

#[tokio::test]
async fn test_dashboard_home_depends_on_role() {
    let ctx = TestContext::new();
    let student = ctx.user("ana@example.com", UserRole::Student).await;
    let admin = ctx.user("boss@example.com", UserRole::Admin).await;

    let home = ctx.get("/dashboard", Some(&ctx.token_for(&student))).await;
    assert_eq!(home.status, StatusCode::OK);
    assert_eq!(home.header("cache-control"), Some("no-store"));
    assert_eq!(home.body["enrollments"], json!([]));
    assert!(home.body.get("stats").is_none());

    let admin_home = ctx.get("/dashboard", Some(&ctx.token_for(&admin))).await;
    assert_eq!(admin_home.body["stats"]["students"], 1);
    assert_eq!(admin_home.body["stats"]["pending_enrollments"], 0);
}

#[tokio::test]
async fn test_admin_enrollment_filter_rejects_unknown_status() {
    let ctx = TestContext::new();
    let admin = ctx.user("boss@example.com", UserRole::Admin).await;

    let response = ctx
        .get("/dashboard/admin/enrollments?status=REFUNDED", Some(&ctx.token_for(&admin)))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["status"], "error");
}

#[tokio::test]
async fn test_opening_same_conversation_twice_reuses_it() {
    let ctx = TestContext::new();
    let ana = ctx.user("ana@example.com", UserRole::Student).await;
    let ben = ctx.user("ben@example.com", UserRole::Teacher).await;
    let ana_token = ctx.token_for(&ana);

    let first = ctx
        .post(
            "/api/conversations",
            Some(&ana_token),
            json!({ "participant_ids": [ben.id], "content": "hi" }),
        )
        .await;
    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(first.body["created"], true);

    let second = ctx
        .post(
            "/api/conversations",
            Some(&ana_token),
            json!({ "participant_ids": [ben.id], "content": "hi again" }),
        )
        .await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.body["created"], false);
    assert_eq!(first.body["conversation_id"], second.body["conversation_id"]);

    let id = first.body["conversation_id"].as_str().unwrap();
    let thread = ctx
        .get(&format!("/api/conversations/{id}"), Some(&ctx.token_for(&ben)))
        .await;
    assert_eq!(thread.status, StatusCode::OK);

    let messages = thread.body["conversation"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["content"], "hi");
    assert_eq!(messages[1]["content"], "hi again");
    assert_eq!(ctx.store.conversation_count().await, 1);
}

#[tokio::test]
async fn test_outsider_cannot_post_or_read() {
    let ctx = TestContext::new();
    let ana = ctx.user("ana@example.com", UserRole::Student).await;
    let ben = ctx.user("ben@example.com", UserRole::Teacher).await;
    let cat = ctx.user("cat@example.com", UserRole::Student).await;
    let cat_token = ctx.token_for(&cat);

    let opened = ctx
        .post(
            "/api/conversations",
            Some(&ctx.token_for(&ana)),
            json!({ "participant_ids": [ben.id], "content": "hi" }),
        )
        .await;
    let id = opened.body["conversation_id"].as_str().unwrap().to_string();

    let post = ctx
        .post(
            &format!("/api/conversations/{id}/messages"),
            Some(&cat_token),
            json!({ "content": "let me in" }),
        )
        .await;
    assert_eq!(post.status, StatusCode::FORBIDDEN);
    assert_eq!(post.body["status"], "error");
    assert_eq!(ctx.store.message_count().await, 1);

    let read = ctx.get(&format!("/api/conversations/{id}"), Some(&cat_token)).await;
    assert_eq!(read.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_conversation_list_is_most_recent_first() {
    let ctx = TestContext::new();
    let ana = ctx.user("ana@example.com", UserRole::Student).await;
    let ben = ctx.user("ben@example.com", UserRole::Teacher).await;
    let cat = ctx.user("cat@example.com", UserRole::Teacher).await;
    let token = ctx.token_for(&ana);

    let with_ben = ctx
        .post("/api/conversations", Some(&token), json!({ "participant_ids": [ben.id], "content": "to ben" }))
        .await;
    let with_cat = ctx
        .post("/api/conversations", Some(&token), json!({ "participant_ids": [cat.id], "content": "to cat" }))
        .await;

    let listed = ctx.get("/api/conversations", Some(&token)).await;
    let ids: Vec<_> = listed.body["conversations"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].clone())
        .collect();
    assert_eq!(ids, vec![with_cat.body["conversation_id"].clone(), with_ben.body["conversation_id"].clone()]);

    let ben_id = with_ben.body["conversation_id"].as_str().unwrap();
    let reply = ctx
        .post(
            &format!("/api/conversations/{ben_id}/messages"),
            Some(&ctx.token_for(&ben)),
            json!({ "content": "hello back" }),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);

    let listed = ctx.get("/api/conversations", Some(&token)).await;
    let first = &listed.body["conversations"][0];
    assert_eq!(first["id"], with_ben.body["conversation_id"]);
    assert_eq!(first["last_message"]["content"], "hello back");
}

#[tokio::test]
async fn test_conversations_need_a_session_and_real_participants() {
    let ctx = TestContext::new();
    let ana = ctx.user("ana@example.com", UserRole::Student).await;

    let anonymous = ctx
        .post("/api/conversations", None, json!({ "participant_ids": [ana.id], "content": "hi" }))
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let ghost = ctx
        .post(
            "/api/conversations",
            Some(&ctx.token_for(&ana)),
            json!({ "participant_ids": [uuid::Uuid::new_v4()], "content": "hi" }),
        )
        .await;
    assert_eq!(ghost.status, StatusCode::NOT_FOUND);
    assert_eq!(ctx.store.conversation_count().await, 0);
}

#[tokio::test]
async fn test_password_reset_flow() {
    let ctx = TestContext::new();
    ctx.user("ana@example.com", UserRole::Student).await;

    let requested = ctx
        .post("/api/auth/password-reset", None, json!({ "email": "ana@example.com" }))
        .await;
    assert_eq!(requested.status, StatusCode::OK);

    let body = {
        let sent = ctx.mailer.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ana@example.com");
        assert!(sent[0].body.contains("https://lingua.test/reset-password?token="));
        sent[0].body.clone()
    };
    let token = reset_token(&body);

    let valid = ctx
        .get(&format!("/api/auth/password-reset/validate?token={token}"), None)
        .await;
    assert_eq!(valid.body["valid"], true);

    let weak = ctx
        .post(
            "/api/auth/password-reset/confirm",
            None,
            json!({ "token": token, "password": "short" }),
        )
        .await;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);

    let confirmed = ctx
        .post(
            "/api/auth/password-reset/confirm",
            None,
            json!({ "token": token, "password": "NewSecret9" }),
        )
        .await;
    assert_eq!(confirmed.status, StatusCode::OK);

    let reused = ctx
        .post(
            "/api/auth/password-reset/confirm",
            None,
            json!({ "token": token, "password": "Another99x" }),
        )
        .await;
    assert_eq!(reused.status, StatusCode::BAD_REQUEST);

    let old = ctx
        .post("/api/auth/login", None, json!({ "email": "ana@example.com", "password": PASSWORD }))
        .await;
    assert_eq!(old.status, StatusCode::UNAUTHORIZED);

    let new = ctx
        .post("/api/auth/login", None, json!({ "email": "ana@example.com", "password": "NewSecret9" }))
        .await;
    assert_eq!(new.status, StatusCode::OK);
}

#[tokio::test]
async fn test_password_reset_does_not_disclose_accounts() {
    let ctx = TestContext::new();
    ctx.user("ana@example.com", UserRole::Student).await;

    let known = ctx
        .post("/api/auth/password-reset", None, json!({ "email": "ana@example.com" }))
        .await;
    let unknown = ctx
        .post("/api/auth/password-reset", None, json!({ "email": "nobody@example.com" }))
        .await;

    assert_eq!(known.status, unknown.status);
    assert_eq!(known.body, unknown.body);
    assert_eq!(ctx.mailer.sent.lock().await.len(), 1);

    let invalid = ctx
        .get("/api/auth/password-reset/validate?token=doesnotexist", None)
        .await;
    assert_eq!(invalid.body["valid"], false);
}

#[tokio::test]
async fn test_enrollment_rules() {
    let ctx = TestContext::new();
    let admin = ctx.user("boss@example.com", UserRole::Admin).await;
    let teacher = ctx.user("ben@example.com", UserRole::Teacher).await;
    let student = ctx.user("ana@example.com", UserRole::Student).await;
    let (_, schedule_id) = course_with_schedule(&ctx, &ctx.token_for(&admin), "spanish-a1", 10).await;

    let by_teacher = ctx
        .post("/api/enrollments", Some(&ctx.token_for(&teacher)), json!({ "schedule_id": schedule_id }))
        .await;
    assert_eq!(by_teacher.status, StatusCode::FORBIDDEN);

    let token = ctx.token_for(&student);
    let enrolled = ctx
        .post("/api/enrollments", Some(&token), json!({ "schedule_id": schedule_id }))
        .await;
    assert_eq!(enrolled.status, StatusCode::CREATED);
    assert_eq!(enrolled.body["enrollment"]["payment_status"], "PENDING");

    let again = ctx
        .post("/api/enrollments", Some(&token), json!({ "schedule_id": schedule_id }))
        .await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    let mine = ctx.get("/api/enrollments", Some(&token)).await;
    assert_eq!(mine.body["enrollments"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_payment_webhook_is_idempotent() {
    let ctx = TestContext::new();
    let admin = ctx.user("boss@example.com", UserRole::Admin).await;
    let student = ctx.user("ana@example.com", UserRole::Student).await;
    let late = ctx.user("late@example.com", UserRole::Student).await;
    let (slug, schedule_id) = course_with_schedule(&ctx, &ctx.token_for(&admin), "french-b1", 1).await;

    let enrolled = ctx
        .post("/api/enrollments", Some(&ctx.token_for(&student)), json!({ "schedule_id": schedule_id }))
        .await;
    let enrollment_id = enrolled.body["enrollment"]["id"].as_str().unwrap().to_string();
    let event = checkout_event("evt_1", &enrollment_id);

    let applied = ctx.call(webhook_request(&event, WEBHOOK_SECRET)).await;
    assert_eq!(applied.status, StatusCode::OK);
    assert_eq!(applied.body["message"], "Payment recorded");

    let redelivered = ctx.call(webhook_request(&event, WEBHOOK_SECRET)).await;
    assert_eq!(redelivered.status, StatusCode::OK);
    assert_eq!(redelivered.body["message"], "Event already processed");

    let course = ctx.get(&format!("/api/courses/{slug}"), None).await;
    assert_eq!(course.body["course"]["schedules"][0]["current_students"], 1);

    let mine = ctx.get("/api/enrollments", Some(&ctx.token_for(&student))).await;
    assert_eq!(mine.body["enrollments"][0]["payment_status"], "PAID");

    let full = ctx
        .post("/api/enrollments", Some(&ctx.token_for(&late)), json!({ "schedule_id": schedule_id }))
        .await;
    assert_eq!(full.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_payment_webhook_rejections() {
    let ctx = TestContext::new();

    let unknown = ctx
        .call(webhook_request(&checkout_event("evt_2", &uuid::Uuid::new_v4().to_string()), WEBHOOK_SECRET))
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let forged = ctx
        .call(webhook_request(&checkout_event("evt_3", &uuid::Uuid::new_v4().to_string()), "whsec_wrong"))
        .await;
    assert_eq!(forged.status, StatusCode::BAD_REQUEST);
    assert_eq!(forged.body["status"], "error");

    let unsigned = ctx
        .post("/api/webhooks/payments", None, checkout_event("evt_4", "x"))
        .await;
    assert_eq!(unsigned.status, StatusCode::BAD_REQUEST);

    let ancient = Request::builder()
        .method("POST")
        .uri("/api/webhooks/payments")
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, "t=-9223372036854775000,v1=aa")
        .body(Body::from("{}"))
        .unwrap();
    let ancient = ctx.call(ancient).await;
    assert_eq!(ancient.status, StatusCode::BAD_REQUEST);
    assert_eq!(ancient.body["status"], "error");

    let other = ctx
        .call(webhook_request(&json!({ "id": "evt_5", "type": "invoice.created", "data": {} }), WEBHOOK_SECRET))
        .await;
    assert_eq!(other.status, StatusCode::OK);
    assert_eq!(other.body["message"], "Event ignored");
}

#[tokio::test]
async fn test_payment_webhook_without_secret_is_unavailable() {
    let ctx = TestContext::with_config(test_config(&[("PAYMENT_WEBHOOK_SECRET", "")]), None);

    let response = ctx
        .call(webhook_request(&checkout_event("evt_1", "x"), WEBHOOK_SECRET))
        .await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_contact_form_is_relayed() {
    let ctx = TestContext::new();

    let response = ctx
        .post(
            "/api/contact",
            None,
            json!({ "name": "Ana", "email": "ana@example.com", "message": "Do you teach Korean?" }),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, json!({ "status": "success", "message": "Thank you! We will get back to you soon." }));

    let newsletter = ctx
        .post("/api/newsletter", None, json!({ "email": "ana@example.com" }))
        .await;
    assert_eq!(newsletter.status, StatusCode::OK);

    let submissions = ctx.relay.submissions.lock().await;
    assert_eq!(submissions.len(), 2);
    assert_eq!(submissions[0].fields["message"], "Do you teach Korean?");
}

#[tokio::test]
async fn test_malformed_requests_get_error_envelope() {
    let ctx = TestContext::new();
    let admin = ctx.user("boss@example.com", UserRole::Admin).await;
    let token = ctx.token_for(&admin);

    for body in [json!({}), json!({ "mail": "x@example.com" }), json!({ "email": 42 })] {
        let response = ctx.post("/api/auth/password-reset", None, body.clone()).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(response.body["status"], "error");
        assert_eq!(response.body["error"], "bad_request");
        assert!(response.body["message"].is_string());
    }

    let not_json = Request::builder()
        .method("POST")
        .uri("/api/contact")
        .header("content-type", "text/plain")
        .body(Body::from("hello"))
        .unwrap();
    let not_json = ctx.call(not_json).await;
    assert_eq!(not_json.status, StatusCode::BAD_REQUEST);
    assert_eq!(not_json.body["status"], "error");

    let bad_id = ctx.get("/api/conversations/not-a-uuid", Some(&token)).await;
    assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_id.body["status"], "error");

    let bad_query = ctx.get("/dashboard/admin/students?limit=many", Some(&token)).await;
    assert_eq!(bad_query.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_query.body["status"], "error");
}

#[tokio::test]
async fn test_contact_form_validation_envelope() {
    let ctx = TestContext::new();

    let response = ctx
        .post("/api/contact", None, json!({ "name": "Ana", "email": "not-an-email", "message": "hi" }))
        .await;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["status"], "error");
    assert_eq!(response.body["error"], "validation_error");
    assert!(response.body["message"].is_string());
    assert!(ctx.relay.submissions.lock().await.is_empty());
}

#[tokio::test]
async fn test_public_forms_are_rate_limited_per_client() {
    let ctx = TestContext::with_config(test_config(&[("FORM_RATE_LIMIT_PER_MINUTE", "3")]), None);
    let body = json!({ "email": "ana@example.com" });

    let newsletter = |ip: &'static str| {
        Request::builder()
            .method("POST")
            .uri("/api/newsletter")
            .header("content-type", "application/json")
            .header("x-forwarded-for", ip)
            .body(Body::from(body.to_string()))
            .unwrap()
    };

    for _ in 0..3 {
        let ok = ctx.call(newsletter("203.0.113.7")).await;
        assert_eq!(ok.status, StatusCode::OK);
        assert_eq!(ok.header("x-ratelimit-limit"), Some("3"));
    }

    let limited = ctx.call(newsletter("203.0.113.7")).await;
    assert_eq!(limited.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(limited.body["status"], "error");
    assert!(limited.header("retry-after").is_some());

    let other_client = ctx.call(newsletter("198.51.100.4")).await;
    assert_eq!(other_client.status, StatusCode::OK);
}

#[tokio::test]
async fn test_admin_endpoints_require_admin() {
    let ctx = TestContext::new();
    let student = ctx.user("ana@example.com", UserRole::Student).await;
    let admin = ctx.user("boss@example.com", UserRole::Admin).await;
    let post = json!({
        "slug": "five-tips",
        "title": "Five tips",
        "excerpt": "Learn faster",
        "body": "Speak every day.",
        "published": true
    });

    let anonymous = ctx.post("/api/admin/posts", None, post.clone()).await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let denied = ctx.post("/api/admin/posts", Some(&ctx.token_for(&student)), post.clone()).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let created = ctx.post("/api/admin/posts", Some(&ctx.token_for(&admin)), post).await;
    assert_eq!(created.status, StatusCode::CREATED);

    let listed = ctx.get("/api/posts", None).await;
    assert_eq!(listed.body["posts"][0]["slug"], "five-tips");

    let teacher = ctx
        .post(
            "/api/admin/users",
            Some(&ctx.token_for(&admin)),
            json!({ "email": "ben@example.com", "name": "Ben", "role": "TEACHER", "languages": ["German"] }),
        )
        .await;
    assert_eq!(teacher.status, StatusCode::CREATED);

    let teachers = ctx
        .get("/dashboard/admin/teachers?q=ben", Some(&ctx.token_for(&admin)))
        .await;
    assert_eq!(teachers.body["users"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_google_sign_in_creates_student() {
    let ctx = TestContext::with_google(ProviderProfile {
        provider: "google".to_string(),
        email: "gina@gmail.com".to_string(),
        name: Some("Gina".to_string()),
        image: Some("https://lh3.example/gina.jpg".to_string()),
    });

    let start = ctx
        .get("/api/auth/oauth/google?callbackUrl=%2Fdashboard%2Fmessages", None)
        .await;
    assert_eq!(start.status, StatusCode::SEE_OTHER);
    let location = start.header("location").unwrap().to_string();
    assert!(location.starts_with("https://accounts.example/consent?state="));
    let state = location.rsplit('=').next().unwrap().to_string();
    let state_cookie = start.cookie("lingua_oauth_state").expect("state cookie");

    let callback = |state: &str, cookie: &str| {
        Request::builder()
            .uri(format!("/api/auth/oauth/google/callback?code=good-code&state={state}"))
            .header("cookie", cookie.to_string())
            .body(Body::empty())
            .unwrap()
    };

    let mismatch = ctx.call(callback("forged", &state_cookie)).await;
    assert_eq!(mismatch.status, StatusCode::BAD_REQUEST);

    let done = ctx.call(callback(&state, &state_cookie)).await;
    assert_eq!(done.status, StatusCode::SEE_OTHER);
    assert_eq!(done.header("location"), Some("/dashboard/messages"));
    let session_cookie = done.cookie("lingua_session").expect("session cookie");

    let request = Request::builder()
        .uri("/api/auth/session")
        .header("cookie", session_cookie)
        .body(Body::empty())
        .unwrap();
    let session = ctx.call(request).await;
    assert_eq!(session.body["session"]["role"], "STUDENT");
    assert_eq!(session.body["session"]["image"], "https://lh3.example/gina.jpg");

    let page = ctx.get("/login", None).await;
    assert_eq!(page.body["providers"], json!(["credentials", "google"]));
}

#[tokio::test]
async fn test_google_sign_in_unconfigured() {
    let ctx = TestContext::new();

    let response = ctx.get("/api/auth/oauth/google", None).await;

    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body["status"], "error");
}
