//! 集成测试：完整的登录流程
//!
//! 从请求登录链接、兑换链接到会话检查与登出，经由 `Auth` 组合根驱动。

use chrono::Duration;
use http::StatusCode;
use std::sync::Arc;
use url::Url;
use viv_auth::clock::ManualClock;
use viv_auth::security::cookie::{SESSION_COOKIE_NAME, cookie_value};
use viv_auth::{
    Auth, AuthConfig, GateOutcome, InMemoryMagicTokenRepository, InMemoryUserRepository,
    MemoryNotificationSender, ServiceAccount, SessionSecret, UserId,
};

const SECRET: &str = "integration-secret-0123456789abcdef";
const BASE_URL: &str = "https://acme.test";

struct TestApp {
    auth: Auth,
    users: InMemoryUserRepository,
    tokens: InMemoryMagicTokenRepository,
    sender: MemoryNotificationSender,
    clock: ManualClock,
}

fn app(config: AuthConfig) -> TestApp {
    let users = InMemoryUserRepository::new();
    let tokens = InMemoryMagicTokenRepository::new();
    let sender = MemoryNotificationSender::new();
    let clock = ManualClock::default();

    let auth = Auth::new(
        config.with_app_name("Acme").with_from_email("auth@acme.test"),
        SessionSecret::new(SECRET).unwrap(),
        Arc::new(users.clone()),
        Arc::new(tokens.clone()),
        Arc::new(sender.clone()),
        Arc::new(clock.clone()),
    )
    .unwrap();

    TestApp {
        auth,
        users,
        tokens,
        sender,
        clock,
    }
}

/// 从最近一封邮件中取出 token
fn last_token(sender: &MemoryNotificationSender) -> String {
    let url = Url::parse(&sender.last().unwrap().verification_url).unwrap();
    url.query_pairs()
        .find(|(k, _)| k == "token")
        .map(|(_, v)| v.into_owned())
        .unwrap()
}

/// 从 Set-Cookie 头中取出会话凭证
fn session_from(set_cookie: &str) -> String {
    let pair = set_cookie.split(';').next().unwrap();
    cookie_value(pair, SESSION_COOKIE_NAME).unwrap().to_string()
}

/// 测试完整的登录生命周期
#[tokio::test]
async fn test_full_login_lifecycle() {
    let app = app(AuthConfig::default());

    // 请求登录链接
    let reply = app.auth.login("a@x.com", Some(BASE_URL)).await;
    assert_eq!(reply.status, StatusCode::OK);

    let message = app.sender.last().unwrap();
    assert_eq!(message.to, "a@x.com");
    assert_eq!(message.subject(), "Sign in to Acme");
    assert!(message.text_body().contains("15 minutes"));

    // 兑换链接
    let reply = app.auth.verify(&last_token(&app.sender)).await;
    assert_eq!(reply.status, StatusCode::SEE_OTHER);
    assert_eq!(reply.location.as_deref(), Some("/"));
    let set_cookie = reply.set_cookie.unwrap();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Max-Age=604800"));

    // 会话检查
    let cookie_header = format!("theme=dark; viv_session={}", session_from(&set_cookie));
    let user = app
        .auth
        .require_user("/dashboard", Some(&cookie_header), None)
        .await
        .unwrap();
    assert_eq!(user.email, "a@x.com");

    // 登出只清除 cookie
    let reply = app.auth.logout();
    assert_eq!(reply.location.as_deref(), Some("/auth/login"));
    assert!(reply.set_cookie.unwrap().contains("Max-Age=0"));

    // 旧凭证在过期前依然有效
    assert!(
        app.auth
            .require_user("/dashboard", Some(&cookie_header), None)
            .await
            .is_ok()
    );
}

/// 测试链接过期
#[tokio::test]
async fn test_expired_link() {
    let app = app(AuthConfig::default().with_token_expiry_minutes(15));

    app.auth.login("a@x.com", Some(BASE_URL)).await;
    let token = last_token(&app.sender);

    app.clock.advance(Duration::minutes(16));
    let reply = app.auth.verify(&token).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body, Some(serde_json::json!({ "error": "expired" })));
    assert!(reply.set_cookie.is_none());
}

/// 测试链接只能使用一次
#[tokio::test]
async fn test_link_redeemed_twice() {
    let app = app(AuthConfig::default());

    app.auth.login("a@x.com", Some(BASE_URL)).await;
    let token = last_token(&app.sender);

    assert_eq!(app.auth.verify(&token).await.status, StatusCode::SEE_OTHER);

    let reply = app.auth.verify(&token).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body, Some(serde_json::json!({ "error": "used" })));
}

/// 测试未知 token
#[tokio::test]
async fn test_unknown_link() {
    let app = app(AuthConfig::default());

    let reply = app.auth.verify("no-such-token").await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body, Some(serde_json::json!({ "error": "invalid" })));
}

/// 测试会话过期
#[tokio::test]
async fn test_session_expiry() {
    let app = app(AuthConfig::default().with_session_max_age_seconds(3600));

    app.auth.login("a@x.com", Some(BASE_URL)).await;
    let reply = app.auth.verify(&last_token(&app.sender)).await;
    let credential = session_from(&reply.set_cookie.unwrap());

    app.clock.advance(Duration::seconds(3600));
    let outcome = app.auth.gate().authenticate(Some(&credential), None).await.unwrap();
    assert!(outcome.is_authenticated());

    app.clock.advance(Duration::seconds(1));
    let outcome = app.auth.gate().authenticate(Some(&credential), None).await.unwrap();
    assert_eq!(outcome, GateOutcome::Unauthenticated);
}

/// 测试垃圾凭证
#[tokio::test]
async fn test_garbage_credential() {
    let app = app(AuthConfig::default());

    for header in [
        "viv_session=garbage",
        "viv_session=a.b.c",
        "viv_session=...",
        "viv_session",
        ";;;",
    ] {
        let reply = app
            .auth
            .require_user("/api/items", Some(header), None)
            .await
            .unwrap_err();
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            reply.body,
            Some(serde_json::json!({ "detail": "Not authenticated" }))
        );
    }
}

/// 测试账户停用
#[tokio::test]
async fn test_inactive_account() {
    let app = app(AuthConfig::default().with_require_active(true));

    app.auth.login("a@x.com", Some(BASE_URL)).await;
    let token = last_token(&app.sender);

    app.users.set_active(&UserId::from(1u64), false).unwrap();

    let reply = app.auth.verify(&token).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert!(reply.set_cookie.is_none());

    // token 已被消耗
    app.users.set_active(&UserId::from(1u64), true).unwrap();
    let reply = app.auth.verify(&token).await;
    assert_eq!(reply.body, Some(serde_json::json!({ "error": "used" })));
}

/// 测试关闭自助注册
#[tokio::test]
async fn test_signup_disabled() {
    let app = app(AuthConfig::default().with_allow_signup(false));

    let reply = app.auth.login("new@x.com", Some(BASE_URL)).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        reply.body,
        Some(serde_json::json!({ "error": "account_not_found" }))
    );
    assert!(app.users.is_empty());
    assert!(app.sender.messages().is_empty());
}

/// 测试新老用户与发送失败得到相同响应
#[tokio::test]
async fn test_login_reply_does_not_leak_existence() {
    let app = app(AuthConfig::default());

    let new_user = app.auth.login("a@x.com", Some(BASE_URL)).await;
    let existing_user = app.auth.login("a@x.com", Some(BASE_URL)).await;

    app.sender.set_failing(true);
    let failed_send = app.auth.login("b@x.com", Some(BASE_URL)).await;

    assert_eq!(new_user, existing_user);
    assert_eq!(new_user, failed_send);
    assert_eq!(app.users.len(), 2);
}

/// 测试配置的 app_url 覆盖请求 URL
#[tokio::test]
async fn test_app_url_override() {
    let app = app(AuthConfig::default().with_app_url("https://public.acme.test/"));

    app.auth.login("a@x.com", Some("http://10.0.0.5:8000")).await;
    let url = app.sender.last().unwrap().verification_url;
    assert!(url.starts_with("https://public.acme.test/auth/verify?token="));
}

/// 测试缺少基础 URL 时不产生任何记录
#[tokio::test]
async fn test_login_without_base_url_leaves_no_records() {
    let app = app(AuthConfig::default());

    let reply = app.auth.login("a@x.com", None).await;
    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(app.users.is_empty());
    assert!(app.tokens.is_empty());
    assert!(app.sender.messages().is_empty());
}

/// 测试带查询串的 app_url 在启动时被拒绝
#[test]
fn test_app_url_with_query_rejected_at_startup() {
    let result = Auth::in_memory(
        AuthConfig::default().with_app_url("https://acme.test/?x=1"),
        SessionSecret::new(SECRET).unwrap(),
    );
    assert!(result.is_err());
}

/// 测试服务账号
#[tokio::test]
async fn test_service_account() {
    let token = "service-token-0123456789abcdef";
    let app = app(
        AuthConfig::default().with_service_account(ServiceAccount::new(token, 1u64).unwrap()),
    );

    // 预先创建系统用户
    app.auth.login("system@acme.test", Some(BASE_URL)).await;

    let user = app
        .auth
        .require_user("/api/items", None, Some(&format!("Bearer {}", token)))
        .await
        .unwrap();
    assert_eq!(user.email, "system@acme.test");

    let reply = app
        .auth
        .require_user("/api/items", None, Some("Bearer not-the-token"))
        .await
        .unwrap_err();
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
}

/// 测试不同密钥签出的凭证互不通用
#[tokio::test]
async fn test_credential_from_other_secret_rejected() {
    let app = app(AuthConfig::default());
    let other = Auth::in_memory(
        AuthConfig::default(),
        SessionSecret::new("another-secret-0123456789abcdef").unwrap(),
    )
    .unwrap();

    app.auth.login("a@x.com", Some(BASE_URL)).await;
    let foreign = other.codec().mint(&UserId::from(1u64)).unwrap();

    let outcome = app.auth.gate().authenticate(Some(&foreign), None).await.unwrap();
    assert_eq!(outcome, GateOutcome::Unauthenticated);
}
