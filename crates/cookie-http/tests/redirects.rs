//! Client behaviour against a mock server.

use cookie_http::{CookieHttpClient, CookieJar, HttpError, HttpRequest, Method, TransportKind};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn url(server: &MockServer, path: &str) -> Url {
    Url::parse(&format!("{}{}", server.uri(), path)).unwrap()
}

#[tokio::test]
async fn test_set_cookie_is_sent_on_next_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/set"))
        .respond_with(ResponseTemplate::new(200).insert_header("Set-Cookie", "a=1"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/check"))
        .and(header("cookie", "a=1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;

    let client = CookieHttpClient::new().unwrap();
    let mut jar = CookieJar::new();

    client
        .do_request(&HttpRequest::get(url(&server, "/set")), &mut jar)
        .await
        .unwrap();
    let exchange = client
        .do_request(&HttpRequest::get(url(&server, "/check")), &mut jar)
        .await
        .unwrap();

    assert_eq!(exchange.status, 200);
    assert_eq!(exchange.text(), "ok");
}

#[tokio::test]
async fn test_do_request_does_not_follow_redirects() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/templates"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/auth"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = CookieHttpClient::new().unwrap();
    let mut jar = CookieJar::new();
    let exchange = client
        .do_request(&HttpRequest::get(url(&server, "/templates")), &mut jar)
        .await
        .unwrap();

    assert_eq!(exchange.status, 302);
    assert_eq!(exchange.location(), Some(url(&server, "/auth")));
}

#[tokio::test]
async fn test_303_after_post_continues_with_get() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(303).insert_header("Location", "/landing"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/landing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("landed"))
        .mount(&server)
        .await;

    let client = CookieHttpClient::new().unwrap();
    let mut jar = CookieJar::new();
    let request = HttpRequest::post_form(url(&server, "/login"), [("username", "alice")]);
    let exchange = client
        .do_request_follow_redirects(request, &mut jar)
        .await
        .unwrap();

    assert_eq!(exchange.method, Method::GET);
    assert_eq!(exchange.text(), "landed");
}

#[tokio::test]
async fn test_302_after_post_continues_with_get() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/landing"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/landing"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = CookieHttpClient::new().unwrap();
    let mut jar = CookieJar::new();
    let request = HttpRequest::post_form(url(&server, "/login"), [("username", "alice")]);
    let exchange = client
        .do_request_follow_redirects(request, &mut jar)
        .await
        .unwrap();

    assert_eq!(exchange.method, Method::GET);
    assert_eq!(exchange.status, 200);
}

#[tokio::test]
async fn test_307_preserves_method_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(307).insert_header("Location", "/login-again"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/login-again"))
        .and(body_string_contains("username=alice"))
        .respond_with(ResponseTemplate::new(200).set_body_string("posted"))
        .mount(&server)
        .await;

    let client = CookieHttpClient::new().unwrap();
    let mut jar = CookieJar::new();
    let request = HttpRequest::post_form(url(&server, "/login"), [("username", "alice")]);
    let exchange = client
        .do_request_follow_redirects(request, &mut jar)
        .await
        .unwrap();

    assert_eq!(exchange.method, Method::POST);
    assert_eq!(exchange.text(), "posted");
}

#[tokio::test]
async fn test_cookies_set_mid_chain_are_sent_on_later_hops() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/start"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "/broker")
                .insert_header("Set-Cookie", "AUTH_SESSION=s1; Path=/"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broker"))
        .and(header("cookie", "AUTH_SESSION=s1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("broker page"))
        .mount(&server)
        .await;

    let client = CookieHttpClient::new().unwrap();
    let mut jar = CookieJar::new();
    let exchange = client
        .do_request_follow_redirects(HttpRequest::get(url(&server, "/start")), &mut jar)
        .await
        .unwrap();

    assert_eq!(exchange.text(), "broker page");
    assert!(jar.find("AUTH_SESSION").is_some());
}

#[tokio::test]
async fn test_redirect_cap_is_enforced() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(ResponseTemplate::new(302).insert_header("Location", "/loop"))
        .mount(&server)
        .await;

    let client = CookieHttpClient::new().unwrap().with_max_redirects(3);
    let mut jar = CookieJar::new();
    let err = client
        .do_request_follow_redirects(HttpRequest::get(url(&server, "/loop")), &mut jar)
        .await
        .unwrap_err();

    assert!(matches!(err, HttpError::TooManyRedirects { limit: 3, .. }));
    let received = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 4);
}

#[tokio::test]
async fn test_redirect_without_location_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(302))
        .mount(&server)
        .await;

    let client = CookieHttpClient::new().unwrap();
    let mut jar = CookieJar::new();
    let err = client
        .do_request_follow_redirects(HttpRequest::get(url(&server, "/broken")), &mut jar)
        .await
        .unwrap_err();

    assert!(matches!(err, HttpError::MissingLocation { .. }));
}

#[tokio::test]
async fn test_error_status_rejects_without_merging_cookies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users/current"))
        .respond_with(
            ResponseTemplate::new(401)
                .insert_header("Set-Cookie", "b=2")
                .set_body_string("unauthorized"),
        )
        .mount(&server)
        .await;

    let client = CookieHttpClient::new().unwrap();
    let mut jar = CookieJar::new();
    let err = client
        .do_request(&HttpRequest::get(url(&server, "/users/current")), &mut jar)
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert_eq!(err.exchange().map(|e| e.text().into_owned()), Some("unauthorized".to_string()));
    assert!(jar.is_empty());
}

#[tokio::test]
async fn test_timeout_is_classified_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let client = CookieHttpClient::new().unwrap();
    let mut jar = CookieJar::new();
    let request = HttpRequest::get(url(&server, "/slow")).with_timeout(Duration::from_millis(50));
    let err = client.do_request(&request, &mut jar).await.unwrap_err();

    assert!(matches!(
        err,
        HttpError::Transport {
            kind: TransportKind::Timeout,
            ..
        }
    ));
    assert!(err.is_unreachable());
}

#[tokio::test]
async fn test_refused_connection_is_unreachable() {
    let client = CookieHttpClient::new().unwrap();
    let mut jar = CookieJar::new();
    let request = HttpRequest::get(Url::parse("http://127.0.0.1:9/users/current").unwrap())
        .with_timeout(Duration::from_secs(2));

    let err = client.do_request(&request, &mut jar).await.unwrap_err();
    assert!(err.is_unreachable());
}
