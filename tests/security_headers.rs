use actix_web::{test, web, App};
use folio::{config, SecurityHeaders};

async fn headers_for(security: SecurityHeaders, uri: &str) -> actix_web::http::header::HeaderMap {
    let dir = tempfile::tempdir().unwrap();
    let state = folio::AppState::in_memory(dir.path()).await.unwrap();
    let app = test::init_service(App::new().wrap(security).app_data(web::Data::new(state)).configure(config)).await;
    let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
    resp.headers().clone()
}

#[actix_web::test]
#[serial_test::serial]
async fn test_security_headers_present() {
    std::env::remove_var("ENABLE_HSTS");
    let headers = headers_for(SecurityHeaders::from_env(), "/").await;
    let csp = headers.get("content-security-policy").unwrap().to_str().unwrap();
    assert!(csp.contains("default-src 'self'"));
    assert!(csp.contains("frame-ancestors 'none'"));
    assert_eq!(headers.get("referrer-policy").unwrap(), "same-origin");
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert!(headers.get("strict-transport-security").is_none()); // not enabled
}

#[actix_web::test]
#[serial_test::serial]
async fn test_headers_on_error_and_redirect_responses() {
    std::env::remove_var("ENABLE_HSTS");
    for uri in ["/blog/missing", "/admin"] {
        let headers = headers_for(SecurityHeaders::from_env(), uri).await;
        assert_eq!(headers.get("x-frame-options").unwrap(), "DENY", "{uri}");
    }
}

#[actix_web::test]
#[serial_test::serial]
async fn test_hsts_enabled_via_builder() {
    let headers = headers_for(SecurityHeaders::from_env().with_hsts(true), "/").await;
    assert!(headers.get("strict-transport-security").is_some(), "HSTS header missing");
}

#[actix_web::test]
#[serial_test::serial]
async fn test_env_var_enables_hsts_without_builder_override() {
    std::env::set_var("ENABLE_HSTS", "1");
    let headers = headers_for(SecurityHeaders::from_env(), "/about").await;
    std::env::remove_var("ENABLE_HSTS");
    assert!(headers.get("strict-transport-security").is_some());
}

#[actix_web::test]
#[serial_test::serial]
async fn test_builder_can_disable_hsts_even_when_env_set() {
    std::env::set_var("ENABLE_HSTS", "true");
    let headers = headers_for(SecurityHeaders::from_env().with_hsts(false), "/about").await;
    std::env::remove_var("ENABLE_HSTS");
    assert!(headers.get("strict-transport-security").is_none());
}
