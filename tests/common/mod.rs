#![allow(dead_code)]

use actix_web::body::MessageBody;
use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::http::header;

use folio::auth::ensure_default_admin;
use folio::session::SESSION_COOKIE;
use folio::AppState;

pub const ADMIN_USER: &str = folio::auth::DEFAULT_ADMIN_USERNAME;
pub const ADMIN_PASSWORD: &str = folio::auth::DEFAULT_ADMIN_PASSWORD;

/// Fresh in-memory stores with the default admin seeded. Keep the TempDir
/// alive for as long as uploads are used.
pub async fn state() -> (AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::in_memory(dir.path()).await.unwrap();
    ensure_default_admin(state.repo.as_ref()).await.unwrap();
    (state, dir)
}

pub fn session_cookie<B>(resp: &ServiceResponse<B>) -> Option<Cookie<'static>> {
    resp.response()
        .cookies()
        .find(|c| c.name() == SESSION_COOKIE)
        .map(|c| c.into_owned())
}

pub fn location<B>(resp: &ServiceResponse<B>) -> String {
    resp.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub async fn body_string<B: MessageBody>(resp: ServiceResponse<B>) -> String {
    String::from_utf8(actix_web::test::read_body(resp).await.to_vec()).unwrap()
}

/// Value of the first `_csrf` hidden input in a rendered page.
pub fn csrf_from(html: &str) -> String {
    let marker = r#"name="_csrf" value=""#;
    let start = html.find(marker).expect("page has a csrf field") + marker.len();
    let len = html[start..].find('"').unwrap();
    html[start..start + len].to_string()
}

/// Builds a multipart body from text fields and an optional `file` part.
pub fn multipart(fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> (String, Vec<u8>) {
    let boundary = "----foliotestboundary";
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes(),
        );
    }
    if let Some((filename, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

/// `test::init_service` over the full route table.
macro_rules! init_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap(folio::SecurityHeaders::default())
                .app_data(actix_web::web::Data::new($state.clone()))
                .configure(folio::config),
        )
        .await
    };
}

/// Logs in as the seeded admin; yields the session cookie and its CSRF token.
macro_rules! sign_in {
    ($app:expr) => {{
        use actix_web::test::{call_service, TestRequest};
        let resp = call_service(&$app, TestRequest::get().uri("/login").to_request()).await;
        let anon = crate::common::session_cookie(&resp).expect("anonymous session cookie");
        let csrf = crate::common::csrf_from(&crate::common::body_string(resp).await);
        let req = TestRequest::post()
            .uri("/login")
            .cookie(anon)
            .set_form([
                ("_csrf", csrf.as_str()),
                ("username", crate::common::ADMIN_USER),
                ("password", crate::common::ADMIN_PASSWORD),
            ])
            .to_request();
        let resp = call_service(&$app, req).await;
        assert_eq!(resp.status(), 302, "login should redirect");
        let cookie = crate::common::session_cookie(&resp).expect("session cookie");
        let resp = call_service(&$app, TestRequest::get().uri("/admin/blog/new").cookie(cookie.clone()).to_request()).await;
        assert_eq!(resp.status(), 200);
        let csrf = crate::common::csrf_from(&crate::common::body_string(resp).await);
        (cookie, csrf)
    }};
}
