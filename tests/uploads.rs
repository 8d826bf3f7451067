#[macro_use]
mod common;

use actix_web::http::header;
use actix_web::test::{self, TestRequest};
use folio::models::{ListQuery, NewCodeSnippet};
use folio::upload::MAX_UPLOAD_BYTES;

use common::{body_string, location, multipart};

fn upload_request(cookie: &actix_web::cookie::Cookie<'static>, fields: &[(&str, &str)], file: Option<(&str, &[u8])>) -> TestRequest {
    let (content_type, body) = multipart(fields, file);
    TestRequest::post()
        .uri("/admin/code")
        .cookie(cookie.clone())
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
}

fn file_count(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[actix_web::test]
async fn snippet_with_attachment_is_stored_and_served() {
    let (state, dir) = common::state().await;
    let app = init_app!(state);
    let (cookie, csrf) = sign_in!(app);

    let fields = [
        ("_csrf", csrf.as_str()),
        ("id", ""),
        ("title", "Quicksort"),
        ("slug", "quicksort"),
        ("code", "fn sort() {}"),
        ("language", "rust"),
        ("published", "on"),
    ];
    let resp = test::call_service(&app, upload_request(&cookie, &fields, Some(("../sort.rs", b"<b>fn sort() {}</b>".as_slice()))).to_request()).await;
    assert_eq!(resp.status(), 302);
    assert_eq!(location(&resp), "/admin");

    let snippet = state.repo.published_snippet("quicksort").await.unwrap();
    let file_path = snippet.file_path.clone().expect("attachment recorded");
    assert!(file_path.starts_with("/uploads/") && file_path.ends_with("-sort.rs"), "{file_path}");
    assert_eq!(file_count(dir.path()), 1);

    let resp = test::call_service(&app, TestRequest::get().uri(&file_path).to_request()).await;
    assert_eq!(resp.status(), 200);
    let content_type = resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap().to_string();
    assert!(!content_type.contains("html"), "{content_type}");
    assert_eq!(resp.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
    assert_eq!(body_string(resp).await, "<b>fn sort() {}</b>");

    // editing without a new file keeps the attachment
    let id = snippet.id.to_string();
    let fields = [
        ("_csrf", csrf.as_str()),
        ("id", id.as_str()),
        ("title", "Quicksort v2"),
        ("slug", "quicksort"),
        ("code", "fn sort() { todo() }"),
        ("published", "on"),
    ];
    let resp = test::call_service(&app, upload_request(&cookie, &fields, Some(("", b"".as_slice()))).to_request()).await;
    assert_eq!(resp.status(), 302);
    let updated = state.repo.get_snippet(snippet.id).await.unwrap();
    assert_eq!(updated.title, "Quicksort v2");
    assert_eq!(updated.file_path.as_deref(), Some(file_path.as_str()));
    assert_eq!(updated.language, None);
    assert_eq!(file_count(dir.path()), 1);
}

#[actix_web::test]
async fn forged_token_writes_nothing() {
    let (state, dir) = common::state().await;
    let app = init_app!(state);
    let (cookie, _csrf) = sign_in!(app);

    let fields = [("_csrf", "forged"), ("title", "T"), ("slug", "t"), ("code", "x")];
    let resp = test::call_service(&app, upload_request(&cookie, &fields, Some(("evil.sh", b"rm -rf /".as_slice()))).to_request()).await;
    assert_eq!(resp.status(), 403);
    assert_eq!(file_count(dir.path()), 0);
    assert!(state.repo.list_snippets(&ListQuery::all()).await.unwrap().is_empty());
}

#[actix_web::test]
async fn invalid_snippet_is_rejected_before_saving_the_file() {
    let (state, dir) = common::state().await;
    let app = init_app!(state);
    let (cookie, csrf) = sign_in!(app);

    let fields = [("_csrf", csrf.as_str()), ("title", ""), ("slug", "no spaces"), ("code", "")];
    let resp = test::call_service(&app, upload_request(&cookie, &fields, Some(("a.rs", b"x".as_slice()))).to_request()).await;
    assert_eq!(resp.status(), 400);
    let body = body_string(resp).await;
    assert!(body.contains("Le titre est requis"), "{body}");
    assert!(body.contains("Le code est requis"), "{body}");
    assert_eq!(file_count(dir.path()), 0);

    // unknown id: nothing stored either
    let fields = [("_csrf", csrf.as_str()), ("id", "404"), ("title", "T"), ("slug", "t"), ("code", "x")];
    let resp = test::call_service(&app, upload_request(&cookie, &fields, Some(("a.rs", b"x".as_slice()))).to_request()).await;
    assert_eq!(resp.status(), 404);
    assert_eq!(file_count(dir.path()), 0);
}

#[actix_web::test]
async fn only_one_file_per_request() {
    let (state, dir) = common::state().await;
    let app = init_app!(state);
    let (cookie, csrf) = sign_in!(app);

    let (content_type, first) = multipart(
        &[("_csrf", csrf.as_str()), ("title", "T"), ("slug", "t"), ("code", "x")],
        Some(("one.rs", b"1".as_slice())),
    );
    // splice a second file part in front of the closing boundary
    let closing = b"------foliotestboundary--\r\n";
    let mut body = first[..first.len() - closing.len()].to_vec();
    body.extend_from_slice(
        b"------foliotestboundary\r\nContent-Disposition: form-data; name=\"file\"; filename=\"two.rs\"\r\n\r\n2\r\n",
    );
    body.extend_from_slice(closing);

    let req = TestRequest::post()
        .uri("/admin/code")
        .cookie(cookie.clone())
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert_eq!(file_count(dir.path()), 0);
}

#[actix_web::test]
async fn unknown_uploads_are_404() {
    let (state, _dir) = common::state().await;
    state
        .repo
        .create_snippet(NewCodeSnippet {
            title: "T".into(),
            slug: "t".into(),
            code: "x".into(),
            file_path: Some("/uploads/gone.rs".into()),
            published: true,
            ..Default::default()
        })
        .await
        .unwrap();
    let app = init_app!(state);
    for uri in ["/uploads/gone.rs", "/uploads/.env"] {
        let resp = test::call_service(&app, TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), 404, "{uri}");
    }
}

#[actix_web::test]
async fn failed_save_removes_the_new_upload() {
    let (state, dir) = common::state().await;
    let existing = state
        .repo
        .create_snippet(NewCodeSnippet { title: "T".into(), slug: "taken".into(), code: "x".into(), ..Default::default() })
        .await
        .unwrap();
    let other = state
        .repo
        .create_snippet(NewCodeSnippet { title: "O".into(), slug: "other".into(), code: "y".into(), ..Default::default() })
        .await
        .unwrap();
    let app = init_app!(state);
    let (cookie, csrf) = sign_in!(app);

    // create with a slug in use
    let fields = [("_csrf", csrf.as_str()), ("title", "T2"), ("slug", "taken"), ("code", "x")];
    let resp = test::call_service(&app, upload_request(&cookie, &fields, Some(("a.rs", b"x".as_slice()))).to_request()).await;
    assert_eq!(resp.status(), 409);
    assert_eq!(file_count(dir.path()), 0);

    // update onto another row's slug
    let id = other.id.to_string();
    let fields = [("_csrf", csrf.as_str()), ("id", id.as_str()), ("title", "O"), ("slug", "taken"), ("code", "y")];
    let resp = test::call_service(&app, upload_request(&cookie, &fields, Some(("b.rs", b"y".as_slice()))).to_request()).await;
    assert_eq!(resp.status(), 409);
    assert_eq!(file_count(dir.path()), 0);
    assert_eq!(state.repo.get_snippet(other.id).await.unwrap().file_path, None);
    assert_eq!(state.repo.get_snippet(existing.id).await.unwrap().file_path, None);
}

#[actix_web::test]
async fn upload_size_cap_is_ten_mebibytes() {
    let (state, dir) = common::state().await;
    let app = init_app!(state);
    let (cookie, csrf) = sign_in!(app);

    let too_big = vec![b'a'; MAX_UPLOAD_BYTES + 1];
    let fields = [("_csrf", csrf.as_str()), ("title", "Big"), ("slug", "big"), ("code", "x")];
    let resp = test::call_service(&app, upload_request(&cookie, &fields, Some(("big.txt", too_big.as_slice()))).to_request()).await;
    assert_eq!(resp.status(), 413);
    assert_eq!(file_count(dir.path()), 0);
    assert!(state.repo.list_snippets(&ListQuery::all()).await.unwrap().is_empty());

    let exact = vec![b'a'; MAX_UPLOAD_BYTES];
    let resp = test::call_service(&app, upload_request(&cookie, &fields, Some(("big.txt", exact.as_slice()))).to_request()).await;
    assert_eq!(resp.status(), 302);
    assert_eq!(file_count(dir.path()), 1);
    let saved = state.repo.list_snippets(&ListQuery::all()).await.unwrap().remove(0);
    assert!(saved.file_path.is_some());
}
