#[macro_use]
mod common;

use actix_web::test::{self, TestRequest};
use folio::models::{NewBlogPost, NewCodeSnippet};
use folio::models::SearchHit;

use common::body_string;

async fn seeded() -> (folio::AppState, tempfile::TempDir) {
    let (state, dir) = common::state().await;
    for (slug, published) in [("hello-world", true), ("secret-draft", false), ("rusty-tips", true)] {
        state
            .repo
            .create_post(NewBlogPost {
                title: format!("Title {slug}"),
                slug: slug.into(),
                content: "# Heading\n\nSome *markdown* <script>alert(1)</script>".into(),
                excerpt: None,
                tags: Some(if slug == "rusty-tips" { "rust, tips".into() } else { "misc".into() }),
                published,
            })
            .await
            .unwrap();
    }
    for (slug, published) in [("quicksort", true), ("hidden-snippet", false)] {
        state
            .repo
            .create_snippet(NewCodeSnippet {
                title: format!("Snippet {slug}"),
                slug: slug.into(),
                description: Some("a *useful* thing".into()),
                code: "fn main() { println!(\"<hi>\"); }".into(),
                language: Some("rust".into()),
                tags: None,
                file_path: None,
                published,
            })
            .await
            .unwrap();
    }
    (state, dir)
}

#[actix_web::test]
async fn home_shows_only_published_teasers() {
    let (state, _dir) = seeded().await;
    let app = init_app!(state);
    let resp = test::call_service(&app, TestRequest::get().uri("/").to_request()).await;
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().get("content-type").unwrap().to_str().unwrap().starts_with("text/html"));
    let html = body_string(resp).await;
    assert!(html.contains("Title hello-world"));
    assert!(html.contains("Snippet quicksort"));
    assert!(!html.contains("secret-draft"));
    assert!(!html.contains("hidden-snippet"));
}

#[actix_web::test]
async fn blog_detail_renders_markdown_and_escapes_raw_html() {
    let (state, _dir) = seeded().await;
    let app = init_app!(state);
    let resp = test::call_service(&app, TestRequest::get().uri("/blog/hello-world").to_request()).await;
    assert_eq!(resp.status(), 200);
    let html = body_string(resp).await;
    assert!(html.contains("<h1>Heading</h1>"), "{html}");
    assert!(html.contains("<em>markdown</em>"));
    assert!(!html.contains("<script>alert(1)</script>"));
}

#[actix_web::test]
async fn unpublished_and_unknown_slugs_are_404() {
    let (state, _dir) = seeded().await;
    let app = init_app!(state);
    for uri in ["/blog/secret-draft", "/blog/nope", "/code/hidden-snippet", "/code/nope"] {
        let resp = test::call_service(&app, TestRequest::get().uri(uri).to_request()).await;
        assert_eq!(resp.status(), 404, "{uri}");
        assert_eq!(body_string(resp).await, "Page introuvable");
    }
}

#[actix_web::test]
async fn blog_list_filters_by_search_and_tag() {
    let (state, _dir) = seeded().await;
    let app = init_app!(state);

    let html = body_string(test::call_service(&app, TestRequest::get().uri("/blog").to_request()).await).await;
    assert!(html.contains("Title hello-world") && html.contains("Title rusty-tips"));
    assert!(!html.contains("secret-draft"));

    let req = TestRequest::get().uri("/blog?search=RUSTY&tag=").to_request();
    let html = body_string(test::call_service(&app, req).await).await;
    assert!(html.contains("Title rusty-tips"));
    assert!(!html.contains("Title hello-world"));

    let req = TestRequest::get().uri("/blog?tag=misc").to_request();
    let html = body_string(test::call_service(&app, req).await).await;
    assert!(html.contains("Title hello-world"));
    assert!(!html.contains("Title rusty-tips"));
    assert!(!html.contains("Title secret-draft"));
}

#[actix_web::test]
async fn code_pages_escape_source() {
    let (state, _dir) = seeded().await;
    let app = init_app!(state);
    let html = body_string(test::call_service(&app, TestRequest::get().uri("/code").to_request()).await).await;
    assert!(html.contains("Snippet quicksort"));
    assert!(!html.contains("Snippet hidden-snippet"));

    let html = body_string(test::call_service(&app, TestRequest::get().uri("/code/quicksort").to_request()).await).await;
    assert!(html.contains("&lt;hi&gt;"));
    assert!(!html.contains("<hi>"));
    assert!(html.contains("language-rust"));
}

#[actix_web::test]
async fn search_api() {
    let (state, _dir) = seeded().await;
    let app = init_app!(state);

    let hits: Vec<SearchHit> =
        test::call_and_read_body_json(&app, TestRequest::get().uri("/api/search?q=title&type=blog").to_request()).await;
    let mut slugs: Vec<_> = hits.iter().map(|h| h.slug.as_str()).collect();
    slugs.sort();
    assert_eq!(slugs, vec!["hello-world", "rusty-tips"]);

    let hits: Vec<SearchHit> =
        test::call_and_read_body_json(&app, TestRequest::get().uri("/api/search?type=code").to_request()).await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].slug, "quicksort");

    for uri in ["/api/search?q=title&type=notes", "/api/search?q=title"] {
        let hits: Vec<SearchHit> = test::call_and_read_body_json(&app, TestRequest::get().uri(uri).to_request()).await;
        assert!(hits.is_empty(), "{uri}");
    }
}

#[actix_web::test]
async fn search_is_capped_at_five() {
    let (state, _dir) = common::state().await;
    for i in 0..8 {
        state
            .repo
            .create_post(NewBlogPost {
                title: format!("Many {i}"),
                slug: format!("many-{i}"),
                content: "x".into(),
                published: true,
                ..Default::default()
            })
            .await
            .unwrap();
    }
    let app = init_app!(state);
    let hits: Vec<SearchHit> =
        test::call_and_read_body_json(&app, TestRequest::get().uri("/api/search?q=many&type=blog").to_request()).await;
    assert_eq!(hits.len(), 5);
}

#[actix_web::test]
async fn openapi_document_lists_search() {
    let (state, _dir) = common::state().await;
    let app = init_app!(state);
    let doc: serde_json::Value =
        test::call_and_read_body_json(&app, TestRequest::get().uri("/api/openapi.json").to_request()).await;
    assert!(doc["paths"]["/api/search"]["get"].is_object());
}

#[actix_web::test]
async fn static_assets_are_embedded() {
    let (state, _dir) = common::state().await;
    let app = init_app!(state);

    let resp = test::call_service(&app, TestRequest::get().uri("/css/style.css").to_request()).await;
    assert_eq!(resp.status(), 200);
    assert!(resp.headers().get("content-type").unwrap().to_str().unwrap().starts_with("text/css"));

    let resp = test::call_service(&app, TestRequest::get().uri("/js/main.js").to_request()).await;
    assert_eq!(resp.status(), 200);

    let resp = test::call_service(&app, TestRequest::get().uri("/css/missing.css").to_request()).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn about_page_and_anonymous_nav() {
    let (state, _dir) = common::state().await;
    let app = init_app!(state);
    let resp = test::call_service(&app, TestRequest::get().uri("/about").to_request()).await;
    assert_eq!(resp.status(), 200);
    let html = body_string(resp).await;
    assert!(html.contains("href=\"/login\""));
    assert!(!html.contains("href=\"/admin\""));
}
