mod common;

use axum::http::{header, StatusCode};
use common::{settle, spawn_app};
use serde_json::json;

#[tokio::test]
async fn qr_page_for_unknown_slug_is_json_404() {
    let app = spawn_app();
    let resp = app.get("/api/qr-codes/nobody").await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    let body = resp.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn qr_page_embeds_a_data_url_image() {
    let app = spawn_app();
    app.create_company(json!({ "firma_adi": "Acme", "slug": "acme", "template_id": 2 })).await;
    let resp = app.get("/api/qr-codes/acme").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.header(header::CONTENT_TYPE).unwrap().starts_with("text/html"));
    let html = resp.text();
    assert!(html.contains("<img src=\"data:image/svg+xml;base64,"));
    assert!(html.contains("theme-midnight"));
    assert!(html.contains("https://kartvizit.test/acme"));

    let svg = app.get("/api/qr-codes/acme?format=svg").await;
    assert_eq!(svg.header(header::CONTENT_TYPE), Some("image/svg+xml"));
    assert!(svg.text().contains("<svg"));
}

#[tokio::test]
async fn empty_optional_fields_drop_their_sections() {
    let app = spawn_app();
    app.create_company(json!({ "firma_adi": "Yalın Ltd", "slug": "yalin" })).await;
    let resp = app.get("/yalin").await;
    assert_eq!(resp.status, StatusCode::OK);
    let html = resp.text();
    let body = &html[html.find("<body").unwrap()..];
    assert!(body.contains("Yalın Ltd"));
    assert!(!html.contains("{{"));
    assert!(!html.contains("}}"));
    for section in ["card-about", "card-banks", "card-tax", "card-social", "card-logo", "card-photo"] {
        assert!(!body.contains(section), "{section} should be omitted");
    }
}

#[tokio::test]
async fn full_card_renders_every_section() {
    let app = spawn_app();
    app.create_company(json!({
        "firma_adi": "Acme",
        "slug": "acme",
        "firma_hakkinda": "Biz <b>inşaat</b> yaparız.",
        "vergi_no": "1234567890",
        "communication": [
            { "tip": "telefon", "deger": "0212 555 00 00" },
            { "tip": "email", "deger": "info@acme.test", "aktif": false }
        ],
        "social_media": [{ "platform": "instagram", "url": "https://instagram.com/acme" }],
        "bank_accounts": [{ "banka_adi": "Örnek Bankası", "accounts": [{ "iban": "TR330006100519786457841326" }] }]
    }))
    .await;
    let html = app.get("/acme").await.text();
    let body = &html[html.find("<body").unwrap()..];
    assert!(body.contains("card-about"));
    assert!(body.contains("&lt;b&gt;inşaat&lt;/b&gt;"));
    assert!(body.contains("tel:02125550000") || body.contains("tel:+902125550000"));
    assert!(!body.contains("info@acme.test"));
    assert!(body.contains("TR33 0006 1005 1978 6457 8413 26"));

    let json = app.get_json("/acme").await.json();
    assert_eq!(json["communication"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn html_views_are_counted() {
    let app = spawn_app();
    let id = app.create_company(json!({ "firma_adi": "Acme", "slug": "acme" })).await;
    app.get("/acme").await;
    app.get("/acme").await;
    let v = app.get(&format!("/api/companies/{}", id)).await.json();
    assert_eq!(v["data"]["goruntulenme"], 2);
}

#[tokio::test]
async fn unknown_slug_is_json_404() {
    let app = spawn_app();
    let resp = app.get("/nobody").await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.json()["error"], "not_found");
}

#[tokio::test]
async fn vcard_download() {
    let app = spawn_app();
    app.create_company(json!({
        "firma_adi": "Acme",
        "slug": "acme",
        "yetkili_adi": "Ayşe Yılmaz",
        "communication": [{ "tip": "email", "deger": "info@acme.test" }]
    }))
    .await;
    let resp = app.get("/api/vcard/acme").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.header(header::CONTENT_TYPE), Some("text/vcard; charset=utf-8"));
    assert_eq!(
        resp.header(header::CONTENT_DISPOSITION),
        Some("attachment; filename=\"acme.vcf\"")
    );
    let text = resp.text();
    assert!(text.starts_with("BEGIN:VCARD"));
    assert!(text.contains("VERSION:3.0"));
    assert!(text.contains("info@acme.test"));
    assert!(text.contains("ORG:Acme"));
}

#[tokio::test]
async fn content_alias_serves_the_projection() {
    let app = spawn_app();
    app.create_company(json!({ "firma_adi": "Acme", "slug": "acme" })).await;
    let v = app.get("/api/content/acme").await.json();
    assert_eq!(v["slug"], "acme");
    assert_eq!(app.get("/api/content/none").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn template_catalog_and_preview() {
    let app = spawn_app();
    let list = app.get("/api/templates").await.json();
    assert_eq!(list["meta"]["count"], 6);
    assert_eq!(list["data"][0]["id"], 1);

    let preview = app.get("/api/templates/3/preview").await;
    assert_eq!(preview.status, StatusCode::OK);
    assert!(preview.text().contains("theme-minimal"));
    assert_eq!(app.get("/api/templates/99/preview").await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn post_processing_stores_the_qr_code() {
    let app = spawn_app();
    let id = app.create_company(json!({ "firma_adi": "Acme", "slug": "acme" })).await;
    settle().await;
    let company = app.state.repo.get_company(id).await.unwrap().unwrap();
    assert!(company
        .record
        .qr_code_data
        .as_deref()
        .unwrap()
        .starts_with("data:image/svg+xml;base64,"));
}
