mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{settle, spawn_app};
use serde_json::json;

#[tokio::test]
async fn create_then_fetch_public_projection() {
    let app = spawn_app();
    let resp = app
        .json("POST", "/api/companies", json!({ "firma_adi": "Acme", "slug": "acme" }), true)
        .await;
    assert_eq!(resp.status, StatusCode::CREATED, "{}", resp.text());
    let body = resp.json();
    assert_eq!(body["success"], true);
    assert!(body["data"]["id"].as_i64().is_some());
    settle().await;

    let page = app.get_json("/acme").await;
    assert_eq!(page.status, StatusCode::OK);
    let v = page.json();
    assert_eq!(v["firma_adi"], "Acme");
    assert_eq!(v["slug"], "acme");
    assert_eq!(v["communication"], json!([]));
    assert_eq!(v["social_media"], json!([]));
    assert_eq!(v["bank_accounts"], json!([]));
    assert!(page.header(header::CACHE_CONTROL).unwrap().starts_with("public"));
}

#[tokio::test]
async fn duplicate_slug_is_a_conflict() {
    let app = spawn_app();
    app.create_company(json!({ "firma_adi": "Acme", "slug": "acme" })).await;
    let resp = app
        .json("POST", "/api/companies", json!({ "firma_adi": "Acme 2", "slug": "acme" }), true)
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.json()["success"], false);
}

#[tokio::test]
async fn derived_slug_gets_a_suffix_when_taken() {
    let app = spawn_app();
    app.create_company(json!({ "firma_adi": "Çınar Yapı" })).await;
    let resp = app.json("POST", "/api/companies", json!({ "firma_adi": "Çınar Yapı" }), true).await;
    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.json()["data"]["slug"], "cinar-yapi-2");
}

#[tokio::test]
async fn validation_errors_name_each_field() {
    let app = spawn_app();
    let resp = app
        .json(
            "POST",
            "/api/companies",
            json!({ "slug": "Bad Slug!", "communication": [{ "tip": "email", "deger": "nope" }] }),
            true,
        )
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    let details = &resp.json()["details"];
    assert_eq!(details["firma_adi"], "is required");
    assert!(details["slug"].is_string());
    assert_eq!(details["communication[0].deger"], "must be a valid email");
}

#[tokio::test]
async fn unauthenticated_writes_are_rejected_without_mutation() {
    let app = spawn_app();
    let id = app.create_company(json!({ "firma_adi": "Acme", "slug": "acme" })).await;

    let create = app.json("POST", "/api/companies", json!({ "firma_adi": "Intruder" }), false).await;
    assert_eq!(create.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        create.json(),
        json!({ "success": false, "error": "unauthorized", "message": "Unauthorized" })
    );

    let update = app
        .json("PUT", &format!("/api/companies/{}", id), json!({ "firma_adi": "Hacked" }), false)
        .await;
    assert_eq!(update.status, StatusCode::UNAUTHORIZED);

    let delete = app.delete(&format!("/api/companies?id={}", id), false).await;
    assert_eq!(delete.status, StatusCode::UNAUTHORIZED);

    let list = app.get("/api/companies").await.json();
    assert_eq!(list["meta"]["count"], 1);
    assert_eq!(list["data"][0]["firma_adi"], "Acme");
}

#[tokio::test]
async fn bad_session_token_is_unauthorized() {
    let app = spawn_app();
    let req = Request::post("/api/companies")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, "Bearer not-a-token")
        .body(Body::from(json!({ "firma_adi": "X" }).to_string()))
        .unwrap();
    assert_eq!(app.send(req).await.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn update_replaces_given_collections_and_keeps_the_rest() {
    let app = spawn_app();
    let id = app
        .create_company(json!({
            "firma_adi": "Acme",
            "slug": "acme",
            "yetkili_adi": "Ayşe",
            "communication": [{ "tip": "telefon", "deger": "0212 555 00 00" }],
            "social_media": [{ "platform": "linkedin", "url": "https://linkedin.com/company/acme" }]
        }))
        .await;

    let resp = app
        .json(
            "PUT",
            &format!("/api/companies/{}", id),
            json!({ "slug": "acme-new", "social_media": [] }),
            true,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());
    settle().await;

    let full = app.get(&format!("/api/companies/{}", id)).await.json();
    assert_eq!(full["data"]["slug"], "acme-new");
    assert_eq!(full["data"]["yetkili_adi"], "Ayşe");
    assert_eq!(full["data"]["communication"].as_array().unwrap().len(), 1);
    assert_eq!(full["data"]["social_media"], json!([]));

    assert_eq!(app.get_json("/acme").await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get_json("/acme-new").await.status, StatusCode::OK);
}

#[tokio::test]
async fn delete_cascades_children_and_frees_the_slug() {
    let app = spawn_app();
    let id = app
        .create_company(json!({
            "firma_adi": "Acme",
            "slug": "acme",
            "communication": [{ "tip": "email", "deger": "info@acme.test" }],
            "bank_accounts": [{
                "banka_adi": "Örnek Bankası",
                "accounts": [{ "iban": "TR33 0006 1005 1978 6457 8413 26" }]
            }]
        }))
        .await;
    assert_eq!(app.get("/acme").await.status, StatusCode::OK);

    let resp = app.delete(&format!("/api/companies/{}", id), true).await;
    assert_eq!(resp.status, StatusCode::OK);
    settle().await;

    assert_eq!(app.get(&format!("/api/companies/{}", id)).await.status, StatusCode::NOT_FOUND);
    assert_eq!(app.get("/acme").await.status, StatusCode::NOT_FOUND);

    // same slug again starts from empty collections
    let again = app.create_company(json!({ "firma_adi": "Acme", "slug": "acme" })).await;
    let v = app.get(&format!("/api/companies/{}", again)).await.json();
    assert_eq!(v["data"]["communication"], json!([]));
    assert_eq!(v["data"]["bank_accounts"], json!([]));
}

#[tokio::test]
async fn list_filters_by_search_term() {
    let app = spawn_app();
    app.create_company(json!({ "firma_adi": "Acme" })).await;
    app.create_company(json!({ "firma_adi": "Beta Ltd" })).await;
    let v = app.get("/api/companies?search=beta").await.json();
    assert_eq!(v["meta"]["count"], 1);
    assert_eq!(v["data"][0]["slug"], "beta-ltd");
}

fn multipart(parts: &[(&str, &str, &[u8])]) -> (String, Vec<u8>) {
    let boundary = "kartvizit-test-boundary";
    let mut body = Vec::new();
    for (name, content_type, bytes) in parts {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{name}.bin\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

#[tokio::test]
async fn file_upload_stores_locally_and_updates_the_company() {
    let app = spawn_app();
    let id = app.create_company(json!({ "firma_adi": "Acme", "slug": "acme" })).await;
    let (content_type, body) = multipart(&[
        ("firma_logo", "image/png", b"\x89PNG fake".as_slice()),
        ("ignored", "text/plain", b"x".as_slice()),
    ]);
    let req = Request::post(format!("/api/companies/{}/files", id))
        .header(header::CONTENT_TYPE, content_type)
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token))
        .body(Body::from(body))
        .unwrap();
    let resp = app.send(req).await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());
    let url = resp.json()["data"]["uploaded"]["firma_logo"].as_str().unwrap().to_string();
    assert!(url.starts_with(&format!("/uploads/{}/firma_logo-", id)));
    assert!(url.ends_with(".png"));

    let file = app.get(&url).await;
    assert_eq!(file.status, StatusCode::OK);
    assert_eq!(file.body, b"\x89PNG fake");

    let v = app.get(&format!("/api/companies/{}", id)).await.json();
    assert_eq!(v["data"]["firma_logo"], url);
}

#[tokio::test]
async fn wrong_file_type_is_rejected() {
    let app = spawn_app();
    let id = app.create_company(json!({ "firma_adi": "Acme", "slug": "acme" })).await;
    let (content_type, body) = multipart(&[("katalog", "image/png", b"png".as_slice())]);
    let req = Request::post(format!("/api/companies/{}/files", id))
        .header(header::CONTENT_TYPE, content_type)
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token))
        .body(Body::from(body))
        .unwrap();
    let resp = app.send(req).await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.json()["details"]["katalog"], "must be a PDF document");
}

#[tokio::test]
async fn derived_slugs_from_long_names_stay_within_the_limit() {
    let app = spawn_app();
    let name = "a".repeat(150);
    let first = app.create_company(json!({ "firma_adi": name })).await;
    let second = app.json("POST", "/api/companies", json!({ "firma_adi": name }), true).await;
    assert_eq!(second.status, StatusCode::CREATED, "{}", second.text());
    let slug = second.json()["data"]["slug"].as_str().unwrap().to_string();
    assert!(slug.len() <= 100, "slug has {} characters", slug.len());
    assert!(slug.ends_with("-2"));

    // the suffixed slug is accepted when saved back unchanged
    let id = second.json()["data"]["id"].as_i64().unwrap();
    let resave = app
        .json("PUT", &format!("/api/companies/{}", id), json!({ "slug": slug }), true)
        .await;
    assert_eq!(resave.status, StatusCode::OK, "{}", resave.text());
    assert_ne!(first, id);
}

async fn upload_logo(app: &common::TestApp, id: i64) -> String {
    let (content_type, body) = multipart(&[("firma_logo", "image/png", b"\x89PNG shared".as_slice())]);
    let req = Request::post(format!("/api/companies/{}/files", id))
        .header(header::CONTENT_TYPE, content_type)
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token))
        .body(Body::from(body))
        .unwrap();
    let resp = app.send(req).await;
    assert_eq!(resp.status, StatusCode::OK, "{}", resp.text());
    resp.json()["data"]["uploaded"]["firma_logo"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn cleanup_never_touches_another_companys_files() {
    let app = spawn_app();
    let a = app.create_company(json!({ "firma_adi": "Acme", "slug": "acme" })).await;
    let logo = upload_logo(&app, a).await;

    // b reuses a's logo by URL
    let b = app
        .create_company(json!({ "firma_adi": "Beta", "slug": "beta", "firma_logo": logo }))
        .await;

    // replacing b's logo keeps a's file
    let own = upload_logo(&app, b).await;
    assert_ne!(own, logo);
    settle().await;
    assert_eq!(app.get(&logo).await.status, StatusCode::OK);

    let resp = app.delete(&format!("/api/companies/{}", b), true).await;
    assert_eq!(resp.status, StatusCode::OK);
    settle().await;
    assert_eq!(app.get(&logo).await.status, StatusCode::OK);
    assert_eq!(app.get(&own).await.status, StatusCode::NOT_FOUND);
}
