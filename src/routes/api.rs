//! `/api` routes. Public reads, session-gated writes (the `AdminSession` extractor does the gating).

use crate::error::ErrorBody;
use crate::handlers::{auth, companies, content, inquiry, monitoring, public, templates};
use crate::state::AppState;
use crate::templates::TemplateMeta;
use axum::{
    routing::{get, post, put},
    Json, Router,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(title = "kartvizit", description = "Digital business card backend"),
    components(schemas(TemplateMeta, ErrorBody))
)]
pub struct ApiDoc;

async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/session", get(auth::session))
        .route(
            "/companies",
            get(companies::list)
                .post(companies::create)
                .delete(companies::delete_by_query),
        )
        .route(
            "/companies/:id",
            get(companies::read).put(companies::update).delete(companies::delete),
        )
        .route("/companies/:id/files", post(companies::upload_files))
        // static segment wins over `:kind`
        .route(
            "/settings/icon-order",
            get(content::get_icon_order).put(content::put_icon_order),
        )
        .route(
            "/settings/:kind",
            get(content::list)
                .post(content::create)
                .put(content::update)
                .delete(content::delete),
        )
        .route("/settings/:kind/order", put(content::reorder))
        .route("/templates", get(templates::list))
        .route("/templates/:id/preview", get(templates::preview))
        .route("/monitoring", get(monitoring::report).post(monitoring::push))
        .route("/packages/inquiry", post(inquiry::submit))
        .route("/content/:slug", get(public::content))
        .route("/qr-codes/:slug", get(public::qr_code))
        .route("/vcard/:slug", get(public::vcard))
        .route("/openapi.json", get(openapi))
}
