//! Standard response envelope helpers: `{ success, data, message }`.

use axum::{http::StatusCode, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct SuccessOne<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Serialize)]
pub struct SuccessMany<T> {
    pub success: bool,
    pub data: Vec<T>,
    pub meta: MetaCount,
}

#[derive(Serialize)]
pub struct MetaCount {
    pub count: u64,
}

#[derive(Serialize)]
pub struct SuccessMessage {
    pub success: bool,
    pub message: String,
}

pub fn created<T: Serialize>(data: T, message: &str) -> (StatusCode, Json<SuccessOne<T>>) {
    (
        StatusCode::CREATED,
        Json(SuccessOne {
            success: true,
            data,
            message: Some(message.to_string()),
        }),
    )
}

pub fn ok<T: Serialize>(data: T) -> (StatusCode, Json<SuccessOne<T>>) {
    (
        StatusCode::OK,
        Json(SuccessOne {
            success: true,
            data,
            message: None,
        }),
    )
}

pub fn ok_with_message<T: Serialize>(data: T, message: &str) -> (StatusCode, Json<SuccessOne<T>>) {
    (
        StatusCode::OK,
        Json(SuccessOne {
            success: true,
            data,
            message: Some(message.to_string()),
        }),
    )
}

pub fn ok_many<T: Serialize>(data: Vec<T>) -> (StatusCode, Json<SuccessMany<T>>) {
    let count = data.len() as u64;
    (
        StatusCode::OK,
        Json(SuccessMany {
            success: true,
            data,
            meta: MetaCount { count },
        }),
    )
}

pub fn ok_message(message: &str) -> (StatusCode, Json<SuccessMessage>) {
    (
        StatusCode::OK,
        Json(SuccessMessage {
            success: true,
            message: message.to_string(),
        }),
    )
}
