//! Content CRUD: validate the JSON body against the kind's rules, coerce to column types, call the repository.

use super::validation::RequestValidator;
use crate::config::{ContentEntity, ContentKind};
use crate::error::{AppError, ValidationErrors};
use crate::repository::ContentValues;
use crate::sql::PgBindValue;
use crate::state::AppState;
use serde_json::Value;
use std::collections::HashMap;

pub struct ContentService;

fn body_map(body: Value) -> Result<HashMap<String, Value>, AppError> {
    match body {
        Value::Object(map) => Ok(map.into_iter().collect()),
        _ => Err(AppError::BadRequest("body must be a JSON object".into())),
    }
}

/// Validated, typed values for the writable columns present in `body`. Unknown and server-managed keys are dropped.
pub fn coerce_values(entity: &ContentEntity, body: &HashMap<String, Value>, partial: bool) -> Result<ContentValues, AppError> {
    let mut errors = if partial {
        RequestValidator::validate_partial(body, &entity.validation)
    } else {
        RequestValidator::validate(body, &entity.validation)
    };
    let mut values = ContentValues::new();
    for c in entity.columns.iter().filter(|c| c.writable) {
        let Some(v) = body.get(c.name) else {
            continue;
        };
        if v.is_null() && !c.nullable {
            errors.add(c.name, "may not be null");
            continue;
        }
        match PgBindValue::for_column(c.ty, v) {
            Ok(bound) => values.push((c.name, bound)),
            Err(msg) => errors.add(c.name, msg),
        }
    }
    errors.into_result()?;
    Ok(values)
}

fn parse_id(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl ContentService {
    pub async fn list(state: &AppState, kind: ContentKind, include_inactive: bool) -> Result<Vec<Value>, AppError> {
        state.repo.list_content(kind, include_inactive).await
    }

    pub async fn get(state: &AppState, kind: ContentKind, id: i64) -> Result<Value, AppError> {
        state
            .repo
            .get_content(kind, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", kind.entity().label, id)))
    }

    pub async fn create(state: &AppState, kind: ContentKind, body: Value) -> Result<Value, AppError> {
        let entity = kind.entity();
        let body = body_map(body)?;
        let values = coerce_values(entity, &body, false)?;
        let row = state.repo.create_content(kind, &values).await?;
        tracing::info!(kind = entity.table_name, id = ?row.get("id"), "content created");
        Ok(row)
    }

    /// The id travels in the body (`{"id": 3, ...}`).
    pub async fn update(state: &AppState, kind: ContentKind, body: Value) -> Result<Value, AppError> {
        let entity = kind.entity();
        let mut body = body_map(body)?;
        let id = body
            .remove("id")
            .as_ref()
            .and_then(parse_id)
            .ok_or_else(|| AppError::field("id", "is required"))?;
        let values = coerce_values(entity, &body, true)?;
        if values.is_empty() {
            return Err(AppError::BadRequest("no updatable fields in body".into()));
        }
        let row = state
            .repo
            .update_content(kind, id, &values)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", entity.label, id)))?;
        tracing::info!(kind = entity.table_name, id, "content updated");
        Ok(row)
    }

    pub async fn delete(state: &AppState, kind: ContentKind, id: i64) -> Result<Value, AppError> {
        let entity = kind.entity();
        let row = state
            .repo
            .delete_content(kind, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", entity.label, id)))?;
        tracing::info!(kind = entity.table_name, id, "content deleted");
        Ok(row)
    }

    pub async fn reorder(state: &AppState, kind: ContentKind, ids: &[i64]) -> Result<(), AppError> {
        if ids.is_empty() {
            return Err(AppError::field("ids", "must not be empty"));
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = ids.iter().find(|id| !seen.insert(**id)) {
            let mut errors = ValidationErrors::new();
            errors.add("ids", format!("contains {} more than once", dup));
            return Err(AppError::Validation(errors));
        }
        state.repo.reorder_content(kind, ids).await?;
        tracing::info!(kind = kind.entity().table_name, count = ids.len(), "content reordered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(v: Value) -> HashMap<String, Value> {
        body_map(v).unwrap()
    }

    #[test]
    fn create_requires_rule_fields_and_drops_managed_keys() {
        let entity = ContentKind::Faqs.entity();
        let err = coerce_values(entity, &body(json!({ "answer": "x" })), false).unwrap_err();
        match err {
            AppError::Validation(e) => assert_eq!(e.get("question"), Some("is required")),
            other => panic!("unexpected {other:?}"),
        }
        let values = coerce_values(
            entity,
            &body(json!({ "question": "Q?", "answer": "A", "id": 99, "created_at": "x", "extra": 1 })),
            false,
        )
        .unwrap();
        let names: Vec<&str> = values.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["question", "answer"]);
    }

    #[test]
    fn coerces_types_and_rejects_null_on_required_columns() {
        let entity = ContentKind::Packages.entity();
        let values = coerce_values(entity, &body(json!({ "price": "149.90", "highlighted": "true" })), true).unwrap();
        assert!(values.contains(&("price", PgBindValue::F64(149.9))));
        assert!(values.contains(&("highlighted", PgBindValue::Bool(true))));

        let err = coerce_values(entity, &body(json!({ "active": null, "price": [1] })), true).unwrap_err();
        match err {
            AppError::Validation(e) => {
                assert_eq!(e.get("active"), Some("may not be null"));
                assert_eq!(e.get("price"), Some("must be a number"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn ids_parse_from_numbers_and_strings() {
        assert_eq!(parse_id(&json!(7)), Some(7));
        assert_eq!(parse_id(&json!(" 8 ")), Some(8));
        assert_eq!(parse_id(&json!(true)), None);
    }
}
