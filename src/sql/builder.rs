//! Builds parameterized SELECT, INSERT, UPDATE, DELETE for content entities.

use crate::config::{ColumnType, ContentEntity};
use crate::sql::PgBindValue;

/// Quote identifier for PostgreSQL (safe: only from static descriptors and config).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<PgBindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    fn push_param(&mut self, v: PgBindValue) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }
}

/// SELECT list in descriptor order.
fn select_column_list(entity: &ContentEntity) -> String {
    entity
        .columns
        .iter()
        .map(|c| quoted(c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Placeholder with an explicit cast so typed NULLs and JSON bind correctly.
fn placeholder(n: u32, ty: ColumnType) -> String {
    format!("${}::{}", n, ty.pg_name())
}

/// SELECT all rows (or active rows only), ordered for display.
pub fn select_list(entity: &ContentEntity, schema: &str, include_inactive: bool) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity.table_name);
    let where_clause = if include_inactive {
        String::new()
    } else {
        format!(" WHERE {} = TRUE", quoted("active"))
    };
    q.sql = format!(
        "SELECT {} FROM {}{} ORDER BY {}, {}",
        select_column_list(entity),
        table,
        where_clause,
        quoted("display_order"),
        quoted("id")
    );
    q
}

/// SELECT by id. Caller binds id as $1.
pub fn select_by_id(entity: &ContentEntity, schema: &str, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity.table_name);
    q.push_param(PgBindValue::I64(id));
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = $1",
        select_column_list(entity),
        table,
        quoted("id")
    );
    q
}

/// INSERT from typed values. Omitted columns get their descriptor default; a missing
/// display_order becomes one past the current maximum.
pub fn insert(entity: &ContentEntity, schema: &str, values: &[(&str, PgBindValue)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity.table_name);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in entity.columns.iter().filter(|c| c.writable) {
        let given = values.iter().find(|(name, _)| *name == c.name).map(|(_, v)| v.clone());
        let val = match given {
            Some(v) => v,
            None if c.name == "display_order" => {
                cols.push(quoted(c.name));
                placeholders.push(format!(
                    "(SELECT COALESCE(MAX({}), -1) + 1 FROM {})",
                    quoted("display_order"),
                    table
                ));
                continue;
            }
            None => match &c.default {
                Some(d) => PgBindValue::for_column(c.ty, d).unwrap_or(PgBindValue::Null(c.ty)),
                None => PgBindValue::Null(c.ty),
            },
        };
        let n = q.push_param(val);
        cols.push(quoted(c.name));
        placeholders.push(placeholder(n, c.ty));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        table,
        cols.join(", "),
        placeholders.join(", "),
        select_column_list(entity)
    );
    q
}

/// UPDATE by id: SET only the given columns, always bumping updated_at.
pub fn update(entity: &ContentEntity, schema: &str, id: i64, values: &[(&str, PgBindValue)]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity.table_name);
    let mut sets = Vec::new();
    for (name, v) in values {
        let Some(c) = entity.column(name).filter(|c| c.writable) else { continue };
        let n = q.push_param(v.clone());
        sets.push(format!("{} = {}", quoted(c.name), placeholder(n, c.ty)));
    }
    sets.push(format!("{} = NOW()", quoted("updated_at")));
    let id_param = q.push_param(PgBindValue::I64(id));
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = ${} RETURNING {}",
        table,
        sets.join(", "),
        quoted("id"),
        id_param,
        select_column_list(entity)
    );
    q
}

/// DELETE by id.
pub fn delete(entity: &ContentEntity, schema: &str, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity.table_name);
    q.push_param(PgBindValue::I64(id));
    q.sql = format!(
        "DELETE FROM {} WHERE {} = $1 RETURNING {}",
        table,
        quoted("id"),
        select_column_list(entity)
    );
    q
}

/// Sets display_order for one id. Executed once per id inside a transaction.
pub fn set_display_order(entity: &ContentEntity, schema: &str, id: i64, order: i32) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = qualified_table(schema, entity.table_name);
    q.push_param(PgBindValue::I32(order));
    q.push_param(PgBindValue::I64(id));
    q.sql = format!(
        "UPDATE {} SET {} = $1, {} = NOW() WHERE {} = $2",
        table,
        quoted("display_order"),
        quoted("updated_at"),
        quoted("id")
    );
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContentKind;

    #[test]
    fn public_list_filters_active_and_orders_for_display() {
        let q = select_list(ContentKind::Faqs.entity(), "kartvizit", false);
        assert!(q.sql.starts_with("SELECT \"id\", \"question\""));
        assert!(q.sql.contains("FROM \"kartvizit\".\"faqs\" WHERE \"active\" = TRUE"));
        assert!(q.sql.ends_with("ORDER BY \"display_order\", \"id\""));
        assert!(q.params.is_empty());
    }

    #[test]
    fn insert_fills_defaults_and_appends_order() {
        let values = vec![("name", PgBindValue::String("Ayşe".into())), ("content", PgBindValue::String("Harika".into()))];
        let q = insert(ContentKind::Testimonials.entity(), "kartvizit", &values);
        assert!(q.sql.contains("(SELECT COALESCE(MAX(\"display_order\"), -1) + 1 FROM \"kartvizit\".\"testimonials\")"));
        assert!(q.sql.contains("$1::text"));
        assert!(q.params.contains(&PgBindValue::I32(5)));
        assert!(q.params.contains(&PgBindValue::Bool(true)));
        assert!(q.params.contains(&PgBindValue::Null(ColumnType::Text)));
        assert!(!q.sql.contains("\"created_at\", "));
    }

    #[test]
    fn update_sets_only_known_writable_columns() {
        let values = vec![
            ("active", PgBindValue::Bool(false)),
            ("created_at", PgBindValue::Null(ColumnType::Timestamptz)),
            ("nope", PgBindValue::Bool(true)),
        ];
        let q = update(ContentKind::SliderImages.entity(), "s", 7, &values);
        assert!(q.sql.starts_with("UPDATE \"s\".\"slider_images\" SET \"active\" = $1::boolean, \"updated_at\" = NOW() WHERE \"id\" = $2"));
        assert_eq!(q.params, vec![PgBindValue::Bool(false), PgBindValue::I64(7)]);
    }

    #[test]
    fn quoting_escapes_embedded_quotes() {
        assert_eq!(quoted("a\"b"), "\"a\"\"b\"");
    }
}
