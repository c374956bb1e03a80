//! sqlx/Postgres repository. Company aggregates load with one query per child table;
//! content entities go through the parameterized SQL builder.

use super::{CompanyRepository, ContentRepository, ContentValues};
use crate::config::{ColumnType, ContentEntity, ContentKind, DatabaseSettings};
use crate::error::{map_unique_violation, AppError, ConfigError};
use crate::migration::{apply_schema, ensure_database_exists, BANKS_TABLE, BANK_DETAILS_TABLE, COMPANIES_TABLE, CONTACTS_TABLE, SOCIAL_TABLE};
use crate::models::*;
use crate::sql::{self, qualified_table, QueryBuf};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgConnection, PgPool, Row};
use std::collections::HashMap;

const RECORD_COLUMNS: &str = "id, slug, firma_adi, yetkili_adi, yetkili_pozisyon, firma_unvan, vergi_no, \
     vergi_dairesi, ticaret_sicil_no, firma_hakkinda_baslik, firma_hakkinda, profil_foto, firma_logo, katalog, \
     template_id, goruntulenme, qr_code_data, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct BankRow {
    id: i64,
    banka_adi: String,
    banka_logo: Option<String>,
    hesap_sahibi: Option<String>,
    sira: i32,
    aktif: bool,
}

#[derive(sqlx::FromRow)]
struct DetailRow {
    banka_hesap_id: i64,
    #[sqlx(flatten)]
    detail: AccountDetail,
}

#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
    schema: String,
}

impl PgRepository {
    pub fn new(pool: PgPool, schema: impl Into<String>) -> Self {
        PgRepository {
            pool,
            schema: schema.into(),
        }
    }

    /// Creates the database if needed, opens the pool and applies the schema.
    pub async fn connect(settings: &DatabaseSettings) -> Result<Self, AppError> {
        let url = settings
            .url
            .as_deref()
            .ok_or(AppError::Config(ConfigError::Missing("DATABASE_URL")))?;
        ensure_database_exists(url).await?;
        let pool = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .idle_timeout(settings.idle_timeout)
            .acquire_timeout(settings.acquire_timeout)
            .connect(url)
            .await?;
        apply_schema(&pool, &settings.schema).await?;
        Ok(Self::new(pool, settings.schema.clone()))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn table(&self, name: &str) -> String {
        qualified_table(&self.schema, name)
    }

    async fn load_children(&self, record: CompanyRecord) -> Result<Company, AppError> {
        let id = record.id;
        let communication: Vec<ContactInfo> = sqlx::query_as(&format!(
            "SELECT id, tip, deger, etiket, sira, aktif FROM {} WHERE firma_id = $1 ORDER BY sira, id",
            self.table(CONTACTS_TABLE)
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let social_media: Vec<SocialMediaAccount> = sqlx::query_as(&format!(
            "SELECT id, platform, url, etiket, sira, aktif FROM {} WHERE firma_id = $1 ORDER BY sira, id",
            self.table(SOCIAL_TABLE)
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let banks: Vec<BankRow> = sqlx::query_as(&format!(
            "SELECT id, banka_adi, banka_logo, hesap_sahibi, sira, aktif FROM {} WHERE firma_id = $1 ORDER BY sira, id",
            self.table(BANKS_TABLE)
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let details: Vec<DetailRow> = sqlx::query_as(&format!(
            "SELECT d.banka_hesap_id, d.id, d.iban, d.para_birimi, d.hesap_turu FROM {} d \
             JOIN {} b ON b.id = d.banka_hesap_id WHERE b.firma_id = $1 ORDER BY d.id",
            self.table(BANK_DETAILS_TABLE),
            self.table(BANKS_TABLE)
        ))
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut by_bank: HashMap<i64, Vec<AccountDetail>> = HashMap::new();
        for d in details {
            by_bank.entry(d.banka_hesap_id).or_default().push(d.detail);
        }
        let bank_accounts = banks
            .into_iter()
            .map(|b| BankAccount {
                accounts: by_bank.remove(&b.id).unwrap_or_default(),
                id: b.id,
                banka_adi: b.banka_adi,
                banka_logo: b.banka_logo,
                hesap_sahibi: b.hesap_sahibi,
                sira: b.sira,
                aktif: b.aktif,
            })
            .collect();

        Ok(Company {
            record,
            communication,
            social_media,
            bank_accounts,
        })
    }

    async fn insert_children(&self, conn: &mut PgConnection, firma_id: i64, draft: &CompanyDraft) -> Result<(), AppError> {
        let contacts = self.table(CONTACTS_TABLE);
        for c in &draft.communication {
            sqlx::query(&format!(
                "INSERT INTO {} (firma_id, tip, deger, etiket, sira, aktif) VALUES ($1, $2, $3, $4, $5, $6)",
                contacts
            ))
            .bind(firma_id)
            .bind(&c.tip)
            .bind(&c.deger)
            .bind(&c.etiket)
            .bind(c.sira)
            .bind(c.aktif)
            .execute(&mut *conn)
            .await?;
        }
        let social = self.table(SOCIAL_TABLE);
        for s in &draft.social_media {
            sqlx::query(&format!(
                "INSERT INTO {} (firma_id, platform, url, etiket, sira, aktif) VALUES ($1, $2, $3, $4, $5, $6)",
                social
            ))
            .bind(firma_id)
            .bind(&s.platform)
            .bind(&s.url)
            .bind(&s.etiket)
            .bind(s.sira)
            .bind(s.aktif)
            .execute(&mut *conn)
            .await?;
        }
        let banks = self.table(BANKS_TABLE);
        let details = self.table(BANK_DETAILS_TABLE);
        for b in &draft.bank_accounts {
            let (bank_id,): (i64,) = sqlx::query_as(&format!(
                "INSERT INTO {} (firma_id, banka_adi, banka_logo, hesap_sahibi, sira, aktif) \
                 VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
                banks
            ))
            .bind(firma_id)
            .bind(&b.banka_adi)
            .bind(&b.banka_logo)
            .bind(&b.hesap_sahibi)
            .bind(b.sira)
            .bind(b.aktif)
            .fetch_one(&mut *conn)
            .await?;
            for a in &b.accounts {
                sqlx::query(&format!(
                    "INSERT INTO {} (banka_hesap_id, iban, para_birimi, hesap_turu) VALUES ($1, $2, $3, $4)",
                    details
                ))
                .bind(bank_id)
                .bind(&a.iban)
                .bind(&a.para_birimi)
                .bind(&a.hesap_turu)
                .execute(&mut *conn)
                .await?;
            }
        }
        Ok(())
    }

    async fn fetch_record(&self, column: &str, value: PgParam<'_>) -> Result<Option<CompanyRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = $1",
            RECORD_COLUMNS,
            self.table(COMPANIES_TABLE),
            sql::quoted(column)
        );
        tracing::debug!(sql = %sql, "query");
        let q = sqlx::query_as::<_, CompanyRecord>(&sql);
        let q = match value {
            PgParam::Id(id) => q.bind(id),
            PgParam::Slug(slug) => q.bind(slug),
        };
        Ok(q.fetch_optional(&self.pool).await?)
    }

    async fn content_one(&self, q: &QueryBuf, entity: &ContentEntity) -> Result<Option<Value>, AppError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(p.clone());
        }
        let row = query.fetch_optional(&self.pool).await?;
        row.map(|r| row_to_json(&r, entity)).transpose()
    }
}

enum PgParam<'a> {
    Id(i64),
    Slug(&'a str),
}

#[async_trait]
impl CompanyRepository for PgRepository {
    async fn list_companies(&self, query: &CompanyQuery) -> Result<Vec<CompanyRecord>, AppError> {
        let table = self.table(COMPANIES_TABLE);
        let sql = format!(
            "SELECT {} FROM {} WHERE ($1::text IS NULL OR lower(firma_adi) LIKE $1 OR lower(slug) LIKE $1) \
             ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
            RECORD_COLUMNS, table
        );
        tracing::debug!(sql = %sql, "query");
        let pattern = query.search_term().map(|s| format!("%{}%", escape_like(&s)));
        let rows = sqlx::query_as::<_, CompanyRecord>(&sql)
            .bind(pattern)
            .bind(i64::from(query.limit()))
            .bind(i64::from(query.offset()))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get_company(&self, id: i64) -> Result<Option<Company>, AppError> {
        match self.fetch_record("id", PgParam::Id(id)).await? {
            Some(record) => Ok(Some(self.load_children(record).await?)),
            None => Ok(None),
        }
    }

    async fn get_company_by_slug(&self, slug: &str) -> Result<Option<Company>, AppError> {
        match self.fetch_record("slug", PgParam::Slug(slug)).await? {
            Some(record) => Ok(Some(self.load_children(record).await?)),
            None => Ok(None),
        }
    }

    async fn create_company(&self, draft: &CompanyDraft) -> Result<Company, AppError> {
        let mut tx = self.pool.begin().await?;
        let cols = CompanyProfile::COLUMNS.join(", ");
        let placeholders: Vec<String> = (0..CompanyProfile::COLUMNS.len()).map(|i| format!("${}", i + 4)).collect();
        let sql = format!(
            "INSERT INTO {} (slug, firma_adi, template_id, {}) VALUES ($1, $2, $3, {}) RETURNING id",
            self.table(COMPANIES_TABLE),
            cols,
            placeholders.join(", ")
        );
        tracing::debug!(sql = %sql, "query");
        let mut q = sqlx::query_as::<_, (i64,)>(&sql)
            .bind(&draft.slug)
            .bind(&draft.firma_adi)
            .bind(draft.template_id);
        for v in draft.profile.values() {
            q = q.bind(v.clone());
        }
        let (id,) = q
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| map_unique_violation(e, "slug"))?;
        self.insert_children(&mut *tx, id, draft).await?;
        tx.commit().await?;
        self.get_company(id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("company {} vanished after insert", id)))
    }

    async fn update_company(&self, id: i64, draft: &CompanyDraft) -> Result<Option<Company>, AppError> {
        let mut tx = self.pool.begin().await?;
        let sets: Vec<String> = CompanyProfile::COLUMNS
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ${}", c, i + 4))
            .collect();
        let sql = format!(
            "UPDATE {} SET slug = $1, firma_adi = $2, template_id = $3, {}, updated_at = NOW() WHERE id = ${} RETURNING id",
            self.table(COMPANIES_TABLE),
            sets.join(", "),
            CompanyProfile::COLUMNS.len() + 4
        );
        tracing::debug!(sql = %sql, "query");
        let mut q = sqlx::query_as::<_, (i64,)>(&sql)
            .bind(&draft.slug)
            .bind(&draft.firma_adi)
            .bind(draft.template_id);
        for v in draft.profile.values() {
            q = q.bind(v.clone());
        }
        let updated = q
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_unique_violation(e, "slug"))?;
        if updated.is_none() {
            return Ok(None);
        }
        for table in [CONTACTS_TABLE, SOCIAL_TABLE, BANKS_TABLE] {
            sqlx::query(&format!("DELETE FROM {} WHERE firma_id = $1", self.table(table)))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        self.insert_children(&mut *tx, id, draft).await?;
        tx.commit().await?;
        self.get_company(id).await
    }

    async fn delete_company(&self, id: i64) -> Result<Option<Company>, AppError> {
        let Some(company) = self.get_company(id).await? else {
            return Ok(None);
        };
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = $1", self.table(COMPANIES_TABLE)))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok((result.rows_affected() > 0).then_some(company))
    }

    async fn increment_views(&self, slug: &str) -> Result<(), AppError> {
        sqlx::query(&format!(
            "UPDATE {} SET goruntulenme = goruntulenme + 1 WHERE slug = $1",
            self.table(COMPANIES_TABLE)
        ))
        .bind(slug)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_qr_code(&self, id: i64, data_url: &str) -> Result<(), AppError> {
        let done = sqlx::query(&format!(
            "UPDATE {} SET qr_code_data = $1 WHERE id = $2",
            self.table(COMPANIES_TABLE)
        ))
        .bind(data_url)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if done.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("company {}", id)));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl ContentRepository for PgRepository {
    async fn list_content(&self, kind: ContentKind, include_inactive: bool) -> Result<Vec<Value>, AppError> {
        let entity = kind.entity();
        let q = sql::select_list(entity, &self.schema, include_inactive);
        tracing::debug!(sql = %q.sql, "query");
        let rows = sqlx::query(&q.sql).fetch_all(&self.pool).await?;
        rows.iter().map(|r| row_to_json(r, entity)).collect()
    }

    async fn get_content(&self, kind: ContentKind, id: i64) -> Result<Option<Value>, AppError> {
        let entity = kind.entity();
        self.content_one(&sql::select_by_id(entity, &self.schema, id), entity).await
    }

    async fn create_content(&self, kind: ContentKind, values: &ContentValues) -> Result<Value, AppError> {
        let entity = kind.entity();
        let q = sql::insert(entity, &self.schema, values);
        self.content_one(&q, entity)
            .await?
            .ok_or(AppError::Db(sqlx::Error::RowNotFound))
    }

    async fn update_content(&self, kind: ContentKind, id: i64, values: &ContentValues) -> Result<Option<Value>, AppError> {
        let entity = kind.entity();
        self.content_one(&sql::update(entity, &self.schema, id, values), entity).await
    }

    async fn delete_content(&self, kind: ContentKind, id: i64) -> Result<Option<Value>, AppError> {
        let entity = kind.entity();
        self.content_one(&sql::delete(entity, &self.schema, id), entity).await
    }

    async fn reorder_content(&self, kind: ContentKind, ids: &[i64]) -> Result<(), AppError> {
        let entity = kind.entity();
        let mut tx = self.pool.begin().await?;
        for (order, id) in ids.iter().enumerate() {
            let order = i32::try_from(order).map_err(|_| AppError::BadRequest("too many ids".into()))?;
            let q = sql::set_display_order(entity, &self.schema, *id, order);
            let mut query = sqlx::query(&q.sql);
            for p in &q.params {
                query = query.bind(p.clone());
            }
            if query.execute(&mut *tx).await?.rows_affected() == 0 {
                // dropping tx rolls back the orders already written
                return Err(AppError::NotFound(format!("{} {}", entity.label, id)));
            }
        }
        tx.commit().await?;
        Ok(())
    }
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

/// Decode a content row using the descriptor's column types.
fn row_to_json(row: &PgRow, entity: &ContentEntity) -> Result<Value, AppError> {
    let mut map = serde_json::Map::new();
    for c in &entity.columns {
        let name = c.name;
        let v = match c.ty {
            ColumnType::BigInt => row.try_get::<Option<i64>, _>(name)?.map(Value::from),
            ColumnType::Int => row.try_get::<Option<i32>, _>(name)?.map(Value::from),
            ColumnType::Text => row.try_get::<Option<String>, _>(name)?.map(Value::String),
            ColumnType::Bool => row.try_get::<Option<bool>, _>(name)?.map(Value::Bool),
            ColumnType::Double => row
                .try_get::<Option<f64>, _>(name)?
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number),
            ColumnType::Jsonb => row.try_get::<Option<Value>, _>(name)?,
            ColumnType::Timestamptz => row
                .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)?
                .map(|d| Value::String(d.to_rfc3339())),
        };
        map.insert(name.to_string(), v.unwrap_or(Value::Null));
    }
    Ok(Value::Object(map))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
