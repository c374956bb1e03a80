//! Schema provisioning: idempotent DDL for company and content tables, database creation, demo seed.

use crate::config::{ContentKind, ContentEntity};
use crate::error::AppError;
use crate::repository::{CompanyRepository, ContentRepository, Repository};
use crate::sql::{qualified_table, quoted, PgBindValue};
use sqlx::ConnectOptions;
use sqlx::PgPool;
use std::str::FromStr;

pub const COMPANIES_TABLE: &str = "firmalar";
pub const CONTACTS_TABLE: &str = "iletisim_bilgileri";
pub const SOCIAL_TABLE: &str = "sosyal_medya_hesaplari";
pub const BANKS_TABLE: &str = "banka_hesaplari";
pub const BANK_DETAILS_TABLE: &str = "banka_hesap_detaylari";

/// Company tables in dependency order. `{schema}` is replaced with the quoted schema name.
const COMPANY_DDL: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS {schema}."firmalar" (
        id BIGSERIAL PRIMARY KEY,
        slug TEXT NOT NULL,
        firma_adi TEXT NOT NULL,
        yetkili_adi TEXT,
        yetkili_pozisyon TEXT,
        firma_unvan TEXT,
        vergi_no TEXT,
        vergi_dairesi TEXT,
        ticaret_sicil_no TEXT,
        firma_hakkinda_baslik TEXT,
        firma_hakkinda TEXT,
        profil_foto TEXT,
        firma_logo TEXT,
        katalog TEXT,
        template_id INTEGER NOT NULL DEFAULT 1,
        goruntulenme BIGINT NOT NULL DEFAULT 0,
        qr_code_data TEXT,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )"#,
    r#"CREATE UNIQUE INDEX IF NOT EXISTS "firmalar_slug_key" ON {schema}."firmalar" (slug)"#,
    r#"CREATE TABLE IF NOT EXISTS {schema}."iletisim_bilgileri" (
        id BIGSERIAL PRIMARY KEY,
        firma_id BIGINT NOT NULL REFERENCES {schema}."firmalar" (id) ON DELETE CASCADE,
        tip TEXT NOT NULL,
        deger TEXT NOT NULL,
        etiket TEXT,
        sira INTEGER NOT NULL DEFAULT 0,
        aktif BOOLEAN NOT NULL DEFAULT TRUE
    )"#,
    r#"CREATE INDEX IF NOT EXISTS "iletisim_bilgileri_firma_idx" ON {schema}."iletisim_bilgileri" (firma_id)"#,
    r#"CREATE TABLE IF NOT EXISTS {schema}."sosyal_medya_hesaplari" (
        id BIGSERIAL PRIMARY KEY,
        firma_id BIGINT NOT NULL REFERENCES {schema}."firmalar" (id) ON DELETE CASCADE,
        platform TEXT NOT NULL,
        url TEXT NOT NULL,
        etiket TEXT,
        sira INTEGER NOT NULL DEFAULT 0,
        aktif BOOLEAN NOT NULL DEFAULT TRUE
    )"#,
    r#"CREATE INDEX IF NOT EXISTS "sosyal_medya_hesaplari_firma_idx" ON {schema}."sosyal_medya_hesaplari" (firma_id)"#,
    r#"CREATE TABLE IF NOT EXISTS {schema}."banka_hesaplari" (
        id BIGSERIAL PRIMARY KEY,
        firma_id BIGINT NOT NULL REFERENCES {schema}."firmalar" (id) ON DELETE CASCADE,
        banka_adi TEXT NOT NULL,
        banka_logo TEXT,
        hesap_sahibi TEXT,
        sira INTEGER NOT NULL DEFAULT 0,
        aktif BOOLEAN NOT NULL DEFAULT TRUE
    )"#,
    r#"CREATE INDEX IF NOT EXISTS "banka_hesaplari_firma_idx" ON {schema}."banka_hesaplari" (firma_id)"#,
    r#"CREATE TABLE IF NOT EXISTS {schema}."banka_hesap_detaylari" (
        id BIGSERIAL PRIMARY KEY,
        banka_hesap_id BIGINT NOT NULL REFERENCES {schema}."banka_hesaplari" (id) ON DELETE CASCADE,
        iban TEXT NOT NULL,
        para_birimi TEXT NOT NULL DEFAULT 'TRY',
        hesap_turu TEXT
    )"#,
];

/// CREATE TABLE for one content descriptor.
pub fn content_table_ddl(entity: &ContentEntity, schema: &str) -> String {
    let mut col_defs = Vec::with_capacity(entity.columns.len());
    for c in &entity.columns {
        let def = match c.name {
            "id" => format!("{} BIGSERIAL PRIMARY KEY", quoted(c.name)),
            "display_order" => format!("{} INTEGER NOT NULL DEFAULT 0", quoted(c.name)),
            "active" => format!("{} BOOLEAN NOT NULL DEFAULT TRUE", quoted(c.name)),
            "created_at" | "updated_at" => format!("{} TIMESTAMPTZ NOT NULL DEFAULT NOW()", quoted(c.name)),
            _ => {
                let mut def = format!("{} {}", quoted(c.name), c.ty.pg_name().to_uppercase());
                if !c.nullable {
                    def.push_str(" NOT NULL");
                }
                def
            }
        };
        col_defs.push(def);
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
        qualified_table(schema, entity.table_name),
        col_defs.join(",\n  ")
    )
}

/// Create the schema and every table if missing. Safe to run on each boot.
pub async fn apply_schema(pool: &PgPool, schema: &str) -> Result<(), AppError> {
    let schema_q = quoted(schema);
    sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", schema_q))
        .execute(pool)
        .await?;
    for ddl in COMPANY_DDL {
        let sql = ddl.replace("{schema}", &schema_q);
        tracing::debug!(sql = %sql, "ddl");
        sqlx::query(&sql).execute(pool).await?;
    }
    for kind in ContentKind::ALL {
        let entity = kind.entity();
        sqlx::query(&content_table_ddl(entity, schema)).execute(pool).await?;
        let idx = format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({}, {})",
            quoted(&format!("{}_order_idx", entity.table_name)),
            qualified_table(schema, entity.table_name),
            quoted("display_order"),
            quoted("id")
        );
        sqlx::query(&idx).execute(pool).await?;
    }
    tracing::info!(schema, "schema ready");
    Ok(())
}

/// Ensure the database in `database_url` exists; create it if not. Connects to the
/// default `postgres` database to run CREATE DATABASE. Call before creating the main pool.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = parse_db_name_from_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await.map_err(AppError::Db)?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await
        .map_err(AppError::Db)?;
    if !exists.0 {
        sqlx::query(&format!("CREATE DATABASE {}", quoted(&db_name)))
            .execute(&mut conn)
            .await
            .map_err(AppError::Db)?;
        tracing::info!(database = %db_name, "created database");
    }
    Ok(())
}

fn parse_db_name_from_url(url: &str) -> Result<(String, String), AppError> {
    let path_start = url.rfind('/').ok_or_else(|| AppError::BadRequest("DATABASE_URL: no path".into()))? + 1;
    let path_and_query = url.get(path_start..).unwrap_or("");
    let (db_name, query) = match path_and_query.split_once('?') {
        Some((name, q)) => (name.trim(), Some(q)),
        None => (path_and_query.trim(), None),
    };
    let base = url.get(..path_start).unwrap_or(url);
    let admin_url = match query {
        Some(q) => format!("{}postgres?{}", base, q),
        None => format!("{}postgres", base),
    };
    Ok((admin_url, db_name.to_string()))
}

/// Insert demo content when the store is empty: one company and a few homepage items.
/// Returns false when data already existed.
pub async fn seed(repo: &dyn Repository) -> Result<bool, AppError> {
    let existing = repo.list_companies(&Default::default()).await?;
    if !existing.is_empty() {
        return Ok(false);
    }
    repo.create_company(&crate::templates::mock_company_draft()).await?;

    let text = |s: &str| PgBindValue::String(s.to_string());
    let faqs = [
        ("Dijital kartvizit nedir?", "Firmanızın tüm iletişim bilgilerini tek bir bağlantıda toplayan web sayfasıdır."),
        ("QR kod nasıl çalışır?", "QR kod kartvizit sayfanızın adresini içerir; telefon kamerasıyla okutulur."),
    ];
    for (q, a) in faqs {
        repo.create_content(ContentKind::Faqs, &vec![("question", text(q)), ("answer", text(a))])
            .await?;
    }
    repo.create_content(
        ContentKind::Testimonials,
        &vec![
            ("name", text("Ayşe Yılmaz")),
            ("title", text("Kurucu, Yılmaz Tasarım")),
            ("content", text("Müşterilerimiz artık tüm bilgilerimize tek dokunuşla ulaşıyor.")),
        ],
    )
    .await?;
    repo.create_content(
        ContentKind::Packages,
        &vec![
            ("name", text("Standart")),
            ("description", text("Tek firma için dijital kartvizit")),
            ("price", PgBindValue::F64(499.0)),
            ("features", PgBindValue::Json(serde_json::json!(["QR kod", "vCard", "Sınırsız güncelleme"]))),
            ("highlighted", PgBindValue::Bool(true)),
        ],
    )
    .await?;
    tracing::info!("seeded demo data");
    Ok(true)
}
