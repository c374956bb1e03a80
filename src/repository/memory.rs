//! In-process repository used when no database is configured, and by the test suite.

use super::{CompanyRepository, ContentRepository, ContentValues};
use crate::config::{ContentEntity, ContentKind};
use crate::error::AppError;
use crate::models::*;
use crate::sql::PgBindValue;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
    companies: BTreeMap<i64, Company>,
    content: HashMap<ContentKind, Vec<Map<String, Value>>>,
    next_id: i64,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn slug_taken(&self, slug: &str, except: Option<i64>) -> bool {
        self.companies
            .values()
            .any(|c| c.record.slug == slug && Some(c.record.id) != except)
    }

    /// Materialise child rows with fresh ids.
    fn build_children(&mut self, draft: &CompanyDraft) -> (Vec<ContactInfo>, Vec<SocialMediaAccount>, Vec<BankAccount>) {
        let communication = draft
            .communication
            .iter()
            .map(|c| ContactInfo {
                id: self.next_id(),
                tip: c.tip.clone(),
                deger: c.deger.clone(),
                etiket: c.etiket.clone(),
                sira: c.sira,
                aktif: c.aktif,
            })
            .collect();
        let social_media = draft
            .social_media
            .iter()
            .map(|s| SocialMediaAccount {
                id: self.next_id(),
                platform: s.platform.clone(),
                url: s.url.clone(),
                etiket: s.etiket.clone(),
                sira: s.sira,
                aktif: s.aktif,
            })
            .collect();
        let mut bank_accounts = Vec::with_capacity(draft.bank_accounts.len());
        for b in &draft.bank_accounts {
            let id = self.next_id();
            let accounts = b
                .accounts
                .iter()
                .map(|a| AccountDetail {
                    id: self.next_id(),
                    iban: a.iban.clone(),
                    para_birimi: a.para_birimi.clone(),
                    hesap_turu: a.hesap_turu.clone(),
                })
                .collect();
            bank_accounts.push(BankAccount {
                id,
                banka_adi: b.banka_adi.clone(),
                banka_logo: b.banka_logo.clone(),
                hesap_sahibi: b.hesap_sahibi.clone(),
                sira: b.sira,
                aktif: b.aktif,
                accounts,
            });
        }
        (communication, social_media, bank_accounts)
    }
}

/// `tokio::sync::RwLock` around plain maps; ids are shared across all tables.
#[derive(Default)]
pub struct MemoryRepository {
    inner: RwLock<Inner>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn conflict() -> AppError {
    AppError::Conflict("slug already exists".into())
}

fn sort_children(company: &mut Company) {
    company.communication.sort_by_key(|c| (c.sira, c.id));
    company.social_media.sort_by_key(|s| (s.sira, s.id));
    company.bank_accounts.sort_by_key(|b| (b.sira, b.id));
}

fn display_key(row: &Map<String, Value>) -> (i64, i64) {
    let get = |k: &str| row.get(k).and_then(Value::as_i64).unwrap_or(0);
    (get("display_order"), get("id"))
}

fn apply_values(row: &mut Map<String, Value>, entity: &ContentEntity, values: &ContentValues) {
    for (name, v) in values {
        if entity.column(name).map(|c| c.writable).unwrap_or(false) {
            row.insert((*name).to_string(), v.to_json());
        }
    }
}

#[async_trait]
impl CompanyRepository for MemoryRepository {
    async fn list_companies(&self, query: &CompanyQuery) -> Result<Vec<CompanyRecord>, AppError> {
        let inner = self.inner.read().await;
        let term = query.search_term();
        let mut rows: Vec<CompanyRecord> = inner
            .companies
            .values()
            .filter(|c| match &term {
                Some(t) => c.record.firma_adi.to_lowercase().contains(t) || c.record.slug.contains(t),
                None => true,
            })
            .map(|c| c.record.clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows
            .into_iter()
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .collect())
    }

    async fn get_company(&self, id: i64) -> Result<Option<Company>, AppError> {
        Ok(self.inner.read().await.companies.get(&id).cloned())
    }

    async fn get_company_by_slug(&self, slug: &str) -> Result<Option<Company>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner.companies.values().find(|c| c.record.slug == slug).cloned())
    }

    async fn create_company(&self, draft: &CompanyDraft) -> Result<Company, AppError> {
        let mut inner = self.inner.write().await;
        if inner.slug_taken(&draft.slug, None) {
            return Err(conflict());
        }
        let id = inner.next_id();
        let (communication, social_media, bank_accounts) = inner.build_children(draft);
        let now = Utc::now();
        let mut company = Company {
            record: CompanyRecord {
                id,
                slug: draft.slug.clone(),
                firma_adi: draft.firma_adi.clone(),
                profile: draft.profile.clone(),
                template_id: draft.template_id,
                goruntulenme: 0,
                qr_code_data: None,
                created_at: now,
                updated_at: now,
            },
            communication,
            social_media,
            bank_accounts,
        };
        sort_children(&mut company);
        inner.companies.insert(id, company.clone());
        Ok(company)
    }

    async fn update_company(&self, id: i64, draft: &CompanyDraft) -> Result<Option<Company>, AppError> {
        let mut inner = self.inner.write().await;
        if !inner.companies.contains_key(&id) {
            return Ok(None);
        }
        if inner.slug_taken(&draft.slug, Some(id)) {
            return Err(conflict());
        }
        let (communication, social_media, bank_accounts) = inner.build_children(draft);
        let Some(company) = inner.companies.get_mut(&id) else {
            return Ok(None);
        };
        company.record.slug = draft.slug.clone();
        company.record.firma_adi = draft.firma_adi.clone();
        company.record.profile = draft.profile.clone();
        company.record.template_id = draft.template_id;
        company.record.updated_at = Utc::now();
        company.communication = communication;
        company.social_media = social_media;
        company.bank_accounts = bank_accounts;
        sort_children(company);
        Ok(Some(company.clone()))
    }

    async fn delete_company(&self, id: i64) -> Result<Option<Company>, AppError> {
        Ok(self.inner.write().await.companies.remove(&id))
    }

    async fn increment_views(&self, slug: &str) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        if let Some(c) = inner.companies.values_mut().find(|c| c.record.slug == slug) {
            c.record.goruntulenme += 1;
        }
        Ok(())
    }

    async fn set_qr_code(&self, id: i64, data_url: &str) -> Result<(), AppError> {
        let mut inner = self.inner.write().await;
        let c = inner
            .companies
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("company {}", id)))?;
        c.record.qr_code_data = Some(data_url.to_string());
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

#[async_trait]
impl ContentRepository for MemoryRepository {
    async fn list_content(&self, kind: ContentKind, include_inactive: bool) -> Result<Vec<Value>, AppError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<&Map<String, Value>> = inner
            .content
            .get(&kind)
            .map(|v| v.iter().collect())
            .unwrap_or_default();
        if !include_inactive {
            rows.retain(|r| r.get("active").and_then(Value::as_bool).unwrap_or(false));
        }
        rows.sort_by_key(|r| display_key(r));
        Ok(rows.into_iter().map(|r| Value::Object(r.clone())).collect())
    }

    async fn get_content(&self, kind: ContentKind, id: i64) -> Result<Option<Value>, AppError> {
        let inner = self.inner.read().await;
        Ok(inner
            .content
            .get(&kind)
            .and_then(|rows| rows.iter().find(|r| display_key(r).1 == id))
            .map(|r| Value::Object(r.clone())))
    }

    async fn create_content(&self, kind: ContentKind, values: &ContentValues) -> Result<Value, AppError> {
        let entity = kind.entity();
        let mut inner = self.inner.write().await;
        let id = inner.next_id();
        let rows = inner.content.entry(kind).or_default();
        let next_order = rows.iter().map(|r| display_key(r).0).max().map(|m| m + 1).unwrap_or(0);
        let now = Value::String(Utc::now().to_rfc3339());

        let mut row = Map::new();
        for c in &entity.columns {
            let v = match c.name {
                "id" => Value::from(id),
                "display_order" => Value::from(next_order),
                "created_at" | "updated_at" => now.clone(),
                _ => c
                    .default
                    .as_ref()
                    .and_then(|d| PgBindValue::for_column(c.ty, d).ok())
                    .map(|v| v.to_json())
                    .unwrap_or(Value::Null),
            };
            row.insert(c.name.to_string(), v);
        }
        apply_values(&mut row, entity, values);
        rows.push(row.clone());
        Ok(Value::Object(row))
    }

    async fn update_content(&self, kind: ContentKind, id: i64, values: &ContentValues) -> Result<Option<Value>, AppError> {
        let entity = kind.entity();
        let mut inner = self.inner.write().await;
        let Some(row) = inner
            .content
            .get_mut(&kind)
            .and_then(|rows| rows.iter_mut().find(|r| display_key(r).1 == id))
        else {
            return Ok(None);
        };
        apply_values(row, entity, values);
        row.insert("updated_at".into(), Value::String(Utc::now().to_rfc3339()));
        Ok(Some(Value::Object(row.clone())))
    }

    async fn delete_content(&self, kind: ContentKind, id: i64) -> Result<Option<Value>, AppError> {
        let mut inner = self.inner.write().await;
        let Some(rows) = inner.content.get_mut(&kind) else {
            return Ok(None);
        };
        let pos = rows.iter().position(|r| display_key(r).1 == id);
        Ok(pos.map(|i| Value::Object(rows.remove(i))))
    }

    async fn reorder_content(&self, kind: ContentKind, ids: &[i64]) -> Result<(), AppError> {
        let entity = kind.entity();
        let mut inner = self.inner.write().await;
        let rows = inner.content.entry(kind).or_default();
        if let Some(missing) = ids.iter().find(|id| !rows.iter().any(|r| display_key(r).1 == **id)) {
            return Err(AppError::NotFound(format!("{} {}", entity.label, missing)));
        }
        let now = Value::String(Utc::now().to_rfc3339());
        for (order, id) in ids.iter().enumerate() {
            if let Some(row) = rows.iter_mut().find(|r| display_key(r).1 == *id) {
                row.insert("display_order".into(), Value::from(order as i64));
                row.insert("updated_at".into(), now.clone());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnType;

    fn draft(slug: &str) -> CompanyDraft {
        CompanyDraft {
            slug: slug.into(),
            firma_adi: "Acme".into(),
            profile: CompanyProfile::default(),
            template_id: 1,
            communication: vec![ContactDraft {
                tip: "telefon".into(),
                deger: "+90 555 000 00 00".into(),
                etiket: None,
                sira: 0,
                aktif: true,
            }],
            social_media: vec![],
            bank_accounts: vec![BankAccountDraft {
                banka_adi: "Ziraat".into(),
                banka_logo: None,
                hesap_sahibi: None,
                sira: 0,
                aktif: true,
                accounts: vec![AccountDetailDraft {
                    iban: "TR330006100519786457841326".into(),
                    para_birimi: "TRY".into(),
                    hesap_turu: None,
                }],
            }],
        }
    }

    #[tokio::test]
    async fn slugs_are_unique_across_create_and_update() {
        let repo = MemoryRepository::new();
        let a = repo.create_company(&draft("acme")).await.unwrap();
        let b = repo.create_company(&draft("beta")).await.unwrap();
        assert!(matches!(repo.create_company(&draft("acme")).await, Err(AppError::Conflict(_))));
        assert!(matches!(repo.update_company(b.id(), &draft("acme")).await, Err(AppError::Conflict(_))));
        assert!(repo.update_company(a.id(), &draft("acme")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_removes_children_with_company() {
        let repo = MemoryRepository::new();
        let c = repo.create_company(&draft("acme")).await.unwrap();
        assert_eq!(c.bank_accounts[0].accounts.len(), 1);
        let removed = repo.delete_company(c.id()).await.unwrap().unwrap();
        assert_eq!(removed.communication.len(), 1);
        assert!(repo.get_company_by_slug("acme").await.unwrap().is_none());
        assert!(repo.delete_company(c.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn content_defaults_and_ordering() {
        let repo = MemoryRepository::new();
        let values = vec![
            ("question", PgBindValue::String("Q1".into())),
            ("answer", PgBindValue::String("A1".into())),
        ];
        let first = repo.create_content(ContentKind::Faqs, &values).await.unwrap();
        let second = repo.create_content(ContentKind::Faqs, &values).await.unwrap();
        assert_eq!(first["display_order"], 0);
        assert_eq!(second["display_order"], 1);
        assert_eq!(first["active"], true);
        assert_eq!(first["category"], Value::Null);

        let ids = [second["id"].as_i64().unwrap(), first["id"].as_i64().unwrap()];
        repo.reorder_content(ContentKind::Faqs, &ids).await.unwrap();
        let listed = repo.list_content(ContentKind::Faqs, false).await.unwrap();
        assert_eq!(listed[0]["id"], second["id"]);

        let hide = vec![("active", PgBindValue::Bool(false)), ("category", PgBindValue::Null(ColumnType::Text))];
        repo.update_content(ContentKind::Faqs, ids[0], &hide).await.unwrap();
        assert_eq!(repo.list_content(ContentKind::Faqs, false).await.unwrap().len(), 1);
        assert_eq!(repo.list_content(ContentKind::Faqs, true).await.unwrap().len(), 2);
        assert!(repo.reorder_content(ContentKind::Faqs, &[999]).await.is_err());
    }
}
