//! Company writes: input parsing, validation, slug derivation, and post-processing dispatch.

use super::validation::{is_email, is_url};
use crate::config::SOCIAL_PLATFORMS;
use crate::error::{AppError, ValidationErrors};
use crate::iban::{normalize_iban, validate_iban};
use crate::models::{
    AccountDetailDraft, BankAccountDraft, Company, CompanyDraft, CompanyProfile, CompanyQuery, CompanyRecord,
    ContactDraft, SocialDraft,
};
use crate::postprocess::PostEvent;
use crate::slug::{slugify, validate_slug, with_suffix};
use crate::state::AppState;
use crate::templates::{TemplateRegistry, DEFAULT_TEMPLATE_ID};
use crate::uploads::{UploadField, UploadFile};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

pub const CONTACT_TYPES: &[&str] = &["telefon", "gsm", "email", "website", "adres", "whatsapp", "fax", "harita"];

/// Derived slugs that collide get `-2`, `-3`, ... up to this suffix.
const MAX_SLUG_SUFFIX: u32 = 5;

const MAX_NAME_LEN: usize = 200;
const MAX_TEXT_LEN: usize = 500;
const MAX_ABOUT_LEN: usize = 5000;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ContactInput {
    pub tip: String,
    pub deger: String,
    pub etiket: Option<String>,
    pub sira: Option<i32>,
    pub aktif: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct SocialInput {
    pub platform: String,
    pub url: String,
    pub etiket: Option<String>,
    pub sira: Option<i32>,
    pub aktif: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AccountInput {
    pub iban: String,
    pub para_birimi: Option<String>,
    pub hesap_turu: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct BankInput {
    pub banka_adi: String,
    pub banka_logo: Option<String>,
    pub hesap_sahibi: Option<String>,
    pub sira: Option<i32>,
    pub aktif: Option<bool>,
    #[serde(alias = "hesaplar")]
    pub accounts: Vec<AccountInput>,
}

/// Admin write body. Absent fields are left alone on update; present collections replace the stored ones.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CompanyInput {
    pub slug: Option<String>,
    pub firma_adi: Option<String>,
    #[serde(flatten)]
    pub profile: CompanyProfile,
    /// Number or numeric string.
    pub template_id: Option<Value>,
    #[serde(alias = "iletisim_bilgileri")]
    pub communication: Option<Vec<ContactInput>>,
    #[serde(alias = "sosyal_medya")]
    pub social_media: Option<Vec<SocialInput>>,
    #[serde(alias = "banka_hesaplari")]
    pub bank_accounts: Option<Vec<BankInput>>,
}

fn trimmed(v: &Option<String>) -> Option<String> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

fn check_len(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(field, format!("must be at most {} characters", max));
    }
}

fn parse_template_id(v: &Value) -> Option<i32> {
    match v {
        Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn is_currency(s: &str) -> bool {
    s.len() == 3 && s.chars().all(|c| c.is_ascii_uppercase())
}

impl CompanyInput {
    pub fn from_json(body: Value) -> Result<Self, AppError> {
        if !body.is_object() {
            return Err(AppError::BadRequest("body must be a JSON object".into()));
        }
        serde_json::from_value(body).map_err(|e| AppError::BadRequest(format!("invalid company body: {}", e)))
    }

    pub fn normalized_slug(&self) -> Option<String> {
        trimmed(&self.slug).map(|s| s.to_lowercase())
    }

    /// Field-level checks. `creating` makes `firma_adi` mandatory.
    pub fn validate(&self, templates: &TemplateRegistry, creating: bool) -> ValidationErrors {
        let mut errors = ValidationErrors::new();

        match trimmed(&self.firma_adi) {
            Some(name) => check_len(&mut errors, "firma_adi", &name, MAX_NAME_LEN),
            None if creating || self.firma_adi.is_some() => errors.add("firma_adi", "is required"),
            None => {}
        }
        if let Some(slug) = self.normalized_slug() {
            if let Err(msg) = validate_slug(&slug) {
                errors.add("slug", msg);
            }
        }
        if let Some(raw) = &self.template_id {
            match parse_template_id(raw) {
                Some(id) if templates.exists(id) => {}
                Some(_) => errors.add("template_id", "unknown template"),
                None => errors.add("template_id", "must be an integer"),
            }
        }

        for (column, value) in CompanyProfile::COLUMNS.iter().zip(self.profile.values()) {
            let Some(v) = value.as_deref().map(str::trim).filter(|s| !s.is_empty()) else {
                continue;
            };
            let max = match *column {
                "firma_hakkinda" => MAX_ABOUT_LEN,
                "firma_hakkinda_baslik" => MAX_NAME_LEN,
                _ => MAX_TEXT_LEN,
            };
            check_len(&mut errors, column, v, max);
            if matches!(*column, "profil_foto" | "firma_logo" | "katalog") && !is_url(v) {
                errors.add(*column, "must be an http(s) URL or a site path");
            }
        }

        for (i, c) in self.communication.iter().flatten().enumerate() {
            let path = |f: &str| format!("communication[{}].{}", i, f);
            let tip = c.tip.trim();
            let deger = c.deger.trim();
            if !CONTACT_TYPES.contains(&tip) {
                errors.add(path("tip"), format!("must be one of: {}", CONTACT_TYPES.join(", ")));
            }
            if deger.is_empty() {
                errors.add(path("deger"), "is required");
                continue;
            }
            check_len(&mut errors, &path("deger"), deger, MAX_TEXT_LEN);
            match tip {
                "email" if !is_email(deger) => errors.add(path("deger"), "must be a valid email"),
                "website" if !is_url(deger) && !is_url(&format!("https://{}", deger)) => {
                    errors.add(path("deger"), "must be a website address")
                }
                _ => {}
            }
        }

        for (i, s) in self.social_media.iter().flatten().enumerate() {
            let path = |f: &str| format!("social_media[{}].{}", i, f);
            if !SOCIAL_PLATFORMS.contains(&s.platform.trim()) {
                errors.add(path("platform"), format!("must be one of: {}", SOCIAL_PLATFORMS.join(", ")));
            }
            let url = s.url.trim();
            if url.is_empty() {
                errors.add(path("url"), "is required");
            } else if !is_url(url) {
                errors.add(path("url"), "must be an http(s) URL");
            }
        }

        for (i, b) in self.bank_accounts.iter().flatten().enumerate() {
            let path = |f: &str| format!("bank_accounts[{}].{}", i, f);
            if b.banka_adi.trim().is_empty() {
                errors.add(path("banka_adi"), "is required");
            }
            if let Some(logo) = trimmed(&b.banka_logo) {
                if !is_url(&logo) {
                    errors.add(path("banka_logo"), "must be an http(s) URL or a site path");
                }
            }
            for (j, a) in b.accounts.iter().enumerate() {
                let apath = |f: &str| format!("bank_accounts[{}].accounts[{}].{}", i, j, f);
                if let Err(msg) = validate_iban(&normalize_iban(&a.iban)) {
                    errors.add(apath("iban"), msg);
                }
                if let Some(cur) = trimmed(&a.para_birimi) {
                    if !is_currency(&cur.to_uppercase()) {
                        errors.add(apath("para_birimi"), "must be a 3-letter currency code");
                    }
                }
            }
        }

        errors
    }

    fn contact_drafts(list: &[ContactInput]) -> Vec<ContactDraft> {
        list.iter()
            .enumerate()
            .map(|(i, c)| ContactDraft {
                tip: c.tip.trim().to_string(),
                deger: c.deger.trim().to_string(),
                etiket: trimmed(&c.etiket),
                sira: c.sira.unwrap_or(i as i32),
                aktif: c.aktif.unwrap_or(true),
            })
            .collect()
    }

    fn social_drafts(list: &[SocialInput]) -> Vec<SocialDraft> {
        list.iter()
            .enumerate()
            .map(|(i, s)| SocialDraft {
                platform: s.platform.trim().to_string(),
                url: s.url.trim().to_string(),
                etiket: trimmed(&s.etiket),
                sira: s.sira.unwrap_or(i as i32),
                aktif: s.aktif.unwrap_or(true),
            })
            .collect()
    }

    fn bank_drafts(list: &[BankInput]) -> Vec<BankAccountDraft> {
        list.iter()
            .enumerate()
            .map(|(i, b)| BankAccountDraft {
                banka_adi: b.banka_adi.trim().to_string(),
                banka_logo: trimmed(&b.banka_logo),
                hesap_sahibi: trimmed(&b.hesap_sahibi),
                sira: b.sira.unwrap_or(i as i32),
                aktif: b.aktif.unwrap_or(true),
                accounts: b
                    .accounts
                    .iter()
                    .map(|a| AccountDetailDraft {
                        iban: normalize_iban(&a.iban),
                        para_birimi: trimmed(&a.para_birimi)
                            .map(|c| c.to_uppercase())
                            .unwrap_or_else(|| "TRY".into()),
                        hesap_turu: trimmed(&a.hesap_turu),
                    })
                    .collect(),
            })
            .collect()
    }

    /// Draft for a new company. The slug is derived from `firma_adi` when omitted.
    pub fn into_new_draft(self) -> Result<CompanyDraft, AppError> {
        let firma_adi = trimmed(&self.firma_adi).ok_or_else(|| AppError::field("firma_adi", "is required"))?;
        let slug = match self.normalized_slug() {
            Some(s) => s,
            None => {
                let derived = slugify(&firma_adi);
                validate_slug(&derived)
                    .map_err(|_| AppError::field("slug", "could not be derived from firma_adi, please provide one"))?;
                derived
            }
        };
        Ok(CompanyDraft {
            slug,
            firma_adi,
            profile: self.profile.normalized(),
            template_id: self
                .template_id
                .as_ref()
                .and_then(parse_template_id)
                .unwrap_or(DEFAULT_TEMPLATE_ID),
            communication: Self::contact_drafts(self.communication.as_deref().unwrap_or_default()),
            social_media: Self::social_drafts(self.social_media.as_deref().unwrap_or_default()),
            bank_accounts: Self::bank_drafts(self.bank_accounts.as_deref().unwrap_or_default()),
        })
    }

    /// Applies this input on top of the stored company.
    pub fn apply_to(self, existing: &Company) -> CompanyDraft {
        let mut draft = existing.to_draft();
        if let Some(name) = trimmed(&self.firma_adi) {
            draft.firma_adi = name;
        }
        if let Some(slug) = self.normalized_slug() {
            draft.slug = slug;
        }
        draft.profile.merge(&self.profile);
        if let Some(id) = self.template_id.as_ref().and_then(parse_template_id) {
            draft.template_id = id;
        }
        if let Some(list) = &self.communication {
            draft.communication = Self::contact_drafts(list);
        }
        if let Some(list) = &self.social_media {
            draft.social_media = Self::social_drafts(list);
        }
        if let Some(list) = &self.bank_accounts {
            draft.bank_accounts = Self::bank_drafts(list);
        }
        draft
    }
}

pub struct CompanyService;

impl CompanyService {
    pub async fn list(state: &AppState, query: &CompanyQuery) -> Result<Vec<CompanyRecord>, AppError> {
        state.repo.list_companies(query).await
    }

    pub async fn get(state: &AppState, id: i64) -> Result<Company, AppError> {
        state
            .repo
            .get_company(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("company {}", id)))
    }

    pub async fn create(state: &AppState, body: Value) -> Result<Company, AppError> {
        let input = CompanyInput::from_json(body)?;
        input.validate(&state.templates, true).into_result()?;
        let derived = input.normalized_slug().is_none();
        let mut draft = input.into_new_draft()?;

        let base = draft.slug.clone();
        let mut suffix = 1;
        let company = loop {
            match state.repo.create_company(&draft).await {
                Err(AppError::Conflict(_)) if derived && suffix < MAX_SLUG_SUFFIX => {
                    suffix += 1;
                    draft.slug = with_suffix(&base, suffix);
                }
                other => break other?,
            }
        };
        tracing::info!(id = company.id(), slug = %company.slug(), "company created");
        state.post.spawn(PostEvent::Created { company: company.clone() });
        Ok(company)
    }

    pub async fn update(state: &AppState, id: i64, body: Value) -> Result<Company, AppError> {
        let input = CompanyInput::from_json(body)?;
        input.validate(&state.templates, false).into_result()?;
        let existing = Self::get(state, id).await?;
        let draft = input.apply_to(&existing);
        let company = state
            .repo
            .update_company(id, &draft)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("company {}", id)))?;
        Self::after_update(state, &existing, &company).await;
        tracing::info!(id, slug = %company.slug(), "company updated");
        Ok(company)
    }

    pub async fn delete(state: &AppState, id: i64) -> Result<Company, AppError> {
        let company = state
            .repo
            .delete_company(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("company {}", id)))?;
        state.cache.invalidate_slug(company.slug()).await;
        tracing::info!(id, slug = %company.slug(), "company deleted");
        state.post.spawn(PostEvent::Deleted { company: company.clone() });
        Ok(company)
    }

    /// Stores uploaded files and points the company's file columns at them.
    pub async fn attach_files(
        state: &AppState,
        id: i64,
        files: Vec<UploadFile>,
    ) -> Result<(Company, BTreeMap<UploadField, String>), AppError> {
        if files.is_empty() {
            return Err(AppError::BadRequest(format!(
                "no file fields; expected one of: {}",
                UploadField::ALL.map(|f| f.name()).join(", ")
            )));
        }
        let existing = Self::get(state, id).await?;
        let urls = state.uploads.upload_all(id, &files).await?;

        let mut draft = existing.to_draft();
        let mut replaced = Vec::new();
        for (field, url) in &urls {
            if let Some(old) = existing.record.profile.get(field.name()) {
                if old != url.as_str() {
                    replaced.push(old.to_string());
                }
            }
            draft.profile.set(field.name(), Some(url.clone()));
        }
        let company = match state.repo.update_company(id, &draft).await {
            Ok(Some(c)) => c,
            result => {
                // the row is gone or the write failed; the new files are orphans
                let new: Vec<String> = urls.values().cloned().collect();
                state.uploads.remove_all(id, &new).await;
                return match result {
                    Err(e) => Err(e),
                    _ => Err(AppError::NotFound(format!("company {}", id))),
                };
            }
        };
        for (url, e) in state.uploads.remove_all(id, &replaced).await {
            tracing::warn!(id, url = %url, error = %e, "replaced file not removed");
        }
        Self::after_update(state, &existing, &company).await;
        Ok((company, urls))
    }

    async fn after_update(state: &AppState, before: &Company, after: &Company) {
        state.cache.invalidate_slug(before.slug()).await;
        if before.slug() != after.slug() {
            state.cache.invalidate_slug(after.slug()).await;
        }
        state.post.spawn(PostEvent::Updated {
            company: after.clone(),
            old_slug: before.slug().to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> TemplateRegistry {
        TemplateRegistry::new().unwrap()
    }

    fn input(v: Value) -> CompanyInput {
        CompanyInput::from_json(v).unwrap()
    }

    #[test]
    fn minimal_create_derives_slug_and_defaults() {
        let i = input(json!({ "firma_adi": "  Çınar Yapı Ltd. " }));
        assert!(i.validate(&registry(), true).is_empty());
        let d = i.into_new_draft().unwrap();
        assert_eq!(d.slug, "cinar-yapi-ltd");
        assert_eq!(d.firma_adi, "Çınar Yapı Ltd.");
        assert_eq!(d.template_id, DEFAULT_TEMPLATE_ID);
        assert!(d.communication.is_empty());
    }

    #[test]
    fn collects_nested_field_errors() {
        let i = input(json!({
            "slug": "api",
            "template_id": 999,
            "profil_foto": "javascript:alert(1)",
            "communication": [
                { "tip": "email", "deger": "not-an-email" },
                { "tip": "pager", "deger": "123" }
            ],
            "social_media": [{ "platform": "myspace", "url": "" }],
            "bank_accounts": [{ "banka_adi": "", "accounts": [{ "iban": "TR00 1234" }] }]
        }));
        let errors = i.validate(&registry(), true);
        assert_eq!(errors.get("firma_adi"), Some("is required"));
        assert_eq!(errors.get("slug"), Some("is reserved"));
        assert_eq!(errors.get("template_id"), Some("unknown template"));
        assert!(errors.get("profil_foto").is_some());
        assert_eq!(errors.get("communication[0].deger"), Some("must be a valid email"));
        assert!(errors.get("communication[1].tip").is_some());
        assert!(errors.get("social_media[0].platform").is_some());
        assert_eq!(errors.get("social_media[0].url"), Some("is required"));
        assert_eq!(errors.get("bank_accounts[0].banka_adi"), Some("is required"));
        assert!(errors.get("bank_accounts[0].accounts[0].iban").is_some());
    }

    #[test]
    fn ibans_are_normalised_and_children_ordered_by_position() {
        let d = input(json!({
            "firma_adi": "Acme",
            "communication": [{ "tip": "telefon", "deger": " 0212 " }, { "tip": "gsm", "deger": "0532", "aktif": false }],
            "bank_accounts": [{ "banka_adi": "Banka", "accounts": [{ "iban": "tr33 0006 1005 1978 6457 8413 26" }] }]
        }))
        .into_new_draft()
        .unwrap();
        assert_eq!(d.communication[0].deger, "0212");
        assert_eq!(d.communication[1].sira, 1);
        assert!(!d.communication[1].aktif);
        assert_eq!(d.bank_accounts[0].accounts[0].iban, "TR330006100519786457841326");
        assert_eq!(d.bank_accounts[0].accounts[0].para_birimi, "TRY");
    }

    #[test]
    fn update_keeps_absent_fields_and_replaces_present_collections() {
        let existing = crate::templates::mock_company();
        let d = input(json!({ "firma_unvan": "", "template_id": "3", "social_media": [] })).apply_to(&existing);
        assert_eq!(d.firma_adi, existing.record.firma_adi);
        assert_eq!(d.slug, existing.record.slug);
        assert_eq!(d.profile.firma_unvan, None);
        assert_eq!(d.profile.yetkili_adi, existing.record.profile.yetkili_adi);
        assert_eq!(d.template_id, 3);
        assert!(d.social_media.is_empty());
        assert_eq!(d.communication.len(), existing.communication.len());
    }

    #[test]
    fn update_rejects_blanking_the_name() {
        let errors = input(json!({ "firma_adi": "  " })).validate(&registry(), false);
        assert_eq!(errors.get("firma_adi"), Some("is required"));
        assert!(input(json!({ "yetkili_adi": "Ali" })).validate(&registry(), false).is_empty());
    }

    #[test]
    fn non_object_bodies_are_bad_requests() {
        assert!(matches!(CompanyInput::from_json(json!([1, 2])), Err(AppError::BadRequest(_))));
    }
}
