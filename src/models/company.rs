//! Company (firma) aggregate: profile row plus owned contact, social and bank collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Optional profile fields shared by the stored record and the write input.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CompanyProfile {
    #[serde(default)]
    pub yetkili_adi: Option<String>,
    #[serde(default)]
    pub yetkili_pozisyon: Option<String>,
    #[serde(default)]
    pub firma_unvan: Option<String>,
    #[serde(default)]
    pub vergi_no: Option<String>,
    #[serde(default)]
    pub vergi_dairesi: Option<String>,
    #[serde(default)]
    pub ticaret_sicil_no: Option<String>,
    #[serde(default)]
    pub firma_hakkinda_baslik: Option<String>,
    #[serde(default)]
    pub firma_hakkinda: Option<String>,
    #[serde(default)]
    pub profil_foto: Option<String>,
    #[serde(default)]
    pub firma_logo: Option<String>,
    #[serde(default)]
    pub katalog: Option<String>,
}

impl CompanyProfile {
    /// Column names in storage order.
    pub const COLUMNS: [&'static str; 11] = [
        "yetkili_adi",
        "yetkili_pozisyon",
        "firma_unvan",
        "vergi_no",
        "vergi_dairesi",
        "ticaret_sicil_no",
        "firma_hakkinda_baslik",
        "firma_hakkinda",
        "profil_foto",
        "firma_logo",
        "katalog",
    ];

    pub fn values(&self) -> [&Option<String>; 11] {
        [
            &self.yetkili_adi,
            &self.yetkili_pozisyon,
            &self.firma_unvan,
            &self.vergi_no,
            &self.vergi_dairesi,
            &self.ticaret_sicil_no,
            &self.firma_hakkinda_baslik,
            &self.firma_hakkinda,
            &self.profil_foto,
            &self.firma_logo,
            &self.katalog,
        ]
    }

    fn values_mut(&mut self) -> [&mut Option<String>; 11] {
        [
            &mut self.yetkili_adi,
            &mut self.yetkili_pozisyon,
            &mut self.firma_unvan,
            &mut self.vergi_no,
            &mut self.vergi_dairesi,
            &mut self.ticaret_sicil_no,
            &mut self.firma_hakkinda_baslik,
            &mut self.firma_hakkinda,
            &mut self.profil_foto,
            &mut self.firma_logo,
            &mut self.katalog,
        ]
    }

    /// Trims every field and turns blank strings into `None`.
    pub fn normalized(mut self) -> Self {
        for v in self.values_mut() {
            *v = v.take().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        }
        self
    }

    /// Applies a patch: fields present in `patch` replace ours; an empty string clears the field.
    pub fn merge(&mut self, patch: &CompanyProfile) {
        for (ours, theirs) in self.values_mut().into_iter().zip(patch.values()) {
            if let Some(v) = theirs {
                let v = v.trim();
                *ours = if v.is_empty() { None } else { Some(v.to_string()) };
            }
        }
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        let i = Self::COLUMNS.iter().position(|c| *c == column)?;
        self.values()[i].as_deref()
    }

    pub fn set(&mut self, column: &str, value: Option<String>) -> bool {
        match Self::COLUMNS.iter().position(|c| *c == column) {
            Some(i) => {
                *self.values_mut()[i] = value;
                true
            }
            None => false,
        }
    }

    /// Stored file URLs (photo, logo, catalog) that belong to this company.
    pub fn file_urls(&self) -> Vec<String> {
        [&self.profil_foto, &self.firma_logo, &self.katalog]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct CompanyRecord {
    pub id: i64,
    pub slug: String,
    pub firma_adi: String,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub profile: CompanyProfile,
    pub template_id: i32,
    pub goruntulenme: i64,
    #[serde(skip)]
    pub qr_code_data: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct ContactInfo {
    pub id: i64,
    pub tip: String,
    pub deger: String,
    pub etiket: Option<String>,
    pub sira: i32,
    pub aktif: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct SocialMediaAccount {
    pub id: i64,
    pub platform: String,
    pub url: String,
    pub etiket: Option<String>,
    pub sira: i32,
    pub aktif: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, sqlx::FromRow)]
pub struct AccountDetail {
    pub id: i64,
    pub iban: String,
    pub para_birimi: String,
    pub hesap_turu: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BankAccount {
    pub id: i64,
    pub banka_adi: String,
    pub banka_logo: Option<String>,
    pub hesap_sahibi: Option<String>,
    pub sira: i32,
    pub aktif: bool,
    pub accounts: Vec<AccountDetail>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Company {
    #[serde(flatten)]
    pub record: CompanyRecord,
    pub communication: Vec<ContactInfo>,
    pub social_media: Vec<SocialMediaAccount>,
    pub bank_accounts: Vec<BankAccount>,
}

impl Company {
    pub fn id(&self) -> i64 {
        self.record.id
    }

    pub fn slug(&self) -> &str {
        &self.record.slug
    }

    /// Public JSON projection: active children only, ordered by `sira`.
    pub fn public_projection(&self) -> Value {
        let mut communication: Vec<&ContactInfo> = self.communication.iter().filter(|c| c.aktif).collect();
        communication.sort_by_key(|c| (c.sira, c.id));
        let mut social_media: Vec<&SocialMediaAccount> = self.social_media.iter().filter(|s| s.aktif).collect();
        social_media.sort_by_key(|s| (s.sira, s.id));
        let mut bank_accounts: Vec<&BankAccount> = self.bank_accounts.iter().filter(|b| b.aktif).collect();
        bank_accounts.sort_by_key(|b| (b.sira, b.id));

        let mut value = serde_json::to_value(&self.record).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut value {
            map.insert("communication".into(), serde_json::to_value(communication).unwrap_or_default());
            map.insert("social_media".into(), serde_json::to_value(social_media).unwrap_or_default());
            map.insert("bank_accounts".into(), serde_json::to_value(bank_accounts).unwrap_or_default());
        }
        value
    }

    /// Converts back into a write draft (used to keep untouched collections on partial updates).
    pub fn to_draft(&self) -> CompanyDraft {
        CompanyDraft {
            slug: self.record.slug.clone(),
            firma_adi: self.record.firma_adi.clone(),
            profile: self.record.profile.clone(),
            template_id: self.record.template_id,
            communication: self
                .communication
                .iter()
                .map(|c| ContactDraft {
                    tip: c.tip.clone(),
                    deger: c.deger.clone(),
                    etiket: c.etiket.clone(),
                    sira: c.sira,
                    aktif: c.aktif,
                })
                .collect(),
            social_media: self
                .social_media
                .iter()
                .map(|s| SocialDraft {
                    platform: s.platform.clone(),
                    url: s.url.clone(),
                    etiket: s.etiket.clone(),
                    sira: s.sira,
                    aktif: s.aktif,
                })
                .collect(),
            bank_accounts: self
                .bank_accounts
                .iter()
                .map(|b| BankAccountDraft {
                    banka_adi: b.banka_adi.clone(),
                    banka_logo: b.banka_logo.clone(),
                    hesap_sahibi: b.hesap_sahibi.clone(),
                    sira: b.sira,
                    aktif: b.aktif,
                    accounts: b
                        .accounts
                        .iter()
                        .map(|a| AccountDetailDraft {
                            iban: a.iban.clone(),
                            para_birimi: a.para_birimi.clone(),
                            hesap_turu: a.hesap_turu.clone(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

/// Validated, normalised company write. Collections are stored exactly as given.
#[derive(Clone, Debug, PartialEq)]
pub struct CompanyDraft {
    pub slug: String,
    pub firma_adi: String,
    pub profile: CompanyProfile,
    pub template_id: i32,
    pub communication: Vec<ContactDraft>,
    pub social_media: Vec<SocialDraft>,
    pub bank_accounts: Vec<BankAccountDraft>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ContactDraft {
    pub tip: String,
    pub deger: String,
    pub etiket: Option<String>,
    pub sira: i32,
    pub aktif: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SocialDraft {
    pub platform: String,
    pub url: String,
    pub etiket: Option<String>,
    pub sira: i32,
    pub aktif: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BankAccountDraft {
    pub banka_adi: String,
    pub banka_logo: Option<String>,
    pub hesap_sahibi: Option<String>,
    pub sira: i32,
    pub aktif: bool,
    pub accounts: Vec<AccountDetailDraft>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AccountDetailDraft {
    pub iban: String,
    pub para_birimi: String,
    pub hesap_turu: Option<String>,
}

/// List query for the admin company table.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CompanyQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub offset: Option<u32>,
}

impl CompanyQuery {
    pub const DEFAULT_LIMIT: u32 = 50;
    pub const MAX_LIMIT: u32 = 200;

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }

    /// Trimmed, lowercased search term; `None` when blank.
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company() -> Company {
        let now = Utc::now();
        Company {
            record: CompanyRecord {
                id: 7,
                slug: "acme".into(),
                firma_adi: "Acme".into(),
                profile: CompanyProfile::default(),
                template_id: 1,
                goruntulenme: 0,
                qr_code_data: Some("data:image/svg+xml;base64,AAAA".into()),
                created_at: now,
                updated_at: now,
            },
            communication: vec![
                ContactInfo { id: 2, tip: "email".into(), deger: "a@acme.test".into(), etiket: None, sira: 1, aktif: true },
                ContactInfo { id: 1, tip: "telefon".into(), deger: "+90 555".into(), etiket: None, sira: 0, aktif: true },
                ContactInfo { id: 3, tip: "fax".into(), deger: "123".into(), etiket: None, sira: 2, aktif: false },
            ],
            social_media: vec![],
            bank_accounts: vec![],
        }
    }

    #[test]
    fn projection_keeps_active_children_in_order() {
        let v = company().public_projection();
        assert_eq!(v["firma_adi"], "Acme");
        let comm = v["communication"].as_array().unwrap();
        assert_eq!(comm.len(), 2);
        assert_eq!(comm[0]["tip"], "telefon");
        assert_eq!(v["social_media"], serde_json::json!([]));
        assert!(v.get("qr_code_data").is_none());
    }

    #[test]
    fn merge_replaces_and_clears() {
        let mut p = CompanyProfile {
            yetkili_adi: Some("Ali".into()),
            firma_unvan: Some("Acme Ltd".into()),
            ..Default::default()
        };
        let patch = CompanyProfile {
            yetkili_adi: Some("  Ayşe ".into()),
            firma_unvan: Some("".into()),
            ..Default::default()
        };
        p.merge(&patch);
        assert_eq!(p.yetkili_adi.as_deref(), Some("Ayşe"));
        assert_eq!(p.firma_unvan, None);
    }

    #[test]
    fn draft_round_trip_preserves_children() {
        let c = company();
        let d = c.to_draft();
        assert_eq!(d.communication.len(), 3);
        assert!(!d.communication[2].aktif);
        assert_eq!(d.slug, "acme");
    }

    #[test]
    fn query_limits_are_clamped() {
        let q = CompanyQuery { limit: Some(10_000), ..Default::default() };
        assert_eq!(q.limit(), CompanyQuery::MAX_LIMIT);
        assert_eq!(CompanyQuery::default().limit(), CompanyQuery::DEFAULT_LIMIT);
    }
}
