//! View model handed to card templates: active children, display labels, derived links.

use crate::models::{BankAccount, Company, ContactInfo, SocialMediaAccount};
use serde::Serialize;

#[derive(Clone, Debug, Serialize)]
pub struct ContactView {
    pub tip: String,
    pub label: String,
    pub value: String,
    pub href: Option<String>,
    pub external: bool,
    pub icon: &'static str,
}

#[derive(Clone, Debug, Serialize)]
pub struct SocialView {
    pub platform: String,
    pub url: String,
    pub label: String,
    pub icon: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct AccountView {
    pub iban: String,
    pub iban_display: String,
    pub para_birimi: String,
    pub hesap_turu: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BankView {
    pub banka_adi: String,
    pub banka_logo: Option<String>,
    pub hesap_sahibi: Option<String>,
    pub accounts: Vec<AccountView>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CardView {
    pub id: i64,
    pub slug: String,
    pub template_id: i32,
    pub firma_adi: String,
    pub yetkili_adi: Option<String>,
    pub yetkili_pozisyon: Option<String>,
    pub firma_unvan: Option<String>,
    pub vergi_no: Option<String>,
    pub vergi_dairesi: Option<String>,
    pub ticaret_sicil_no: Option<String>,
    pub has_tax_info: bool,
    pub about_title: Option<String>,
    pub about: Option<String>,
    pub profil_foto: Option<String>,
    pub firma_logo: Option<String>,
    pub katalog: Option<String>,
    pub public_url: String,
    pub vcard_url: String,
    pub qr_url: String,
    pub contacts: Vec<ContactView>,
    pub social: Vec<SocialView>,
    pub banks: Vec<BankView>,
}

fn non_blank(v: &Option<String>) -> Option<String> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

pub fn contact_label(tip: &str) -> &'static str {
    match tip {
        "telefon" => "Telefon",
        "gsm" => "GSM",
        "email" => "E-posta",
        "website" => "Web Sitesi",
        "adres" => "Adres",
        "whatsapp" => "WhatsApp",
        "fax" => "Faks",
        "harita" => "Harita",
        _ => "İletişim",
    }
}

fn contact_icon(tip: &str) -> &'static str {
    match tip {
        "telefon" | "gsm" => "phone",
        "email" => "mail",
        "website" => "globe",
        "adres" | "harita" => "map-pin",
        "whatsapp" => "whatsapp",
        "fax" => "printer",
        _ => "info",
    }
}

pub fn platform_label(platform: &str) -> String {
    match platform {
        "x" | "twitter" => "X".into(),
        "linkedin" => "LinkedIn".into(),
        "youtube" => "YouTube".into(),
        "tiktok" => "TikTok".into(),
        "github" => "GitHub".into(),
        "other" => "Bağlantı".into(),
        p => {
            let mut chars = p.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

fn phone_digits(v: &str) -> String {
    let plus = v.trim_start().starts_with('+');
    let digits: String = v.chars().filter(char::is_ascii_digit).collect();
    if plus {
        format!("+{}", digits)
    } else {
        digits
    }
}

/// `wa.me` wants the international number without `+`; a national `0…` number gets the TR prefix.
fn whatsapp_number(v: &str) -> String {
    let digits: String = v.chars().filter(char::is_ascii_digit).collect();
    match digits.strip_prefix('0') {
        Some(rest) if !v.trim_start().starts_with('+') => format!("90{}", rest),
        _ => digits,
    }
}

fn maps_search(query: &str) -> Option<String> {
    reqwest::Url::parse_with_params("https://www.google.com/maps/search/", &[("api", "1"), ("query", query)])
        .ok()
        .map(|u| u.to_string())
}

fn with_scheme(v: &str) -> String {
    if v.starts_with("http://") || v.starts_with("https://") {
        v.to_string()
    } else {
        format!("https://{}", v.trim_start_matches('/'))
    }
}

/// Link for a contact entry; `(href, opens in new tab)`.
pub fn contact_href(tip: &str, value: &str) -> (Option<String>, bool) {
    let value = value.trim();
    if value.is_empty() {
        return (None, false);
    }
    match tip {
        "telefon" | "gsm" | "fax" => (Some(format!("tel:{}", phone_digits(value))), false),
        "email" => (Some(format!("mailto:{}", value)), false),
        "website" => (Some(with_scheme(value)), true),
        "whatsapp" => (Some(format!("https://wa.me/{}", whatsapp_number(value))), true),
        "adres" => (maps_search(value), true),
        "harita" if value.starts_with("http://") || value.starts_with("https://") => (Some(value.to_string()), true),
        "harita" => (maps_search(value), true),
        _ => (None, false),
    }
}

/// `TR33 0006 1005 ...`
pub fn format_iban(iban: &str) -> String {
    let compact: Vec<char> = iban.chars().filter(|c| !c.is_whitespace()).collect();
    compact
        .chunks(4)
        .map(|c| c.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join(" ")
}

fn contact_view(c: &ContactInfo) -> ContactView {
    let (href, external) = contact_href(&c.tip, &c.deger);
    ContactView {
        tip: c.tip.clone(),
        label: non_blank(&c.etiket).unwrap_or_else(|| contact_label(&c.tip).to_string()),
        value: c.deger.clone(),
        href,
        external,
        icon: contact_icon(&c.tip),
    }
}

fn social_view(s: &SocialMediaAccount) -> SocialView {
    SocialView {
        platform: s.platform.clone(),
        url: s.url.clone(),
        label: non_blank(&s.etiket).unwrap_or_else(|| platform_label(&s.platform)),
        icon: s.platform.clone(),
    }
}

fn bank_view(b: &BankAccount) -> BankView {
    BankView {
        banka_adi: b.banka_adi.clone(),
        banka_logo: non_blank(&b.banka_logo),
        hesap_sahibi: non_blank(&b.hesap_sahibi),
        accounts: b
            .accounts
            .iter()
            .map(|a| AccountView {
                iban: a.iban.clone(),
                iban_display: format_iban(&a.iban),
                para_birimi: a.para_birimi.clone(),
                hesap_turu: non_blank(&a.hesap_turu),
            })
            .collect(),
    }
}

impl CardView {
    pub fn from_company(company: &Company, base_url: &str) -> Self {
        let r = &company.record;
        let p = &r.profile;
        let base = base_url.trim_end_matches('/');

        let mut contacts: Vec<&ContactInfo> = company.communication.iter().filter(|c| c.aktif).collect();
        contacts.sort_by_key(|c| (c.sira, c.id));
        let mut social: Vec<&SocialMediaAccount> = company.social_media.iter().filter(|s| s.aktif).collect();
        social.sort_by_key(|s| (s.sira, s.id));
        let mut banks: Vec<&BankAccount> = company.bank_accounts.iter().filter(|b| b.aktif).collect();
        banks.sort_by_key(|b| (b.sira, b.id));

        let vergi_no = non_blank(&p.vergi_no);
        let vergi_dairesi = non_blank(&p.vergi_dairesi);
        let ticaret_sicil_no = non_blank(&p.ticaret_sicil_no);

        CardView {
            id: r.id,
            slug: r.slug.clone(),
            template_id: r.template_id,
            firma_adi: r.firma_adi.clone(),
            yetkili_adi: non_blank(&p.yetkili_adi),
            yetkili_pozisyon: non_blank(&p.yetkili_pozisyon),
            firma_unvan: non_blank(&p.firma_unvan),
            has_tax_info: vergi_no.is_some() || vergi_dairesi.is_some() || ticaret_sicil_no.is_some(),
            vergi_no,
            vergi_dairesi,
            ticaret_sicil_no,
            about_title: non_blank(&p.firma_hakkinda_baslik),
            about: non_blank(&p.firma_hakkinda),
            profil_foto: non_blank(&p.profil_foto),
            firma_logo: non_blank(&p.firma_logo),
            katalog: non_blank(&p.katalog),
            public_url: format!("{}/{}", base, r.slug),
            vcard_url: format!("/api/vcard/{}", r.slug),
            qr_url: format!("/api/qr-codes/{}", r.slug),
            contacts: contacts.into_iter().map(contact_view).collect(),
            social: social.into_iter().map(social_view).collect(),
            banks: banks.into_iter().map(bank_view).filter(|b| !b.accounts.is_empty()).collect(),
        }
    }

    /// Reorders contacts by a saved icon order (contact `tip` names). Unlisted types keep
    /// their relative order after the listed ones.
    pub fn with_icon_order(mut self, order: &[String]) -> Self {
        if order.is_empty() {
            return self;
        }
        let rank = |tip: &str| order.iter().position(|o| o == tip).unwrap_or(order.len());
        self.contacts.sort_by_key(|c| rank(&c.tip));
        self
    }
}
