//! Card rendering: view model, template registry, QR codes and vCard export.

pub mod qr;
pub mod registry;
pub mod vcard;
pub mod view;

pub use qr::{qr_data_url, qr_svg, QR_DATA_URL_PREFIX};
pub use registry::{extract_styles, InquiryEmail, QrPage, TemplateMeta, TemplateRegistry, DEFAULT_TEMPLATE_ID};
pub use vcard::build_vcard;
pub use view::CardView;

use crate::models::{
    AccountDetail, BankAccount, Company, CompanyDraft, CompanyProfile, CompanyRecord, ContactInfo, SocialMediaAccount,
};
use chrono::Utc;

fn contact(id: i64, tip: &str, deger: &str, sira: i32) -> ContactInfo {
    ContactInfo {
        id,
        tip: tip.into(),
        deger: deger.into(),
        etiket: None,
        sira,
        aktif: true,
    }
}

fn social(id: i64, platform: &str, url: &str, sira: i32) -> SocialMediaAccount {
    SocialMediaAccount {
        id,
        platform: platform.into(),
        url: url.into(),
        etiket: None,
        sira,
        aktif: true,
    }
}

/// Fully populated sample company. Feeds template previews and the demo seed.
pub fn mock_company() -> Company {
    let now = Utc::now();
    Company {
        record: CompanyRecord {
            id: 0,
            slug: "ornek-teknoloji".into(),
            firma_adi: "Örnek Teknoloji A.Ş.".into(),
            profile: CompanyProfile {
                yetkili_adi: Some("Ayşe Yılmaz".into()),
                yetkili_pozisyon: Some("Genel Müdür".into()),
                firma_unvan: Some("Örnek Teknoloji Yazılım ve Danışmanlık A.Ş.".into()),
                vergi_no: Some("1234567890".into()),
                vergi_dairesi: Some("Kadıköy".into()),
                ticaret_sicil_no: Some("123456-5".into()),
                firma_hakkinda_baslik: Some("Hakkımızda".into()),
                firma_hakkinda: Some(
                    "2010'dan bu yana işletmelere yazılım ve dijital dönüşüm çözümleri sunuyoruz.".into(),
                ),
                profil_foto: None,
                firma_logo: None,
                katalog: None,
            },
            template_id: DEFAULT_TEMPLATE_ID,
            goruntulenme: 0,
            qr_code_data: None,
            created_at: now,
            updated_at: now,
        },
        communication: vec![
            contact(1, "telefon", "+90 212 555 00 00", 0),
            contact(2, "gsm", "0532 555 00 00", 1),
            contact(3, "whatsapp", "0532 555 00 00", 2),
            contact(4, "email", "info@ornek.com.tr", 3),
            contact(5, "website", "www.ornek.com.tr", 4),
            contact(6, "adres", "Caferağa Mah. Moda Cad. No:1 Kadıköy/İstanbul", 5),
        ],
        social_media: vec![
            social(1, "linkedin", "https://www.linkedin.com/company/ornek-teknoloji", 0),
            social(2, "instagram", "https://www.instagram.com/ornekteknoloji", 1),
            social(3, "x", "https://x.com/ornekteknoloji", 2),
        ],
        bank_accounts: vec![BankAccount {
            id: 1,
            banka_adi: "Örnek Bankası".into(),
            banka_logo: None,
            hesap_sahibi: Some("Örnek Teknoloji A.Ş.".into()),
            sira: 0,
            aktif: true,
            accounts: vec![
                AccountDetail {
                    id: 1,
                    iban: "TR330006100519786457841326".into(),
                    para_birimi: "TRY".into(),
                    hesap_turu: Some("Vadesiz".into()),
                },
                AccountDetail {
                    id: 2,
                    iban: "TR940001000999990123456789".into(),
                    para_birimi: "USD".into(),
                    hesap_turu: None,
                },
            ],
        }],
    }
}

pub fn mock_company_draft() -> CompanyDraft {
    mock_company().to_draft()
}
