//! Template catalog and the single Handlebars engine used for live pages, previews, QR pages and mail.

use super::view::CardView;
use crate::error::AppError;
use handlebars::Handlebars;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use utoipa::ToSchema;

pub const DEFAULT_TEMPLATE_ID: i32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct TemplateMeta {
    pub id: i32,
    #[schema(value_type = String)]
    pub name: &'static str,
    #[schema(value_type = String)]
    pub description: &'static str,
    /// CSS theme name, also used as the `theme-<style>` body class.
    #[schema(value_type = String)]
    pub style: &'static str,
}

struct Theme {
    meta: TemplateMeta,
    css: &'static str,
}

const fn theme(id: i32, name: &'static str, description: &'static str, style: &'static str, css: &'static str) -> Theme {
    Theme {
        meta: TemplateMeta {
            id,
            name,
            description,
            style,
        },
        css,
    }
}

static THEMES: [Theme; 6] = [
    theme(1, "Klasik", "Açık zemin, yeşil vurgu, yuvarlak profil fotoğrafı", "classic", include_str!("../../assets/themes/classic.css")),
    theme(2, "Gece", "Koyu lacivert zemin, mavi vurgu", "midnight", include_str!("../../assets/themes/midnight.css")),
    theme(3, "Sade", "Beyaz zemin, çizgisel bölümler", "minimal", include_str!("../../assets/themes/minimal.css")),
    theme(4, "Kurumsal", "Lacivert başlık bandı, keskin köşeler", "corporate", include_str!("../../assets/themes/corporate.css")),
    theme(5, "Gün Batımı", "Turuncu-pembe degrade, cam efektli paneller", "sunset", include_str!("../../assets/themes/sunset.css")),
    theme(6, "Zarif", "Krem zemin, serif yazı, altın vurgu", "elegant", include_str!("../../assets/themes/elegant.css")),
];

static CATALOG: Lazy<Vec<TemplateMeta>> = Lazy::new(|| THEMES.iter().map(|t| t.meta).collect());

const BASE_CSS: &str = include_str!("../../assets/themes/base.css");

const CARD: &str = "card";
const QR_PAGE: &str = "qr_page";
const QR_MINIMAL: &str = "qr_minimal";
const INQUIRY_EMAIL: &str = "inquiry_email";

const TEMPLATES: &[(&str, &str)] = &[
    (CARD, include_str!("../../assets/templates/card.hbs")),
    (QR_PAGE, include_str!("../../assets/templates/qr_page.hbs")),
    (QR_MINIMAL, include_str!("../../assets/templates/qr_minimal.hbs")),
    (INQUIRY_EMAIL, include_str!("../../assets/templates/inquiry_email.hbs")),
];

const PARTIALS: &[(&str, &str)] = &[
    ("contact_list", include_str!("../../assets/templates/partials/contact_list.hbs")),
    ("social_icons", include_str!("../../assets/templates/partials/social_icons.hbs")),
    ("bank_accounts", include_str!("../../assets/templates/partials/bank_accounts.hbs")),
    ("about", include_str!("../../assets/templates/partials/about.hbs")),
];

static STYLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<style[^>]*>(.*?)</style>").expect("style regex"));

/// Concatenated contents of every `<style>` block, in document order.
pub fn extract_styles(html: &str) -> String {
    STYLE_RE
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Serialize)]
struct CardPage<'a> {
    card: &'a CardView,
    theme: &'a TemplateMeta,
    base_css: &'static str,
    theme_css: &'static str,
}

#[derive(Debug, Serialize)]
pub struct QrPage {
    pub firma_adi: String,
    pub firma_logo: Option<String>,
    pub public_url: String,
    pub qr_data_url: String,
    pub theme_style: String,
    /// `<style>` contents lifted from the company's rendered card.
    pub styles: String,
}

#[derive(Debug, Serialize)]
pub struct InquiryEmail {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub package_name: Option<String>,
    pub message: Option<String>,
    pub sent_at: String,
}

pub struct TemplateRegistry {
    hb: Handlebars<'static>,
}

impl std::fmt::Debug for TemplateRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateRegistry").field("templates", &CATALOG.len()).finish()
    }
}

fn render_err(e: handlebars::RenderError) -> AppError {
    AppError::Template(e.to_string())
}

impl TemplateRegistry {
    /// Compiles every layout and partial; a broken asset fails startup.
    pub fn new() -> Result<Self, AppError> {
        let mut hb = Handlebars::new();
        for (name, src) in PARTIALS {
            hb.register_partial(name, *src)
                .map_err(|e| AppError::Template(format!("partial {}: {}", name, e)))?;
        }
        for (name, src) in TEMPLATES {
            hb.register_template_string(name, *src)
                .map_err(|e| AppError::Template(format!("template {}: {}", name, e)))?;
        }
        Ok(TemplateRegistry { hb })
    }

    pub fn list(&self) -> &'static [TemplateMeta] {
        &CATALOG
    }

    pub fn get(&self, id: i32) -> Option<&'static TemplateMeta> {
        THEMES.iter().find(|t| t.meta.id == id).map(|t| &t.meta)
    }

    pub fn exists(&self, id: i32) -> bool {
        self.get(id).is_some()
    }

    /// Unknown ids fall back to the default template.
    pub fn resolve_id(&self, id: i32) -> i32 {
        if self.exists(id) {
            id
        } else {
            DEFAULT_TEMPLATE_ID
        }
    }

    fn theme(&self, id: i32) -> &'static Theme {
        let id = self.resolve_id(id);
        THEMES.iter().find(|t| t.meta.id == id).unwrap_or(&THEMES[0])
    }

    pub fn render_company(&self, view: &CardView) -> Result<String, AppError> {
        let theme = self.theme(view.template_id);
        if theme.meta.id != view.template_id {
            tracing::warn!(slug = %view.slug, template_id = view.template_id, "unknown template, using default");
        }
        let page = CardPage {
            card: view,
            theme: &theme.meta,
            base_css: BASE_CSS,
            theme_css: theme.css,
        };
        self.hb.render(CARD, &page).map_err(render_err)
    }

    /// Same layout as the live page, fed with mock company data.
    pub fn render_preview(&self, template_id: i32, base_url: &str) -> Result<String, AppError> {
        if !self.exists(template_id) {
            return Err(AppError::NotFound(format!("template {}", template_id)));
        }
        let mut company = super::mock_company();
        company.record.template_id = template_id;
        self.render_company(&CardView::from_company(&company, base_url))
    }

    pub fn render_qr_page(&self, page: &QrPage) -> Result<String, AppError> {
        self.hb.render(QR_PAGE, page).map_err(render_err)
    }

    /// Generic QR page that does not depend on the company's template. Never fails.
    pub fn render_minimal_qr_page(&self, title: &str, public_url: &str, qr_data_url: Option<&str>) -> String {
        let data = serde_json::json!({
            "title": title,
            "public_url": public_url,
            "qr_data_url": qr_data_url,
        });
        match self.hb.render(QR_MINIMAL, &data) {
            Ok(html) => html,
            Err(e) => {
                tracing::error!(error = %e, "minimal qr page render failed");
                format!(
                    "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>QR Kod</title></head><body><p><a href=\"{0}\">{0}</a></p></body></html>",
                    handlebars::html_escape(public_url)
                )
            }
        }
    }

    pub fn render_inquiry_email(&self, mail: &InquiryEmail) -> Result<String, AppError> {
        self.hb.render(INQUIRY_EMAIL, mail).map_err(render_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::mock_company;

    fn registry() -> TemplateRegistry {
        TemplateRegistry::new().unwrap()
    }

    fn body_of(html: &str) -> &str {
        &html[html.find("<body").unwrap()..]
    }

    #[test]
    fn catalog_ids_are_unique_and_default_exists() {
        let reg = registry();
        let mut ids: Vec<i32> = reg.list().iter().map(|t| t.id).collect();
        ids.dedup();
        assert_eq!(ids.len(), THEMES.len());
        assert!(reg.exists(DEFAULT_TEMPLATE_ID));
        assert_eq!(reg.resolve_id(999), DEFAULT_TEMPLATE_ID);
        assert_eq!(reg.resolve_id(4), 4);
    }

    #[test]
    fn full_company_renders_every_section() {
        let reg = registry();
        let html = reg
            .render_company(&CardView::from_company(&mock_company(), "https://kartvizit.test"))
            .unwrap();
        assert!(html.contains("theme-classic"));
        let html = body_of(&html);
        assert!(html.contains("card-contacts"));
        assert!(html.contains("card-social"));
        assert!(html.contains("card-banks"));
        assert!(html.contains("card-about"));
        assert!(html.contains("TR33 0006 1005 1978 6457 8413 26"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn empty_optional_fields_drop_their_sections() {
        let reg = registry();
        let mut company = mock_company();
        company.record.profile = Default::default();
        company.communication.clear();
        company.social_media.clear();
        company.bank_accounts.clear();
        let html = reg
            .render_company(&CardView::from_company(&company, "https://kartvizit.test"))
            .unwrap();
        let body = body_of(&html);
        for section in ["card-contacts", "card-social", "card-banks", "card-about", "card-tax", "card-photo", "card-logo", "Katalog"] {
            assert!(!body.contains(section), "{} should be omitted", section);
        }
        assert!(!body.contains("{{"));
        assert!(!body.contains("}}"));
    }

    #[test]
    fn values_are_html_escaped() {
        let reg = registry();
        let mut company = mock_company();
        company.record.firma_adi = "<script>alert(1)</script>".into();
        let html = reg
            .render_company(&CardView::from_company(&company, "https://kartvizit.test"))
            .unwrap();
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn preview_uses_requested_theme_and_rejects_unknown() {
        let reg = registry();
        let html = reg.render_preview(2, "https://kartvizit.test").unwrap();
        assert!(html.contains("theme-midnight"));
        assert!(matches!(reg.render_preview(42, "x"), Err(AppError::NotFound(_))));
    }

    #[test]
    fn styles_are_extracted_in_order() {
        let html = "<head><style>a{}</style><STYLE media=\"x\">\nb{}\n</STYLE></head>";
        assert_eq!(extract_styles(html), "a{}\nb{}");
        assert_eq!(extract_styles("<p>none</p>"), "");
    }

    #[test]
    fn minimal_qr_page_embeds_image() {
        let html = registry().render_minimal_qr_page("Acme", "https://k.test/acme", Some("data:image/svg+xml;base64,AA"));
        assert!(html.contains("<img src=\"data:image/svg+xml;base64,AA\""));
    }
}
