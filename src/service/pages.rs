//! Company page rendering shared by the public routes and the post-processing snapshot task.

use crate::error::AppError;
use crate::models::Company;
use crate::store::SettingsStore;
use crate::templates::{extract_styles, qr_data_url, qr_svg, CardView, QrPage, TemplateRegistry, QR_DATA_URL_PREFIX};
use serde_json::Value;
use std::sync::Arc;

/// Settings namespace for per-company contact icon order, keyed by company id.
pub const ICON_ORDER_NAMESPACE: &str = "icon-order";

#[derive(Clone)]
pub struct CardRenderer {
    templates: Arc<TemplateRegistry>,
    store: SettingsStore,
    base_url: String,
}

/// Contact type names from a stored icon-order value; anything else is dropped.
pub fn parse_icon_order(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(|v| v.as_str()).map(String::from).collect())
        .unwrap_or_default()
}

impl CardRenderer {
    pub fn new(templates: Arc<TemplateRegistry>, store: SettingsStore, base_url: impl Into<String>) -> Self {
        CardRenderer {
            templates,
            store,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn templates(&self) -> &TemplateRegistry {
        &self.templates
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn public_url(&self, slug: &str) -> String {
        format!("{}/{}", self.base_url, slug)
    }

    /// Saved icon order; a store failure only costs the custom ordering.
    pub async fn icon_order(&self, firma_id: i64) -> Vec<String> {
        match self.store.get(ICON_ORDER_NAMESPACE, &firma_id.to_string()).await {
            Ok(Some(v)) => parse_icon_order(&v),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(firma_id, error = %e, "icon order unavailable");
                Vec::new()
            }
        }
    }

    pub async fn view(&self, company: &Company) -> CardView {
        let order = self.icon_order(company.id()).await;
        CardView::from_company(company, &self.base_url).with_icon_order(&order)
    }

    pub async fn render_card(&self, company: &Company) -> Result<String, AppError> {
        let view = self.view(company).await;
        self.templates.render_company(&view)
    }

    /// The stored QR data URL when it is one of ours, otherwise a freshly encoded one.
    pub fn qr_data_url(&self, company: &Company) -> Result<String, AppError> {
        match company.record.qr_code_data.as_deref() {
            Some(stored) if stored.starts_with(QR_DATA_URL_PREFIX) => Ok(stored.to_string()),
            _ => qr_data_url(&self.public_url(company.slug())),
        }
    }

    pub fn qr_svg(&self, company: &Company) -> Result<String, AppError> {
        qr_svg(&self.public_url(company.slug()))
    }

    /// QR page styled like the company's card. Never fails: any error yields the minimal page.
    pub async fn render_qr_page(&self, company: &Company) -> String {
        let public_url = self.public_url(company.slug());
        let data_url = match self.qr_data_url(company) {
            Ok(u) => u,
            Err(e) => {
                tracing::error!(slug = %company.slug(), error = %e, "qr encoding failed");
                return self
                    .templates
                    .render_minimal_qr_page(&company.record.firma_adi, &public_url, None);
            }
        };
        match self.styled_qr_page(company, &public_url, &data_url).await {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!(slug = %company.slug(), error = %e, "styled qr page failed, using minimal page");
                self.templates
                    .render_minimal_qr_page(&company.record.firma_adi, &public_url, Some(&data_url))
            }
        }
    }

    async fn styled_qr_page(&self, company: &Company, public_url: &str, data_url: &str) -> Result<String, AppError> {
        let card = self.render_card(company).await?;
        let theme = self
            .templates
            .get(self.templates.resolve_id(company.record.template_id))
            .map(|t| t.style)
            .unwrap_or("classic");
        self.templates.render_qr_page(&QrPage {
            firma_adi: company.record.firma_adi.clone(),
            firma_logo: company.record.profile.firma_logo.clone(),
            public_url: public_url.to_string(),
            qr_data_url: data_url.to_string(),
            theme_style: theme.to_string(),
            styles: extract_styles(&card),
        })
    }
}
