//! Business operations behind the HTTP handlers.

pub mod company;
pub mod content;
pub mod pages;
mod validation;

pub use company::{CompanyInput, CompanyService, CONTACT_TYPES};
pub use content::ContentService;
pub use pages::{CardRenderer, ICON_ORDER_NAMESPACE};
pub use validation::{is_email, is_url, RequestValidator};
