//! Content entity descriptors: flat, ordered, admin-editable homepage records.
//! Each kind is described as data (table, columns, validation) and served by one generic CRUD path.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;

/// PostgreSQL column type as used for binding and decoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    BigInt,
    Int,
    Text,
    Bool,
    Double,
    Jsonb,
    Timestamptz,
}

impl ColumnType {
    pub fn pg_name(&self) -> &'static str {
        match self {
            ColumnType::BigInt => "bigint",
            ColumnType::Int => "integer",
            ColumnType::Text => "text",
            ColumnType::Bool => "boolean",
            ColumnType::Double => "double precision",
            ColumnType::Jsonb => "jsonb",
            ColumnType::Timestamptz => "timestamptz",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    pub name: &'static str,
    pub ty: ColumnType,
    /// Accepted in create/update bodies. Ids and timestamps are server-managed.
    pub writable: bool,
    pub nullable: bool,
    /// Value used on insert when the body omits the column.
    pub default: Option<Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationRule {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
}

impl ValidationRule {
    fn required() -> Self {
        ValidationRule {
            required: Some(true),
            ..Default::default()
        }
    }

    fn max_length(mut self, n: u32) -> Self {
        self.max_length = Some(n);
        self
    }

    fn format(mut self, f: &str) -> Self {
        self.format = Some(f.to_string());
        self
    }

    fn allowed(mut self, values: &[&str]) -> Self {
        self.allowed = Some(values.iter().map(|v| Value::String((*v).to_string())).collect());
        self
    }

    fn range(mut self, min: f64, max: Option<f64>) -> Self {
        self.minimum = Some(min);
        self.maximum = max;
        self
    }
}

/// The content kinds exposed under `/api/settings/<path>`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Testimonials,
    Faqs,
    SliderImages,
    SocialMedia,
    Packages,
}

impl ContentKind {
    pub const ALL: [ContentKind; 5] = [
        ContentKind::Testimonials,
        ContentKind::Faqs,
        ContentKind::SliderImages,
        ContentKind::SocialMedia,
        ContentKind::Packages,
    ];

    pub fn from_path(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.path_segment() == segment)
    }

    pub fn path_segment(&self) -> &'static str {
        match self {
            ContentKind::Testimonials => "testimonials",
            ContentKind::Faqs => "faqs",
            ContentKind::SliderImages => "slider-images",
            ContentKind::SocialMedia => "social-media",
            ContentKind::Packages => "packages",
        }
    }

    pub fn entity(&self) -> &'static ContentEntity {
        &ENTITIES[*self as usize]
    }
}

#[derive(Clone, Debug)]
pub struct ContentEntity {
    pub kind: ContentKind,
    pub table_name: &'static str,
    pub columns: Vec<ColumnInfo>,
    pub validation: HashMap<String, ValidationRule>,
    /// Human label used in messages, e.g. "testimonial".
    pub label: &'static str,
}

impl ContentEntity {
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }
}

pub const SOCIAL_PLATFORMS: &[&str] = &[
    "instagram", "facebook", "x", "twitter", "linkedin", "youtube", "tiktok", "telegram", "pinterest", "github",
    "whatsapp", "other",
];

fn managed_columns() -> Vec<ColumnInfo> {
    vec![
        col("id", ColumnType::BigInt, false, false, None),
        col("display_order", ColumnType::Int, true, false, None),
        col("active", ColumnType::Bool, true, false, Some(json!(true))),
        col("created_at", ColumnType::Timestamptz, false, false, None),
        col("updated_at", ColumnType::Timestamptz, false, false, None),
    ]
}

fn col(name: &'static str, ty: ColumnType, writable: bool, nullable: bool, default: Option<Value>) -> ColumnInfo {
    ColumnInfo {
        name,
        ty,
        writable,
        nullable,
        default,
    }
}

fn text(name: &'static str) -> ColumnInfo {
    col(name, ColumnType::Text, true, true, None)
}

fn build(
    kind: ContentKind,
    table_name: &'static str,
    label: &'static str,
    fields: Vec<ColumnInfo>,
    rules: Vec<(&str, ValidationRule)>,
) -> ContentEntity {
    let mut columns = managed_columns();
    // user columns sit between id and the bookkeeping columns so SELECT lists read naturally
    let tail = columns.split_off(1);
    columns.extend(fields);
    columns.extend(tail);
    let mut validation: HashMap<String, ValidationRule> =
        rules.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    validation.insert(
        "display_order".into(),
        ValidationRule::default().range(0.0, None),
    );
    ContentEntity {
        kind,
        table_name,
        columns,
        validation,
        label,
    }
}

// indexed by `ContentKind as usize`, so the order must follow the enum
static ENTITIES: Lazy<[ContentEntity; 5]> = Lazy::new(|| {
    [
        build(
            ContentKind::Testimonials,
            "testimonials",
            "testimonial",
            vec![
                text("name"),
                text("title"),
                text("content"),
                text("avatar_url"),
                col("rating", ColumnType::Int, true, true, Some(json!(5))),
            ],
            vec![
                ("name", ValidationRule::required().max_length(120)),
                ("title", ValidationRule::default().max_length(120)),
                ("content", ValidationRule::required().max_length(2000)),
                ("avatar_url", ValidationRule::default().max_length(500).format("url")),
                ("rating", ValidationRule::default().range(1.0, Some(5.0))),
            ],
        ),
        build(
            ContentKind::Faqs,
            "faqs",
            "faq",
            vec![text("question"), text("answer"), text("category")],
            vec![
                ("question", ValidationRule::required().max_length(300)),
                ("answer", ValidationRule::required().max_length(5000)),
                ("category", ValidationRule::default().max_length(100)),
            ],
        ),
        build(
            ContentKind::SliderImages,
            "slider_images",
            "slider image",
            vec![text("title"), text("subtitle"), text("image_url"), text("link_url")],
            vec![
                ("title", ValidationRule::default().max_length(200)),
                ("subtitle", ValidationRule::default().max_length(300)),
                ("image_url", ValidationRule::required().max_length(500).format("url")),
                ("link_url", ValidationRule::default().max_length(500).format("url")),
            ],
        ),
        build(
            ContentKind::SocialMedia,
            "social_media_settings",
            "social media link",
            vec![text("platform"), text("url"), text("icon")],
            vec![
                ("platform", ValidationRule::required().allowed(SOCIAL_PLATFORMS)),
                ("url", ValidationRule::required().max_length(500).format("url")),
                ("icon", ValidationRule::default().max_length(100)),
            ],
        ),
        build(
            ContentKind::Packages,
            "packages",
            "package",
            vec![
                text("name"),
                text("description"),
                col("price", ColumnType::Double, true, true, Some(json!(0.0))),
                col("currency", ColumnType::Text, true, false, Some(json!("TRY"))),
                col("period", ColumnType::Text, true, true, Some(json!("yearly"))),
                col("features", ColumnType::Jsonb, true, false, Some(json!([]))),
                col("highlighted", ColumnType::Bool, true, false, Some(json!(false))),
            ],
            vec![
                ("name", ValidationRule::required().max_length(120)),
                ("description", ValidationRule::default().max_length(2000)),
                ("price", ValidationRule::default().range(0.0, None)),
                ("currency", ValidationRule::default().allowed(&["TRY", "USD", "EUR"])),
                ("period", ValidationRule::default().allowed(&["monthly", "yearly", "once"])),
            ],
        ),
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_round_trips_through_its_path() {
        for kind in ContentKind::ALL {
            assert_eq!(ContentKind::from_path(kind.path_segment()), Some(kind));
            assert_eq!(kind.entity().kind, kind);
        }
        assert_eq!(ContentKind::from_path("users"), None);
    }

    #[test]
    fn descriptors_carry_ordering_columns() {
        let e = ContentKind::Faqs.entity();
        assert_eq!(e.columns[0].name, "id");
        assert!(e.column("display_order").map(|c| c.writable).unwrap_or(false));
        assert!(e.column("active").is_some());
        assert!(!e.column("created_at").map(|c| c.writable).unwrap_or(true));
        assert_eq!(e.columns.last().map(|c| c.name), Some("updated_at"));
    }
}
