//! Request validation from per-column rules and shared field formats.

use crate::config::ValidationRule;
use crate::error::ValidationErrors;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));

pub struct RequestValidator;

impl RequestValidator {
    /// Validate body against per-column rules. All required fields must be present.
    pub fn validate(body: &HashMap<String, Value>, rules: &HashMap<String, ValidationRule>) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        for (col, rule) in rules {
            let val = body.get(col);
            if rule.required == Some(true) && val.map(is_blank).unwrap_or(true) {
                errors.add(col.as_str(), "is required");
                continue;
            }
            if let Some(v) = val {
                if let Err(msg) = validate_field(v, rule) {
                    errors.add(col.as_str(), msg);
                }
            }
        }
        errors
    }

    /// Validate only the fields present in body (for PUT). Required fields may be omitted but not blanked.
    pub fn validate_partial(body: &HashMap<String, Value>, rules: &HashMap<String, ValidationRule>) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        for (col, v) in body {
            if let Some(rule) = rules.get(col) {
                if rule.required == Some(true) && is_blank(v) {
                    errors.add(col.as_str(), "is required");
                    continue;
                }
                if let Err(msg) = validate_field(v, rule) {
                    errors.add(col.as_str(), msg);
                }
            }
        }
        errors
    }
}

fn is_blank(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn validate_field(v: &Value, rule: &ValidationRule) -> Result<(), String> {
    if v.is_null() {
        return Ok(());
    }
    if let Some(format) = &rule.format {
        if let Some(s) = v.as_str() {
            validate_format(s, format)?;
        }
    }
    if let Some(s) = v.as_str() {
        let len = s.chars().count();
        if let Some(max) = rule.max_length {
            if len > max as usize {
                return Err(format!("must be at most {} characters", max));
            }
        }
        if let Some(min) = rule.min_length {
            if len < min as usize {
                return Err(format!("must be at least {} characters", min));
            }
        }
        if let Some(ref pattern) = rule.pattern {
            let re = Regex::new(pattern).map_err(|_| "has an invalid pattern rule".to_string())?;
            if !re.is_match(s) {
                return Err("does not match required pattern".into());
            }
        }
    }
    if let Some(ref allowed) = rule.allowed {
        if !allowed.iter().any(|a| value_eq(v, a)) {
            let names: Vec<String> = allowed
                .iter()
                .map(|a| a.as_str().map(String::from).unwrap_or_else(|| a.to_string()))
                .collect();
            return Err(format!("must be one of: {}", names.join(", ")));
        }
    }
    if let Some(n) = v.as_f64() {
        if let Some(min) = rule.minimum {
            if n < min {
                return Err(format!("must be at least {}", min));
            }
        }
        if let Some(max) = rule.maximum {
            if n > max {
                return Err(format!("must be at most {}", max));
            }
        }
    }
    Ok(())
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        _ => a == b,
    }
}

fn validate_format(s: &str, format: &str) -> Result<(), String> {
    match format.to_lowercase().as_str() {
        "email" if !is_email(s) => Err("must be a valid email".into()),
        "url" if !is_url(s) => Err("must be an http(s) URL or a site path".into()),
        _ => Ok(()),
    }
}

pub fn is_email(s: &str) -> bool {
    s.len() <= 254 && EMAIL_RE.is_match(s)
}

/// Absolute http(s) URL with a host, or a site-relative path such as `/uploads/1/logo.png`.
pub fn is_url(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    if let Some(path) = s.strip_prefix('/') {
        return !path.starts_with('/');
    }
    let rest = s
        .strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"));
    match rest {
        Some(r) => r.split(['/', '?', '#']).next().map(|host| !host.is_empty()).unwrap_or(false),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContentKind;
    use serde_json::json;

    fn body(v: Value) -> HashMap<String, Value> {
        v.as_object().unwrap().clone().into_iter().collect()
    }

    #[test]
    fn collects_every_failing_field() {
        let rules = &ContentKind::Testimonials.entity().validation;
        let errors = RequestValidator::validate(&body(json!({ "rating": 9, "avatar_url": "ftp://x" })), rules);
        assert_eq!(errors.get("name"), Some("is required"));
        assert_eq!(errors.get("content"), Some("is required"));
        assert_eq!(errors.get("rating"), Some("must be at most 5"));
        assert!(errors.get("avatar_url").is_some());
    }

    #[test]
    fn partial_ignores_missing_required_but_not_blank() {
        let rules = &ContentKind::Faqs.entity().validation;
        assert!(RequestValidator::validate_partial(&body(json!({ "active": false })), rules).is_empty());
        let errors = RequestValidator::validate_partial(&body(json!({ "question": "  " })), rules);
        assert_eq!(errors.get("question"), Some("is required"));
    }

    #[test]
    fn allowed_values_are_listed() {
        let rules = &ContentKind::SocialMedia.entity().validation;
        let errors = RequestValidator::validate(&body(json!({ "platform": "myspace", "url": "https://a.b" })), rules);
        assert!(errors.get("platform").unwrap().starts_with("must be one of: instagram"));
    }

    #[test]
    fn url_and_email_formats() {
        assert!(is_url("https://acme.test/a?b"));
        assert!(is_url("/uploads/1/logo.png"));
        assert!(!is_url("//evil.test"));
        assert!(!is_url("javascript:alert(1)"));
        assert!(!is_url("https://"));
        assert!(is_email("info@acme.com.tr"));
        assert!(!is_email("info@acme"));
    }
}
