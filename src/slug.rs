//! Slug rules for public card URLs: derive from a company name, validate user input.

/// Route segments a company slug may never shadow.
pub const RESERVED_SLUGS: &[&str] = &["api", "uploads", "health", "ready", "version", "info", "admin", "static"];

pub const MIN_SLUG_LEN: usize = 2;
pub const MAX_SLUG_LEN: usize = 100;

/// Transliterate Turkish letters, lowercase, and collapse everything else into single hyphens.
/// e.g. "Çağrı Şık Ltd. Şti." -> "cagri-sik-ltd-sti"
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_hyphen = false;
    for c in s.chars() {
        let mapped = match c {
            'ç' | 'Ç' => Some('c'),
            'ğ' | 'Ğ' => Some('g'),
            'ı' | 'I' | 'İ' | 'i' => Some('i'),
            'ö' | 'Ö' => Some('o'),
            'ş' | 'Ş' => Some('s'),
            'ü' | 'Ü' => Some('u'),
            c if c.is_ascii_alphanumeric() => Some(c.to_ascii_lowercase()),
            _ => None,
        };
        match mapped {
            Some(m) => {
                if pending_hyphen && !out.is_empty() {
                    out.push('-');
                }
                pending_hyphen = false;
                out.push(m);
            }
            None => pending_hyphen = true,
        }
        if out.len() >= MAX_SLUG_LEN {
            break;
        }
    }
    out.truncate(MAX_SLUG_LEN);
    out.trim_end_matches('-').to_string()
}

/// `base-n`, shortening `base` so the result stays within `MAX_SLUG_LEN`.
pub fn with_suffix(base: &str, n: u32) -> String {
    let suffix = format!("-{}", n);
    let keep = MAX_SLUG_LEN.saturating_sub(suffix.len());
    let head: String = base.chars().take(keep).collect();
    format!("{}{}", head.trim_end_matches('-'), suffix)
}

/// Returns a human-readable reason when `slug` is not acceptable.
pub fn validate_slug(slug: &str) -> Result<(), &'static str> {
    if slug.len() < MIN_SLUG_LEN {
        return Err("must be at least 2 characters");
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err("must be at most 100 characters");
    }
    if !slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return Err("may only contain lowercase letters, digits and hyphens");
    }
    if slug.starts_with('-') || slug.ends_with('-') || slug.contains("--") {
        return Err("hyphens must separate words");
    }
    if RESERVED_SLUGS.contains(&slug) {
        return Err("is reserved");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_transliterates_turkish() {
        assert_eq!(slugify("Çağrı Şık Ltd. Şti."), "cagri-sik-ltd-sti");
        assert_eq!(slugify("  Öz Ürün  "), "oz-urun");
        assert_eq!(slugify("İstanbul Işık"), "istanbul-isik");
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("a -- b__c"), "a-b-c");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn validate_rejects_bad_slugs() {
        assert!(validate_slug("acme").is_ok());
        assert!(validate_slug("acme-2").is_ok());
        assert!(validate_slug("a").is_err());
        assert!(validate_slug("Acme").is_err());
        assert!(validate_slug("acme--co").is_err());
        assert!(validate_slug("-acme").is_err());
        assert_eq!(validate_slug("api"), Err("is reserved"));
    }

    #[test]
    fn suffix_keeps_slugs_within_the_length_limit() {
        assert_eq!(with_suffix("acme", 2), "acme-2");
        let long = slugify(&"a".repeat(150));
        assert_eq!(long.len(), MAX_SLUG_LEN);
        let suffixed = with_suffix(&long, 5);
        assert_eq!(suffixed.len(), MAX_SLUG_LEN);
        assert!(validate_slug(&suffixed).is_ok());
        // a hyphen left at the cut is dropped
        let cut = format!("{}-b", "a".repeat(97));
        assert_eq!(with_suffix(&cut, 2), format!("{}-2", "a".repeat(97)));
    }
}
