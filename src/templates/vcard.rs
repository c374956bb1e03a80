//! vCard 3.0 export of a company card.

use crate::models::Company;

fn escape(v: &str) -> String {
    let mut out = String::with_capacity(v.len());
    for c in v.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}

/// Lines longer than 75 octets are folded with CRLF + space, never inside a UTF-8 sequence.
fn fold(line: &str) -> String {
    if line.len() <= 75 {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + line.len() / 74 * 3);
    let mut width = 0;
    for c in line.chars() {
        if width + c.len_utf8() > 75 {
            out.push_str("\r\n ");
            width = 1;
        }
        out.push(c);
        width += c.len_utf8();
    }
    out
}

fn absolute(url: &str, base: &str) -> String {
    if url.starts_with('/') {
        format!("{}{}", base.trim_end_matches('/'), url)
    } else {
        url.to_string()
    }
}

/// Splits "Ad Soyad" into (family, given); a single word is the given name.
fn split_name(full: &str) -> (String, String) {
    let full = full.trim();
    match full.rsplit_once(' ') {
        Some((given, family)) => (family.trim().to_string(), given.trim().to_string()),
        None => (String::new(), full.to_string()),
    }
}

pub fn build_vcard(company: &Company, base_url: &str) -> String {
    let r = &company.record;
    let p = &r.profile;
    let person = p.yetkili_adi.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let mut lines: Vec<String> = vec!["BEGIN:VCARD".into(), "VERSION:3.0".into()];

    match person {
        Some(name) => {
            let (family, given) = split_name(name);
            lines.push(format!("N:{};{};;;", escape(&family), escape(&given)));
            lines.push(format!("FN:{}", escape(name)));
        }
        None => {
            lines.push(format!("N:{};;;;", escape(&r.firma_adi)));
            lines.push(format!("FN:{}", escape(&r.firma_adi)));
        }
    }
    lines.push(format!("ORG:{}", escape(&r.firma_adi)));
    if let Some(title) = p.yetkili_pozisyon.as_deref().filter(|s| !s.trim().is_empty()) {
        lines.push(format!("TITLE:{}", escape(title)));
    }

    let mut contacts: Vec<_> = company.communication.iter().filter(|c| c.aktif).collect();
    contacts.sort_by_key(|c| (c.sira, c.id));
    for c in contacts {
        let v = escape(c.deger.trim());
        if v.is_empty() {
            continue;
        }
        let line = match c.tip.as_str() {
            "telefon" => format!("TEL;TYPE=WORK,VOICE:{}", v),
            "gsm" | "whatsapp" => format!("TEL;TYPE=CELL:{}", v),
            "fax" => format!("TEL;TYPE=WORK,FAX:{}", v),
            "email" => format!("EMAIL;TYPE=INTERNET:{}", v),
            "website" => format!("URL:{}", v),
            "adres" => format!("ADR;TYPE=WORK:;;{};;;;", v),
            _ => continue,
        };
        lines.push(line);
    }

    let mut social: Vec<_> = company.social_media.iter().filter(|s| s.aktif).collect();
    social.sort_by_key(|s| (s.sira, s.id));
    for s in social {
        lines.push(format!("X-SOCIALPROFILE;TYPE={}:{}", escape(&s.platform), escape(&s.url)));
    }

    lines.push(format!("URL:{}/{}", base_url.trim_end_matches('/'), r.slug));
    if let Some(about) = p.firma_hakkinda.as_deref().filter(|s| !s.trim().is_empty()) {
        lines.push(format!("NOTE:{}", escape(about.trim())));
    }
    if let Some(photo) = p.profil_foto.as_deref().or(p.firma_logo.as_deref()).filter(|s| !s.is_empty()) {
        lines.push(format!("PHOTO;VALUE=URI:{}", absolute(photo, base_url)));
    }
    lines.push("END:VCARD".into());

    let mut out = lines.iter().map(|l| fold(l)).collect::<Vec<_>>().join("\r\n");
    out.push_str("\r\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::mock_company;

    #[test]
    fn vcard_has_identity_and_contacts() {
        let card = build_vcard(&mock_company(), "https://kartvizit.test");
        assert!(card.starts_with("BEGIN:VCARD\r\nVERSION:3.0\r\n"));
        assert!(card.contains("N:Yılmaz;Ayşe;;;"));
        assert!(card.contains("ORG:Örnek Teknoloji A.Ş."));
        assert!(card.contains("TEL;TYPE=WORK,VOICE:+90 212 555 00 00"));
        assert!(card.contains("EMAIL;TYPE=INTERNET:info@ornek.com.tr"));
        assert!(card.contains("URL:https://kartvizit.test/ornek-teknoloji"));
        assert!(card.ends_with("END:VCARD\r\n"));
    }

    #[test]
    fn escapes_and_folds() {
        assert_eq!(escape("a,b;c\nd"), "a\\,b\\;c\\nd");
        let long = format!("NOTE:{}", "ş".repeat(60));
        for segment in fold(&long).split("\r\n") {
            assert!(segment.len() <= 75);
        }
    }
}
