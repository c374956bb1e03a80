//! IBAN normalisation and ISO 13616 mod-97 check.

/// Spaces removed, uppercased.
pub fn normalize_iban(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Expects a normalised IBAN.
pub fn validate_iban(iban: &str) -> Result<(), &'static str> {
    if iban.len() < 15 || iban.len() > 34 {
        return Err("must be between 15 and 34 characters");
    }
    if !iban.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
        return Err("may only contain letters and digits");
    }
    let bytes = iban.as_bytes();
    if !bytes[..2].iter().all(u8::is_ascii_uppercase) || !bytes[2..4].iter().all(u8::is_ascii_digit) {
        return Err("must start with a country code and check digits");
    }
    if iban.starts_with("TR") && iban.len() != 26 {
        return Err("Turkish IBANs have 26 characters");
    }
    // move the first four characters to the end, letters become 10..35, remainder must be 1
    let remainder = iban[4..].bytes().chain(iban[..4].bytes()).fold(0u32, |acc, b| {
        if b.is_ascii_digit() {
            (acc * 10 + u32::from(b - b'0')) % 97
        } else {
            (acc * 100 + u32::from(b - b'A' + 10)) % 97
        }
    });
    if remainder == 1 {
        Ok(())
    } else {
        Err("has an invalid checksum")
    }
}
