//! QR codes as SVG and as `data:` URLs.

use crate::error::AppError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};

pub const QR_DATA_URL_PREFIX: &str = "data:image/svg+xml;base64,";

pub fn qr_svg(content: &str) -> Result<String, AppError> {
    let code = QrCode::with_error_correction_level(content.as_bytes(), EcLevel::M)
        .map_err(|e| AppError::Internal(format!("qr encode: {}", e)))?;
    Ok(code
        .render::<svg::Color>()
        .min_dimensions(256, 256)
        .quiet_zone(true)
        .dark_color(svg::Color("#000000"))
        .light_color(svg::Color("#ffffff"))
        .build())
}

pub fn qr_data_url(content: &str) -> Result<String, AppError> {
    let svg = qr_svg(content)?;
    Ok(format!("{}{}", QR_DATA_URL_PREFIX, STANDARD.encode(svg)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_wraps_base64_svg() {
        let url = qr_data_url("https://kartvizit.test/acme").unwrap();
        let payload = url.strip_prefix(QR_DATA_URL_PREFIX).unwrap();
        let svg = String::from_utf8(STANDARD.decode(payload).unwrap()).unwrap();
        assert!(svg.contains("<svg"));
    }
}
