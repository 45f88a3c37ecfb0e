//! Phone number normalization for each transport.
//!
//! Both transports assume a single home country. Numbers written with the
//! national trunk prefix `0` are rewritten into international form.

/// Rewrite `number` into the `+<cc><subscriber>` form the short-message API
/// expects.
pub fn normalize_for_sms(number: &str, country_code: &str) -> String {
    if let Some(rest) = number.strip_prefix('0') {
        format!("+{}{}", country_code, rest)
    } else if number.starts_with('+') {
        number.to_string()
    } else {
        format!("+{}{}", country_code, number)
    }
}

/// Rewrite `number` into the bare `<cc><subscriber>` form used by WhatsApp
/// deep links, which take no leading `+`.
pub fn normalize_for_whatsapp(number: &str, country_code: &str) -> String {
    if let Some(rest) = number.strip_prefix('+') {
        rest.to_string()
    } else if let Some(rest) = number.strip_prefix('0') {
        format!("{}{}", country_code, rest)
    } else if number.starts_with(country_code) {
        number.to_string()
    } else {
        format!("{}{}", country_code, number)
    }
}
