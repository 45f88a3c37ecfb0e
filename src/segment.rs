//! Splitting message bodies into SMS segments.
//!
//! A body that fits entirely in the GSM 03.38 default alphabet is measured in
//! septets; anything else is sent as UCS-2 and measured in UTF-16 code units.
//! Multipart messages lose room in every part to the concatenation header.

pub const GSM_SINGLE_LIMIT: usize = 160;
pub const GSM_PART_LIMIT: usize = 153;
pub const UCS2_SINGLE_LIMIT: usize = 70;
pub const UCS2_PART_LIMIT: usize = 67;

const GSM_BASIC: &str = "@£$¥èéùìòÇ\nØø\rÅåΔ_ΦΓΛΩΠΨΣΘΞÆæßÉ !\"#¤%&'()*+,-./0123456789:;<=>?\
¡ABCDEFGHIJKLMNOPQRSTUVWXYZÄÖÑÜ§¿abcdefghijklmnopqrstuvwxyzäöñüà";

const GSM_EXTENSION: &str = "\u{0C}^{}\\[~]|€";

/// Septets needed to encode `c` in the GSM default alphabet, or `None` when
/// the character forces UCS-2.
fn gsm_septets(c: char) -> Option<usize> {
    if GSM_BASIC.contains(c) {
        Some(1)
    } else if GSM_EXTENSION.contains(c) {
        Some(2)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Gsm7,
    Ucs2,
}

impl Encoding {
    pub fn detect(text: &str) -> Self {
        if text.chars().all(|c| gsm_septets(c).is_some()) {
            Encoding::Gsm7
        } else {
            Encoding::Ucs2
        }
    }

    fn width(self, c: char) -> usize {
        match self {
            Encoding::Gsm7 => gsm_septets(c).unwrap_or(1),
            Encoding::Ucs2 => c.len_utf16(),
        }
    }

    fn limits(self) -> (usize, usize) {
        match self {
            Encoding::Gsm7 => (GSM_SINGLE_LIMIT, GSM_PART_LIMIT),
            Encoding::Ucs2 => (UCS2_SINGLE_LIMIT, UCS2_PART_LIMIT),
        }
    }
}

/// Divide `text` into the parts a handset would transmit. Always returns at
/// least one part; characters are never split across parts.
pub fn divide_message(text: &str) -> Vec<String> {
    let encoding = Encoding::detect(text);
    let (single, per_part) = encoding.limits();

    let total: usize = text.chars().map(|c| encoding.width(c)).sum();
    if total <= single {
        return vec![text.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut used = 0;
    for c in text.chars() {
        let width = encoding.width(c);
        if used + width > per_part {
            parts.push(std::mem::take(&mut current));
            used = 0;
        }
        current.push(c);
        used += width;
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
