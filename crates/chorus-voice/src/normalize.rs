//! Text clean-up applied before every synthesis request.

use unicode_general_category::{get_general_category, GeneralCategory};

/// Returns `true` for pictographs, dingbats, flags, skin-tone modifiers and
/// the joiners used to build emoji sequences.
fn is_pictographic(c: char) -> bool {
    matches!(
        c as u32,
        0x1F600..=0x1F64F // Emoticons
            | 0x1F300..=0x1F5FF // Misc symbols and pictographs
            | 0x1F680..=0x1F6FF // Transport and map
            | 0x1F900..=0x1F9FF // Supplemental symbols and pictographs
            | 0x1F1E6..=0x1F1FF // Regional indicators
            | 0x2600..=0x27BF // Misc symbols, dingbats
            | 0x200D // Zero width joiner
            | 0xFE0F // Variation selector-16
    )
}

/// Letters, decimal digits and whitespace. Other numeric characters such as
/// superscripts, fractions and roman numerals are dropped.
fn is_speakable(c: char) -> bool {
    if c.is_whitespace() {
        return true;
    }
    matches!(
        get_general_category(c),
        GeneralCategory::UppercaseLetter
            | GeneralCategory::LowercaseLetter
            | GeneralCategory::TitlecaseLetter
            | GeneralCategory::ModifierLetter
            | GeneralCategory::OtherLetter
            | GeneralCategory::DecimalNumber
    )
}

/// Strips pictographic glyphs, then every character that is neither a
/// letter, a digit nor whitespace.
///
/// Pure and idempotent.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !is_pictographic(*c))
        .filter(|c| is_speakable(*c))
        .collect()
}
