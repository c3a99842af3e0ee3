//! MOBI locale code mapping.
//!
//! The MOBI header stores the book locale as a Windows-style language id:
//! the low byte is the primary language, and bits 10-15 (`(code >> 8) >> 2`)
//! select the region. English is 9; US English is 1033 (0x409), UK English
//! is 2057 (0x809).

use crate::MobiError;

/// Language tags per primary language id. Index 0 is the bare language,
/// index `n` the tag for region `n`.
static LOCALES: &[(u8, &[&str])] = &[
    (0x01, &["ar", "ar-sa", "ar-iq", "ar-eg", "ar-ly", "ar-dz", "ar-ma", "ar-tn", "ar-om", "ar-ye", "ar-sy", "ar-jo", "ar-lb", "ar-kw", "ar-ae", "ar-bh", "ar-qa"]),
    (0x02, &["bg"]),
    (0x03, &["ca"]),
    (0x04, &["zh", "zh-tw", "zh-cn", "zh-hk", "zh-sg"]),
    (0x05, &["cs"]),
    (0x06, &["da"]),
    (0x07, &["de", "de-de", "de-ch", "de-at", "de-lu", "de-li"]),
    (0x08, &["el"]),
    (0x09, &["en", "en-us", "en-gb", "en-au", "en-ca", "en-nz", "en-ie", "en-za", "en-jm", "en", "en-bz", "en-tt", "en-zw", "en-ph"]),
    (0x0a, &["es", "es-es", "es-mx", "es", "es-gt", "es-cr", "es-pa", "es-do", "es-ve", "es-co", "es-pe", "es-ar", "es-ec", "es-cl", "es-uy", "es-py", "es-bo", "es-sv", "es-hn", "es-ni", "es-pr"]),
    (0x0b, &["fi"]),
    (0x0c, &["fr", "fr-fr", "fr-be", "fr-ca", "fr-ch", "fr-lu", "fr-mc"]),
    (0x0d, &["he"]),
    (0x0e, &["hu"]),
    (0x0f, &["is"]),
    (0x10, &["it", "it-it", "it-ch"]),
    (0x11, &["ja"]),
    (0x12, &["ko"]),
    (0x13, &["nl", "nl-nl", "nl-be"]),
    (0x14, &["no", "nb", "nn"]),
    (0x15, &["pl"]),
    (0x16, &["pt", "pt-br", "pt-pt"]),
    (0x17, &["rm"]),
    (0x18, &["ro"]),
    (0x19, &["ru"]),
    (0x1a, &["hr", "hr", "sr"]),
    (0x1b, &["sk"]),
    (0x1c, &["sq"]),
    (0x1d, &["sv", "sv-se", "sv-fi"]),
    (0x1e, &["th"]),
    (0x1f, &["tr"]),
    (0x20, &["ur"]),
    (0x21, &["id"]),
    (0x22, &["uk"]),
    (0x23, &["be"]),
    (0x24, &["sl"]),
    (0x25, &["et"]),
    (0x26, &["lv"]),
    (0x27, &["lt"]),
    (0x29, &["fa"]),
    (0x2a, &["vi"]),
    (0x2b, &["hy"]),
    (0x2c, &["az"]),
    (0x2d, &["eu"]),
    (0x2e, &["sb"]),
    (0x2f, &["mk"]),
    (0x30, &["sx"]),
    (0x31, &["ts"]),
    (0x32, &["tn"]),
    (0x34, &["xh"]),
    (0x35, &["zu"]),
    (0x36, &["af"]),
    (0x37, &["ka"]),
    (0x38, &["fo"]),
    (0x39, &["hi"]),
    (0x3a, &["mt"]),
    (0x3b, &["sz"]),
    (0x3e, &["ms"]),
    (0x3f, &["kk"]),
    (0x41, &["sw"]),
    (0x43, &["uz"]),
    (0x44, &["tt"]),
    (0x45, &["bn"]),
    (0x46, &["pa"]),
    (0x47, &["gu"]),
    (0x48, &["or"]),
    (0x49, &["ta"]),
    (0x4a, &["te"]),
    (0x4b, &["kn"]),
    (0x4c, &["ml"]),
    (0x4d, &["as"]),
    (0x4e, &["mr"]),
    (0x4f, &["sa"]),
    (0x57, &["kok"]),
    (0x61, &["ne"]),
];

/// Split a locale code into `(language id, region id)`.
pub fn split_locale(code: u32) -> (u8, u8) {
    let lang = (code & 0xff) as u8;
    let region = (((code >> 8) & 0xff) >> 2) as u8;
    (lang, region)
}

/// Map a MOBI locale code to a language tag such as `en` or `en-us`.
///
/// Unknown regions fall back to the bare language tag; an unknown language
/// is an [`MobiError::UnsupportedEncoding`].
///
/// # Examples
///
/// ```
/// use mobi::mobi::locale::locale_string;
///
/// assert_eq!(locale_string(9).unwrap(), "en");
/// assert_eq!(locale_string(1033).unwrap(), "en-us");
/// assert_eq!(locale_string(2057).unwrap(), "en-gb");
/// assert!(locale_string(0xff).is_err());
/// ```
pub fn locale_string(code: u32) -> Result<&'static str, MobiError> {
    let (lang, region) = split_locale(code);
    let tags = LOCALES
        .iter()
        .find(|(id, _)| *id == lang)
        .map(|(_, tags)| *tags)
        .ok_or_else(|| {
            MobiError::UnsupportedEncoding(format!(
                "Unknown locale code {} (language id {})",
                code, lang
            ))
        })?;
    Ok(tags.get(region as usize).copied().unwrap_or(tags[0]))
}
