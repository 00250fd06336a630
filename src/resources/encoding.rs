//! Named character sets for `file.managed` contents.
//!
//! Multi-byte and WHATWG sets come from `encoding_rs`, DOS code pages from
//! `oem_cp`, and the remaining single-byte sets from [`super::charmap`].
use encoding_rs::Encoding;
use oem_cp::code_table::{DECODING_TABLE_CP_MAP, ENCODING_TABLE_CP_MAP};

use super::charmap::{self, CharMap};
use crate::error::EncodingError;

/// A resolved character set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Charset {
    name: &'static str,
    kind: Kind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Utf8,
    Utf16Be,
    Utf16Le,
    Legacy(&'static Encoding),
    /// DOS code page number.
    Oem(u16),
    Map(&'static CharMap),
}

/// Supported names (lowercase).
const NAMES: &[&str] = &[
    "codepage037",
    "codepage1047",
    "codepage1140",
    "codepage437",
    "codepage850",
    "codepage852",
    "codepage855",
    "codepage858",
    "codepage860",
    "codepage862",
    "codepage863",
    "codepage865",
    "utf8",
    "utf-8",
    "utf16be",
    "utf16le",
    "iso8859_1",
    "iso8859_2",
    "iso8859_3",
    "iso8859_4",
    "iso8859_5",
    "iso8859_6",
    "iso8859_7",
    "iso8859_8",
    "iso8859_9",
    "iso8859_10",
    "iso8859_13",
    "iso8859_14",
    "iso8859_15",
    "iso8859_16",
    "koi8r",
    "koi8u",
    "macintosh",
    "macintoshcyrillic",
    "codepage866",
    "windows874",
    "windows1250",
    "windows1251",
    "windows1252",
    "windows1253",
    "windows1254",
    "windows1255",
    "windows1256",
    "windows1257",
    "windows1258",
    "gb18030",
    "gbk",
    "big5",
    "eucjp",
    "iso2022jp",
    "shiftjis",
    "euckr",
];

/// Every supported encoding name.
pub fn supported_names() -> impl Iterator<Item = &'static str> {
    NAMES.iter().copied()
}

/// ISO-8859-1 and ISO-8859-9 keep their own tables rather than the
/// windows-125x supersets WHATWG substitutes for them.
fn kind_for(name: &str) -> Option<Kind> {
    let kind = match name {
        "codepage037" => Kind::Map(&charmap::CP037),
        "codepage1047" => Kind::Map(&charmap::CP1047),
        "codepage1140" => Kind::Map(&charmap::CP1140),
        "codepage437" => Kind::Oem(437),
        "codepage850" => Kind::Oem(850),
        "codepage852" => Kind::Oem(852),
        "codepage855" => Kind::Oem(855),
        "codepage858" => Kind::Oem(858),
        "codepage860" => Kind::Oem(860),
        "codepage862" => Kind::Oem(862),
        "codepage863" => Kind::Oem(863),
        "codepage865" => Kind::Oem(865),
        "iso8859_1" => Kind::Map(&charmap::ISO_8859_1),
        "iso8859_9" => Kind::Map(&charmap::ISO_8859_9),
        "utf8" | "utf-8" => Kind::Utf8,
        "utf16be" => Kind::Utf16Be,
        "utf16le" => Kind::Utf16Le,
        "iso8859_2" => Kind::Legacy(encoding_rs::ISO_8859_2),
        "iso8859_3" => Kind::Legacy(encoding_rs::ISO_8859_3),
        "iso8859_4" => Kind::Legacy(encoding_rs::ISO_8859_4),
        "iso8859_5" => Kind::Legacy(encoding_rs::ISO_8859_5),
        "iso8859_6" => Kind::Legacy(encoding_rs::ISO_8859_6),
        "iso8859_7" => Kind::Legacy(encoding_rs::ISO_8859_7),
        "iso8859_8" => Kind::Legacy(encoding_rs::ISO_8859_8),
        "iso8859_10" => Kind::Legacy(encoding_rs::ISO_8859_10),
        "iso8859_13" => Kind::Legacy(encoding_rs::ISO_8859_13),
        "iso8859_14" => Kind::Legacy(encoding_rs::ISO_8859_14),
        "iso8859_15" => Kind::Legacy(encoding_rs::ISO_8859_15),
        "iso8859_16" => Kind::Legacy(encoding_rs::ISO_8859_16),
        "koi8r" => Kind::Legacy(encoding_rs::KOI8_R),
        "koi8u" => Kind::Legacy(encoding_rs::KOI8_U),
        "macintosh" => Kind::Legacy(encoding_rs::MACINTOSH),
        "macintoshcyrillic" => Kind::Legacy(encoding_rs::X_MAC_CYRILLIC),
        "codepage866" => Kind::Legacy(encoding_rs::IBM866),
        "windows874" => Kind::Legacy(encoding_rs::WINDOWS_874),
        "windows1250" => Kind::Legacy(encoding_rs::WINDOWS_1250),
        "windows1251" => Kind::Legacy(encoding_rs::WINDOWS_1251),
        "windows1252" => Kind::Legacy(encoding_rs::WINDOWS_1252),
        "windows1253" => Kind::Legacy(encoding_rs::WINDOWS_1253),
        "windows1254" => Kind::Legacy(encoding_rs::WINDOWS_1254),
        "windows1255" => Kind::Legacy(encoding_rs::WINDOWS_1255),
        "windows1256" => Kind::Legacy(encoding_rs::WINDOWS_1256),
        "windows1257" => Kind::Legacy(encoding_rs::WINDOWS_1257),
        "windows1258" => Kind::Legacy(encoding_rs::WINDOWS_1258),
        "gb18030" => Kind::Legacy(encoding_rs::GB18030),
        "gbk" => Kind::Legacy(encoding_rs::GBK),
        "big5" => Kind::Legacy(encoding_rs::BIG5),
        "eucjp" => Kind::Legacy(encoding_rs::EUC_JP),
        "iso2022jp" => Kind::Legacy(encoding_rs::ISO_2022_JP),
        "shiftjis" => Kind::Legacy(encoding_rs::SHIFT_JIS),
        "euckr" => Kind::Legacy(encoding_rs::EUC_KR),
        _ => return None,
    };
    Some(kind)
}

impl Charset {
    /// Resolve `name` case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::Unknown`] for unsupported names.
    pub fn lookup(name: &str) -> Result<Self, EncodingError> {
        let wanted = name.trim().to_ascii_lowercase();
        let canonical = NAMES
            .iter()
            .find(|n| **n == wanted)
            .ok_or_else(|| EncodingError::Unknown(name.to_string()))?;
        let kind = kind_for(canonical).ok_or_else(|| EncodingError::Unknown(name.to_string()))?;
        Ok(Self {
            name: canonical,
            kind,
        })
    }

    /// Canonical lowercase name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Encode UTF-8 `text` into this charset.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::Unmappable`] if `text` contains characters
    /// the charset cannot represent.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, EncodingError> {
        match self.kind {
            Kind::Utf8 => Ok(text.as_bytes().to_vec()),
            Kind::Utf16Be => Ok(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
            Kind::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            Kind::Legacy(encoding) => {
                let (bytes, _, had_errors) = encoding.encode(text);
                if had_errors {
                    Err(self.unmappable())
                } else {
                    Ok(bytes.into_owned())
                }
            }
            Kind::Oem(page) => ENCODING_TABLE_CP_MAP
                .get(&page)
                .and_then(|table| oem_cp::encode_string_checked(text, table))
                .ok_or_else(|| self.unmappable()),
            Kind::Map(map) => text
                .chars()
                .map(|ch| map.encode_char(ch))
                .collect::<Option<Vec<u8>>>()
                .ok_or_else(|| self.unmappable()),
        }
    }

    fn unmappable(&self) -> EncodingError {
        EncodingError::Unmappable(self.name.to_string())
    }

    fn malformed(&self) -> EncodingError {
        EncodingError::Malformed(self.name.to_string())
    }

    /// Decode `bytes` from this charset into UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::Malformed`] for byte sequences that are not
    /// valid in the charset.
    pub fn decode(&self, bytes: &[u8]) -> Result<String, EncodingError> {
        let encoding = match self.kind {
            Kind::Utf8 => encoding_rs::UTF_8,
            Kind::Utf16Be => encoding_rs::UTF_16BE,
            Kind::Utf16Le => encoding_rs::UTF_16LE,
            Kind::Legacy(encoding) => encoding,
            Kind::Oem(page) => {
                return DECODING_TABLE_CP_MAP
                    .get(&page)
                    .and_then(|table| table.decode_string_checked(bytes))
                    .ok_or_else(|| self.malformed());
            }
            Kind::Map(map) => {
                return bytes
                    .iter()
                    .map(|b| map.decode_byte(*b))
                    .collect::<Option<String>>()
                    .ok_or_else(|| self.malformed());
            }
        };
        encoding
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(std::borrow::Cow::into_owned)
            .ok_or_else(|| self.malformed())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(Charset::lookup("ShiftJIS").unwrap().name(), "shiftjis");
        assert_eq!(Charset::lookup("UTF-8").unwrap().name(), "utf-8");
    }

    #[test]
    fn unknown_name_fails() {
        let err = Charset::lookup("klingon").unwrap_err();
        assert_eq!(err.to_string(), "unknown encoding: 'klingon'");
    }

    #[test]
    fn utf16_encodes_with_requested_byte_order() {
        let be = Charset::lookup("utf16be").unwrap().encode("A").unwrap();
        let le = Charset::lookup("utf16le").unwrap().encode("A").unwrap();
        assert_eq!(be, vec![0x00, 0x41]);
        assert_eq!(le, vec![0x41, 0x00]);
    }

    #[test]
    fn cyrillic_round_trip_in_windows1251() {
        let cs = Charset::lookup("windows1251").unwrap();
        let bytes = cs.encode("Привет").unwrap();
        assert_eq!(bytes.len(), 6);
        assert_eq!(cs.decode(&bytes).unwrap(), "Привет");
    }

    #[test]
    fn unmappable_character_is_an_error() {
        let cs = Charset::lookup("windows1252").unwrap();
        let err = cs.encode("日本").unwrap_err();
        assert_eq!(err, EncodingError::Unmappable("windows1252".into()));
    }

    #[test]
    fn latin1_is_the_identity_mapping() {
        let cs = Charset::lookup("iso8859_1").unwrap();
        assert_eq!(cs.encode("\u{85}é").unwrap(), vec![0x85, 0xE9]);
        assert_eq!(cs.decode(&[0x80, 0xFF]).unwrap(), "\u{80}ÿ");
        assert_eq!(
            cs.encode("5 €").unwrap_err(),
            EncodingError::Unmappable("iso8859_1".into())
        );
    }

    #[test]
    fn latin5_carries_turkish_letters() {
        let cs = Charset::lookup("iso8859_9").unwrap();
        assert_eq!(cs.encode("İş").unwrap(), vec![0xDD, 0xFE]);
        assert_eq!(cs.decode(&[0xF0, 0xFD]).unwrap(), "ğı");
        assert!(cs.encode("€").is_err());
        assert!(cs.encode("Ð").is_err());
    }

    #[test]
    fn dos_code_pages_use_oem_tables() {
        let cs = Charset::lookup("codepage437").unwrap();
        assert_eq!(cs.encode("π≈½").unwrap(), vec![0xE3, 0xF7, 0xAB]);
        assert_eq!(cs.decode(&[0xC9, 0xCD, 0xBB]).unwrap(), "╔═╗");
        assert!(cs.encode("日本").is_err());
        let cp858 = Charset::lookup("CodePage858").unwrap();
        assert_eq!(cp858.decode(&cp858.encode("€").unwrap()).unwrap(), "€");
    }

    #[test]
    fn ebcdic_pages_encode_letters_and_digits() {
        let cs = Charset::lookup("codepage037").unwrap();
        assert_eq!(cs.encode("A1 a").unwrap(), vec![0xC1, 0xF1, 0x40, 0x81]);
        assert_eq!(cs.decode(&[0xC8, 0x85, 0x93, 0x93, 0x96]).unwrap(), "Hello");
        let euro = Charset::lookup("codepage1140").unwrap();
        assert_eq!(euro.encode("€").unwrap(), vec![0x9F]);
        assert!(cs.encode("€").is_err());
    }

    #[test]
    fn invalid_utf8_is_malformed() {
        let cs = Charset::lookup("utf8").unwrap();
        assert!(cs.decode(&[0xff, 0xfe, 0xfd]).is_err());
    }

    #[test]
    fn every_supported_name_round_trips_ascii() {
        let text = "Hello, world 123\n[a^b] {c}";
        for name in supported_names() {
            let cs = Charset::lookup(name).unwrap();
            let bytes = cs.encode(text).unwrap();
            assert_eq!(cs.decode(&bytes).unwrap(), text, "{name}");
        }
    }
}
