//! Machine-Readable-Zone line encoding for passports and visas.
//!
//! Both lines are always exactly [`LINE_LEN`] characters. Missing fields are
//! substituted with the `<` filler, never left as a variable-length gap. The
//! check-digit positions carry the literal placeholder digit `0` to match the
//! behavior this encoder reproduces; they are NOT ISO 7501 check digits.

use chrono::{Datelike, NaiveDate};

use crate::{
    checksum,
    error::{DocforgeError, DocforgeResult},
    model::{DocumentKind, DocumentRecord},
};

/// Fixed length of every MRZ line.
pub const LINE_LEN: usize = 44;

/// The MRZ padding character.
pub const FILLER: char = '<';

const PLACEHOLDER_CHECK: char = '0';

/// Uppercase a field and replace everything outside `A-Z0-9` (spaces
/// included) with the filler character.
pub fn sanitize(field: &str) -> String {
    field
        .chars()
        .map(|c| {
            let up = c.to_ascii_uppercase();
            if up.is_ascii_uppercase() || up.is_ascii_digit() {
                up
            } else {
                FILLER
            }
        })
        .collect()
}

/// Encode MRZ line 1: `{marker}<{country}{surname}<<{given_names}`, padded
/// with filler to exactly 44 characters.
pub fn encode_line1(
    doc_marker: char,
    country: &str,
    surname: &str,
    given_names: &str,
) -> String {
    let mut line = String::with_capacity(LINE_LEN);
    line.push(doc_marker.to_ascii_uppercase());
    line.push(FILLER);
    line.push_str(&fit(&sanitize(country), 3));
    line.push_str(&sanitize(surname));
    line.push(FILLER);
    line.push(FILLER);
    line.push_str(&sanitize(given_names));
    fit(&line, LINE_LEN)
}

/// Encode MRZ line 2 from its sub-fields.
///
/// Layout: document number (9) + placeholder + nationality (3) + birth date
/// `YYMMDD` + placeholder + sex (1) + expiry `YYMMDD` + placeholder +
/// optional data (14) + placeholder, then filler-padded to 44.
///
/// `dob` and `expiry` are record-format dates (`DD MMM YYYY`); an empty date
/// becomes six fillers, a malformed one is an encoding error.
pub fn encode_line2(
    document_no: &str,
    nationality: &str,
    dob: &str,
    sex: &str,
    expiry: &str,
    optional_data: &str,
) -> DocforgeResult<String> {
    let mut line = String::with_capacity(LINE_LEN);
    line.push_str(&fit(&sanitize(document_no), 9));
    line.push(PLACEHOLDER_CHECK);
    line.push_str(&fit(&sanitize(nationality), 3));
    line.push_str(&date_block(dob)?);
    line.push(PLACEHOLDER_CHECK);
    line.push_str(&fit(&sanitize(sex), 1));
    line.push_str(&date_block(expiry)?);
    line.push(PLACEHOLDER_CHECK);
    line.push_str(&fit(&sanitize(optional_data), 14));
    line.push(PLACEHOLDER_CHECK);
    Ok(fit(&line, LINE_LEN))
}

/// Encode both MRZ lines for a passport or visa record.
pub fn encode_for_record(record: &DocumentRecord) -> DocforgeResult<(String, String)> {
    let (marker, number_key) = match record.kind {
        DocumentKind::Passport => ('P', "passport_number"),
        DocumentKind::Visa => ('V', "visa_number"),
        other => {
            return Err(DocforgeError::encoding(format!(
                "document kind {other} has no machine-readable zone"
            )));
        }
    };

    let country = non_empty_or(record.field("country_code"), "THA");
    let nationality = non_empty_or(record.field("nationality"), country);

    let line1 = encode_line1(
        marker,
        country,
        record.field("surname"),
        record.field("given_names"),
    );
    let line2 = encode_line2(
        record.field(number_key),
        nationality,
        record.field("birth_date"),
        record.field("sex"),
        record.field("expiry_date"),
        &issue_month_code(record.field("issue_date"))?,
    )?;
    Ok((line1, line2))
}

/// Optional-data block: the month of issue obfuscated as a letter (`A`-`L`)
/// followed by the two-digit issue year. Empty when no issue date is set.
fn issue_month_code(issue_date: &str) -> DocforgeResult<String> {
    let issue_date = issue_date.trim();
    if issue_date.is_empty() {
        return Ok(String::new());
    }
    let date = parse_record_date(issue_date)?;
    let letter = checksum::month_letter(date.month())?;
    Ok(format!("{letter}{:02}", date.year().rem_euclid(100)))
}

/// Convert a record date (`DD MMM YYYY`) into the `YYMMDD` MRZ block. Empty
/// input yields six fillers; malformed input is an encoding error.
fn date_block(value: &str) -> DocforgeResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(FILLER.to_string().repeat(6));
    }
    let date = parse_record_date(value)?;
    Ok(format!(
        "{:02}{:02}{:02}",
        date.year().rem_euclid(100),
        date.month(),
        date.day()
    ))
}

/// Parse the record date format `DD MMM YYYY` (month abbreviation is
/// case-insensitive).
pub fn parse_record_date(value: &str) -> DocforgeResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%d %b %Y")
        .map_err(|e| DocforgeError::encoding(format!("date '{value}' is not DD MMM YYYY: {e}")))
}

fn fit(s: &str, len: usize) -> String {
    let mut out: String = s.chars().take(len).collect();
    while out.chars().count() < len {
        out.push(FILLER);
    }
    out
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() { fallback } else { value }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line1_fixed_prefix_and_length() {
        let line = encode_line1('P', "AUS", "SMITH", "JOHN");
        assert_eq!(line.len(), LINE_LEN);
        assert!(line.starts_with("P<AUSSMITH<<JOHN"));
        assert!(line[16..].chars().all(|c| c == FILLER));
    }

    #[test]
    fn line1_spaces_become_filler() {
        let line = encode_line1('P', "THA", "VAN DER BERG", "ANNA MARIE");
        assert!(line.starts_with("P<THAVAN<DER<BERG<<ANNA<MARIE"));
        assert_eq!(line.len(), LINE_LEN);
    }

    #[test]
    fn line1_truncates_overlong_names() {
        let surname = "X".repeat(60);
        let line = encode_line1('P', "THA", &surname, "Y");
        assert_eq!(line.len(), LINE_LEN);
    }

    #[test]
    fn line2_layout_and_length() {
        let line = encode_line2("AB1234567", "AUS", "01 JAN 1990", "M", "01 JAN 2030", "")
            .unwrap();
        assert_eq!(line.len(), LINE_LEN);
        assert_eq!(&line[0..9], "AB1234567");
        assert_eq!(line.as_bytes()[9], b'0');
        assert_eq!(&line[10..13], "AUS");
        assert_eq!(&line[13..19], "900101");
        assert_eq!(line.as_bytes()[19], b'0');
        assert_eq!(&line[20..21], "M");
        assert_eq!(&line[21..27], "300101");
        assert_eq!(line.as_bytes()[27], b'0');
        assert_eq!(&line[28..42], "<<<<<<<<<<<<<<");
        assert_eq!(line.as_bytes()[42], b'0');
        assert_eq!(line.as_bytes()[43], b'<');
    }

    #[test]
    fn line2_empty_fields_pad_instead_of_failing() {
        let line = encode_line2("", "", "", "", "", "").unwrap();
        assert_eq!(line.len(), LINE_LEN);
        assert_eq!(&line[13..19], "<<<<<<");
        assert_eq!(&line[21..27], "<<<<<<");
    }

    #[test]
    fn line2_malformed_date_is_an_encoding_error() {
        let err = encode_line2("AB1234567", "THA", "1990-01-01", "M", "", "").unwrap_err();
        assert!(matches!(err, DocforgeError::Encoding(_)));
    }

    #[test]
    fn issue_month_is_letter_coded_into_optional_data() {
        assert_eq!(issue_month_code("15 SEP 2020").unwrap(), "I20");
        assert_eq!(issue_month_code("01 JAN 1999").unwrap(), "A99");
        assert_eq!(issue_month_code("").unwrap(), "");
        assert!(issue_month_code("next tuesday").is_err());
    }

    #[test]
    fn sanitize_maps_non_alphanumerics_to_filler() {
        assert_eq!(sanitize("o'neil jr."), "O<NEIL<JR<");
        assert_eq!(sanitize("AB1234567"), "AB1234567");
    }

    #[test]
    fn record_date_parses_case_insensitively() {
        assert_eq!(
            parse_record_date("01 JAN 1990").unwrap(),
            NaiveDate::from_ymd_opt(1990, 1, 1).unwrap()
        );
        assert_eq!(
            parse_record_date("15 Sep 2027").unwrap(),
            NaiveDate::from_ymd_opt(2027, 9, 15).unwrap()
        );
    }
}
