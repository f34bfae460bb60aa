use std::collections::BTreeMap;

use crate::error::{DocforgeError, DocforgeResult};

/// The four supported document variants.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentKind {
    IdCard,
    DrivingLicense,
    Passport,
    Visa,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::IdCard,
        DocumentKind::DrivingLicense,
        DocumentKind::Passport,
        DocumentKind::Visa,
    ];

    /// Stable slug, also used for template asset file names.
    pub fn slug(self) -> &'static str {
        match self {
            DocumentKind::IdCard => "id-card",
            DocumentKind::DrivingLicense => "driving-license",
            DocumentKind::Passport => "passport",
            DocumentKind::Visa => "visa",
        }
    }

    /// Canonical field keys for records of this kind. Placement tables are
    /// validated against this list; the random generator fills all of them.
    pub fn field_keys(self) -> &'static [&'static str] {
        match self {
            DocumentKind::IdCard => &[
                "id_number",
                "name_th",
                "surname",
                "given_names",
                "birth_date",
                "address",
                "issue_date",
                "expiry_date",
            ],
            DocumentKind::DrivingLicense => &[
                "license_number",
                "id_number",
                "surname",
                "given_names",
                "birth_date",
                "province",
                "issue_date",
                "expiry_date",
            ],
            DocumentKind::Passport => &[
                "passport_number",
                "country_code",
                "nationality",
                "surname",
                "given_names",
                "birth_date",
                "sex",
                "place_of_birth",
                "issue_date",
                "expiry_date",
            ],
            DocumentKind::Visa => &[
                "visa_number",
                "passport_number",
                "nationality",
                "surname",
                "given_names",
                "birth_date",
                "sex",
                "visa_class",
                "place_of_issue",
                "issue_date",
                "expiry_date",
            ],
        }
    }

    /// Whether documents of this kind carry a machine-readable zone.
    pub fn has_mrz(self) -> bool {
        matches!(self, DocumentKind::Passport | DocumentKind::Visa)
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.slug())
    }
}

/// One document's worth of user-supplied data: a flat field map plus
/// optional raw photo bytes.
///
/// Fields are either empty or plain printable strings; the compositor skips
/// the draw call for any empty field rather than failing.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct DocumentRecord {
    pub kind: DocumentKind,
    pub fields: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<Vec<u8>>,
}

impl DocumentRecord {
    pub fn new(kind: DocumentKind) -> Self {
        Self {
            kind,
            fields: BTreeMap::new(),
            photo: None,
        }
    }

    /// Field value by key; missing keys read as the empty string.
    pub fn field(&self, key: &str) -> &str {
        self.fields.get(key).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Reject control characters in field values. Empty fields are fine;
    /// nothing else is pre-validated here.
    pub fn validate(&self) -> DocforgeResult<()> {
        for (key, value) in &self.fields {
            if value.chars().any(char::is_control) {
                return Err(DocforgeError::invalid_input(format!(
                    "field '{key}' contains control characters"
                )));
            }
        }
        Ok(())
    }
}
