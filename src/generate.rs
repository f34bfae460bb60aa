//! Seedable generation of plausible document records.
//!
//! Numeric fields are generated to already satisfy the checksum invariants:
//! the ID number is 12 random digits plus the computed 13th check digit,
//! never 13 independent digits. Output is a pure function of the seed and
//! the options (when `today` is pinned), so tests can assert determinism.

use chrono::{Days, NaiveDate, Utc};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    checksum,
    error::{DocforgeError, DocforgeResult},
    model::{DocumentKind, DocumentRecord},
};

const SURNAMES: &[&str] = &[
    "SRISUWAN",
    "THONGCHAI",
    "BOONMEE",
    "KITTIKUL",
    "RATTANAKORN",
    "CHAROENSUK",
    "PHONGPANIT",
    "SUKJAI",
];

const GIVEN_NAMES: &[&str] = &[
    "SOMCHAI", "SOMSRI", "NIRAN", "KANYA", "ANONG", "PRASERT", "MALEE", "WICHAI", "PIMCHAN",
    "THAWEE",
];

const THAI_GIVEN: &[&str] = &[
    "สมชาย",
    "สมศรี",
    "นิรันดร์",
    "กันยา",
    "อนงค์",
    "ประเสริฐ",
    "มาลี",
    "วิชัย",
];

const THAI_SURNAMES: &[&str] = &[
    "ศรีสุวรรณ",
    "ทองชัย",
    "บุญมี",
    "กิตติกุล",
    "รัตนากร",
    "เจริญสุข",
];

const PROVINCES: &[&str] = &[
    "BANGKOK",
    "CHIANG MAI",
    "PHUKET",
    "KHON KAEN",
    "NAKHON RATCHASIMA",
    "SONGKHLA",
    "UDON THANI",
];

const ROADS: &[&str] = &["SUKHUMVIT", "PHAHONYOTHIN", "RATCHADAPHISEK", "CHAROEN KRUNG"];

const VISA_CLASSES: &[&str] = &["TR", "B", "ED", "O"];

/// Bounds for generated dates.
#[derive(Clone, Copy, Debug)]
pub struct GenOptions {
    /// Reference date; `None` uses the current UTC date (non-deterministic).
    pub today: Option<NaiveDate>,
    pub min_age_years: u32,
    pub max_age_years: u32,
}

impl Default for GenOptions {
    fn default() -> Self {
        Self {
            today: None,
            min_age_years: 18,
            max_age_years: 65,
        }
    }
}

pub struct RecordGenerator {
    rng: StdRng,
}

impl RecordGenerator {
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Generate a complete record for `kind`, filling every canonical field
    /// key with a plausible value.
    pub fn generate(
        &mut self,
        kind: DocumentKind,
        opts: &GenOptions,
    ) -> DocforgeResult<DocumentRecord> {
        if opts.min_age_years > opts.max_age_years {
            return Err(DocforgeError::invalid_input(
                "min_age_years must not exceed max_age_years",
            ));
        }
        let today = opts.today.unwrap_or_else(|| Utc::now().date_naive());

        let surname = self.pick(SURNAMES);
        let given = self.pick(GIVEN_NAMES);
        let province = self.pick(PROVINCES);
        let sex = if self.rng.random_range(0..2) == 0 { "M" } else { "F" };

        let min_days = u64::from(opts.min_age_years) * 365;
        let max_days = (u64::from(opts.max_age_years) * 365).max(min_days + 1);
        let birth = sub_days(today, self.rng.random_range(min_days..=max_days))?;
        let issue = sub_days(today, self.rng.random_range(0..(5 * 365)))?;
        let validity_days = match kind {
            DocumentKind::IdCard => 8 * 365,
            DocumentKind::DrivingLicense => 5 * 365,
            DocumentKind::Passport => 10 * 365,
            DocumentKind::Visa => 365,
        };
        let expiry = add_days(issue, validity_days)?;

        let mut record = DocumentRecord::new(kind);
        record
            .set("surname", surname)
            .set("given_names", given)
            .set("birth_date", record_date(birth))
            .set("issue_date", record_date(issue))
            .set("expiry_date", record_date(expiry));

        match kind {
            DocumentKind::IdCard => {
                record
                    .set("id_number", self.national_id()?)
                    .set("name_th", self.thai_name())
                    .set("address", self.address(province));
            }
            DocumentKind::DrivingLicense => {
                record
                    .set("license_number", self.digits(8))
                    .set("id_number", self.national_id()?)
                    .set("province", province);
            }
            DocumentKind::Passport => {
                record
                    .set("passport_number", self.passport_number())
                    .set("country_code", "THA")
                    .set("nationality", "THA")
                    .set("sex", sex)
                    .set("place_of_birth", province);
            }
            DocumentKind::Visa => {
                record
                    .set("visa_number", self.digits(8))
                    .set("passport_number", self.passport_number())
                    .set("nationality", "THA")
                    .set("sex", sex)
                    .set("visa_class", self.pick(VISA_CLASSES))
                    .set("place_of_issue", province);
            }
        }

        Ok(record)
    }

    /// 12 random payload digits plus the computed MOD-11 check digit.
    fn national_id(&mut self) -> DocforgeResult<String> {
        let mut payload = [0u8; checksum::THAI_ID_PAYLOAD_DIGITS];
        // Leading digit of a real ID number is never zero.
        payload[0] = self.rng.random_range(1..=8);
        for d in payload.iter_mut().skip(1) {
            *d = self.rng.random_range(0..=9);
        }
        let check = checksum::thai_id_check_digit(&payload)?;
        let mut out = String::with_capacity(13);
        for d in payload {
            out.push(char::from(b'0' + d));
        }
        out.push(char::from(b'0' + check));
        Ok(out)
    }

    fn passport_number(&mut self) -> String {
        let mut out = String::with_capacity(9);
        for _ in 0..2 {
            out.push(char::from(b'A' + self.rng.random_range(0..26u8)));
        }
        out.push_str(&self.digits(7));
        out
    }

    fn thai_name(&mut self) -> String {
        format!("{} {}", self.pick(THAI_GIVEN), self.pick(THAI_SURNAMES))
    }

    fn address(&mut self, province: &str) -> String {
        format!(
            "{}/{} {} RD., {}",
            self.rng.random_range(1..400),
            self.rng.random_range(1..20),
            self.pick(ROADS),
            province
        )
    }

    fn digits(&mut self, n: usize) -> String {
        (0..n)
            .map(|_| char::from(b'0' + self.rng.random_range(0..=9u8)))
            .collect()
    }

    fn pick<'a>(&mut self, vocab: &[&'a str]) -> &'a str {
        vocab[self.rng.random_range(0..vocab.len())]
    }
}

/// Record date format: `01 JAN 1990`.
fn record_date(date: NaiveDate) -> String {
    date.format("%d %b %Y").to_string().to_uppercase()
}

fn sub_days(date: NaiveDate, days: u64) -> DocforgeResult<NaiveDate> {
    date.checked_sub_days(Days::new(days))
        .ok_or_else(|| DocforgeError::invalid_input("generated date out of range"))
}

fn add_days(date: NaiveDate, days: u64) -> DocforgeResult<NaiveDate> {
    date.checked_add_days(Days::new(days))
        .ok_or_else(|| DocforgeError::invalid_input("generated date out of range"))
}
