//! Purpose: Generate synthetic employees for populating an empty store.
//! Exports: `SeedGenerator`.
//! Role: Pure data generation; no I/O, no id assignment.
//! Invariants: Output depends only on the random source; `from_seed(n)` is reproducible.
//! Invariants: Position is drawn from the department's list; province from the city's.
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use time::{Date, Month};

use super::record::{EmployeeDraft, Status, format_iso_date};

const FIRST_NAMES: &[&str] = &[
    "Budi", "Siti", "Ahmad", "Dewi", "Eko", "Fitri", "Hadi", "Indah", "Joko", "Kartika",
    "Lestari", "Made", "Novi", "Putri", "Rahmat", "Sari", "Tono", "Wati", "Yudi", "Zahra",
    "Agus", "Ayu", "Bambang", "Citra", "Dedi", "Eka", "Fajar", "Gita", "Hendra", "Ika",
];

const LAST_NAMES: &[&str] = &[
    "Santoso", "Wijaya", "Permana", "Sari", "Pratama", "Kusuma", "Hidayat", "Rahman", "Utomo",
    "Puspita", "Nugroho", "Lestari", "Wardana", "Saputra", "Wibowo", "Handoko", "Setiawan",
    "Firmansyah",
];

const POSITIONS_BY_DEPARTMENT: &[(&str, &[&str])] = &[
    (
        "IT",
        &[
            "Software Developer",
            "System Analyst",
            "DevOps Engineer",
            "UI/UX Designer",
            "IT Support",
        ],
    ),
    (
        "Marketing",
        &[
            "Marketing Manager",
            "Content Creator",
            "Social Media Specialist",
            "SEO Specialist",
        ],
    ),
    (
        "Finance",
        &["Akuntan", "Financial Analyst", "Kasir", "Finance Manager"],
    ),
    (
        "Human Resources",
        &["HR Manager", "Recruiter", "Training Specialist", "HR Admin"],
    ),
    (
        "Operations",
        &["Operations Manager", "Project Manager", "Quality Control"],
    ),
    (
        "Sales",
        &["Sales Manager", "Account Executive", "Sales Representative"],
    ),
    (
        "Customer Service",
        &["CS Manager", "CS Representative", "Support Specialist"],
    ),
    (
        "Legal",
        &["Legal Manager", "Legal Officer", "Compliance Officer"],
    ),
    (
        "Produksi",
        &[
            "Production Manager",
            "Supervisor Produksi",
            "Operator Produksi",
        ],
    ),
    (
        "Logistik",
        &[
            "Logistics Manager",
            "Warehouse Supervisor",
            "Delivery Coordinator",
        ],
    ),
];

const PROVINCE_BY_CITY: &[(&str, &str)] = &[
    ("Jakarta", "DKI Jakarta"),
    ("Surabaya", "Jawa Timur"),
    ("Bandung", "Jawa Barat"),
    ("Medan", "Sumatera Utara"),
    ("Semarang", "Jawa Tengah"),
    ("Makassar", "Sulawesi Selatan"),
    ("Palembang", "Sumatera Selatan"),
    ("Tangerang", "Banten"),
    ("Bekasi", "Jawa Barat"),
    ("Depok", "Jawa Barat"),
    ("Bogor", "Jawa Barat"),
    ("Malang", "Jawa Timur"),
    ("Yogyakarta", "DI Yogyakarta"),
    ("Denpasar", "Bali"),
    ("Balikpapan", "Kalimantan Timur"),
    ("Pontianak", "Kalimantan Barat"),
    ("Manado", "Sulawesi Utara"),
];

const STREETS: &[&str] = &["Sudirman", "Gatot Subroto", "Thamrin", "Kuningan", "Asia Afrika"];

/// Weighted status table: four in six active.
const STATUS_WEIGHTS: &[(Status, u32)] = &[(Status::Aktif, 4), (Status::Cuti, 1), (Status::Resign, 1)];

const EMAIL_DOMAIN: &str = "perusahaan.co.id";
const PHONE_LEN: usize = 13;
const SALARY_MIN: i64 = 5_000_000;
const SALARY_SPAN: i64 = 20_000_000;

pub struct SeedGenerator<R: Rng> {
    rng: R,
}

impl SeedGenerator<StdRng> {
    pub fn from_seed(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> SeedGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    pub fn drafts(&mut self, count: usize) -> Vec<EmployeeDraft> {
        (0..count).map(|_| self.draft()).collect()
    }

    pub fn draft(&mut self) -> EmployeeDraft {
        let first_name = *pick(&mut self.rng, FIRST_NAMES);
        let last_name = *pick(&mut self.rng, LAST_NAMES);
        let (department, positions) = *pick(&mut self.rng, POSITIONS_BY_DEPARTMENT);
        let position = *pick(&mut self.rng, positions);
        let (city, province) = *pick(&mut self.rng, PROVINCE_BY_CITY);
        let street = *pick(&mut self.rng, STREETS);

        EmployeeDraft {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: format!(
                "{}.{}@{EMAIL_DOMAIN}",
                first_name.to_lowercase(),
                last_name.to_lowercase()
            ),
            phone: self.phone(),
            department: department.to_string(),
            position: position.to_string(),
            salary: SALARY_MIN + self.rng.gen_range(0..SALARY_SPAN),
            hire_date: format_iso_date(self.hire_date()),
            status: self.status(),
            address: format!("Jl. {street} No. {}", self.rng.gen_range(1..=200)),
            city: city.to_string(),
            province: province.to_string(),
            postal_code: self.rng.gen_range(10_000..=99_999).to_string(),
        }
    }

    fn phone(&mut self) -> String {
        let mut phone = String::with_capacity(PHONE_LEN);
        phone.push_str("08");
        phone.push(char::from(b'0' + self.rng.gen_range(1..=9u8)));
        while phone.len() < PHONE_LEN {
            phone.push(char::from(b'0' + self.rng.gen_range(0..=9u8)));
        }
        phone
    }

    fn hire_date(&mut self) -> Date {
        let (start, end) = hire_window();
        let day = self
            .rng
            .gen_range(start.to_julian_day()..=end.to_julian_day());
        Date::from_julian_day(day).unwrap_or(start)
    }

    fn status(&mut self) -> Status {
        let total: u32 = STATUS_WEIGHTS.iter().map(|(_, weight)| weight).sum();
        let mut roll = self.rng.gen_range(0..total);
        for (status, weight) in STATUS_WEIGHTS {
            if roll < *weight {
                return status.clone();
            }
            roll -= weight;
        }
        Status::Aktif
    }
}

fn pick<'a, R: Rng, T>(rng: &mut R, items: &'a [T]) -> &'a T {
    // Vocabularies are non-empty constants.
    items.choose(rng).unwrap_or(&items[0])
}

fn hire_window() -> (Date, Date) {
    let start = Date::from_calendar_date(2018, Month::January, 1).unwrap_or(Date::MIN);
    let end = Date::from_calendar_date(2024, Month::December, 31).unwrap_or(start);
    (start, end)
}
