//! Deterministic consumer names and street addresses from curated lists.
//!
//! Same stream state in, same name out.

use crate::rng::StreamRng;

pub struct NameGenerator;

impl NameGenerator {
    /// Full name: given name, optional father's or family name, surname.
    pub fn full_name(rng: &mut StreamRng) -> String {
        let first = Self::first_name(rng);
        let last = *rng.choose(Self::family_names());
        if rng.chance(0.3) {
            let middle = *rng.choose(Self::male_names());
            format!("{first} {middle} {last}")
        } else {
            format!("{first} {last}")
        }
    }

    pub fn first_name(rng: &mut StreamRng) -> &'static str {
        if rng.chance(0.5) {
            *rng.choose(Self::male_names())
        } else {
            *rng.choose(Self::female_names())
        }
    }

    /// Business name for commercial and industrial connections.
    pub fn business_name(rng: &mut StreamRng) -> String {
        let owner = *rng.choose(Self::family_names());
        let trade = *rng.choose(Self::trades());
        let suffix = *rng.choose(Self::business_suffixes());
        format!("{owner} {trade} {suffix}")
    }

    /// `House No. 123, Street 7, <sector>, <city>`.
    pub fn address(rng: &mut StreamRng, sub_division: &str, city: &str) -> String {
        let house = rng.range_inclusive(1, 999);
        let street = rng.range_inclusive(1, 60);
        let block = *rng.choose(Self::blocks());
        format!("House No. {house}, Street {street}, {block}, {sub_division}, {city}")
    }

    fn male_names() -> &'static [&'static str] {
        &[
            "Muhammad", "Ahmed", "Ali", "Hassan", "Hussain", "Usman", "Bilal", "Imran",
            "Kamran", "Faisal", "Tariq", "Zahid", "Naveed", "Asif", "Shahid", "Waqas",
            "Adnan", "Irfan", "Khalid", "Saad", "Hamza", "Umar", "Zubair", "Junaid",
            "Farhan", "Rizwan", "Shoaib", "Arshad", "Javed", "Sohail", "Nadeem", "Yasir",
            "Raheel", "Babar", "Danish", "Ehsan", "Fahad", "Ghulam", "Haris", "Iqbal",
        ]
    }

    fn female_names() -> &'static [&'static str] {
        &[
            "Ayesha", "Fatima", "Zainab", "Maryam", "Hira", "Sana", "Amna", "Saba",
            "Nida", "Rabia", "Sadia", "Asma", "Bushra", "Farah", "Iqra", "Kiran",
            "Mehwish", "Nazia", "Rubina", "Samina", "Shazia", "Uzma", "Yasmin", "Zara",
            "Aleena", "Anum", "Huma", "Laiba", "Maha", "Noor",
        ]
    }

    fn family_names() -> &'static [&'static str] {
        &[
            "Khan", "Malik", "Qureshi", "Chaudhry", "Butt", "Raja", "Abbasi", "Awan",
            "Bhatti", "Mirza", "Sheikh", "Siddiqui", "Janjua", "Gondal", "Kayani", "Satti",
            "Minhas", "Khattak", "Niazi", "Paracha", "Rathore", "Hashmi", "Gillani", "Bukhari",
            "Shah", "Anjum", "Iqbal", "Akhtar", "Aslam", "Rana",
        ]
    }

    fn trades() -> &'static [&'static str] {
        &[
            "Textiles", "Traders", "Steel", "Foods", "Marble", "Pharma", "Printing",
            "Flour Mills", "Cold Storage", "Electronics", "Motors", "Furniture",
        ]
    }

    fn business_suffixes() -> &'static [&'static str] {
        &["& Sons", "Enterprises", "(Pvt) Ltd", "Industries", "Brothers", "Corporation"]
    }

    fn blocks() -> &'static [&'static str] {
        &[
            "Block A", "Block B", "Block C", "Phase 1", "Phase 2", "Sector G-9",
            "Sector I-8", "Main Bazaar", "Mohallah Islamabad", "Model Town",
        ]
    }
}
