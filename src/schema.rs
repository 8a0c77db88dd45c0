//! The canonical resume record.
//!
//! Field names are the wire contract with every downstream consumer (batch
//! clients, storage writers), so the serde names here must not drift. Absent
//! values serialise as `null` or `[]`, never as empty strings.
//!
//! Dates are [`NaiveDate`] and serialise as `YYYY-MM-DD`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured description of one candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeRecord {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub industry: Vec<String>,
    #[serde(default)]
    pub positions: Vec<String>,
    #[serde(default)]
    pub contract: Option<String>,
    #[serde(default)]
    pub education: Vec<Education>,
    #[serde(default)]
    pub certificates: Vec<Certificate>,
    #[serde(default)]
    pub experience: Vec<Experience>,
    #[serde(default)]
    pub languages: Vec<Language>,
    #[serde(default)]
    pub extra_skills: Vec<String>,
    #[serde(default)]
    pub references: Vec<Reference>,
}

impl ResumeRecord {
    /// True when at least one identity field (name, email, phone) is present.
    pub fn is_identifiable(&self) -> bool {
        self.full_name.is_some() || self.email.is_some() || self.phone.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Education {
    pub institution: String,
    #[serde(default)]
    pub degree: Option<String>,
    #[serde(default)]
    pub field_of_study: Option<String>,
    #[serde(default, alias = "from_date")]
    pub from: Option<NaiveDate>,
    #[serde(default, alias = "to_date")]
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub ongoing: bool,
    #[serde(default)]
    pub grade: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub title: String,
    #[serde(default, alias = "from_date")]
    pub from: Option<NaiveDate>,
    #[serde(default, alias = "to_date")]
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub ongoing: bool,
    /// URL or reference number of the certificate.
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Experience {
    #[serde(default)]
    pub industry: Option<String>,
    pub position: String,
    #[serde(default, alias = "from_date")]
    pub from: Option<NaiveDate>,
    #[serde(default, alias = "to_date")]
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub ongoing: bool,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub language: String,
    pub level: LanguageLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

/// Closed set of language proficiency levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageLevel {
    Native,
    Fluent,
    Intermediate,
    Beginner,
}

impl LanguageLevel {
    pub const ALL: [LanguageLevel; 4] = [
        LanguageLevel::Native,
        LanguageLevel::Fluent,
        LanguageLevel::Intermediate,
        LanguageLevel::Beginner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageLevel::Native => "native",
            LanguageLevel::Fluent => "fluent",
            LanguageLevel::Intermediate => "intermediate",
            LanguageLevel::Beginner => "beginner",
        }
    }

    /// Map a free-form proficiency label onto the closed set.
    ///
    /// Accepts the canonical names, CEFR grades and the usual resume
    /// phrasings. Returns `None` for anything that is not clearly one level.
    pub fn from_label(label: &str) -> Option<Self> {
        let l = label.trim().to_lowercase();
        let l = l.trim_end_matches(|c: char| c == '.' || c == ')');
        match l {
            "native" | "mother tongue" | "mother-tongue" | "first language" | "bilingual"
            | "native speaker" | "native or bilingual" => Some(LanguageLevel::Native),
            "fluent" | "c1" | "c2" | "advanced" | "proficient" | "full professional"
            | "professional working" | "professional" | "excellent" => Some(LanguageLevel::Fluent),
            "intermediate" | "b1" | "b2" | "conversational" | "good" | "working"
            | "limited working" | "upper intermediate" | "upper-intermediate" => {
                Some(LanguageLevel::Intermediate)
            }
            "beginner" | "a1" | "a2" | "basic" | "elementary" | "novice" | "limited" => {
                Some(LanguageLevel::Beginner)
            }
            _ => None,
        }
    }
}

impl fmt::Display for LanguageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entries that carry a `from`/`to` range and an `ongoing` flag.
pub trait DatedEntry {
    fn range_mut(&mut self) -> (&mut Option<NaiveDate>, &mut Option<NaiveDate>, &mut bool);
}

macro_rules! impl_dated_entry {
    ($($ty:ty),*) => {
        $(impl DatedEntry for $ty {
            fn range_mut(&mut self) -> (&mut Option<NaiveDate>, &mut Option<NaiveDate>, &mut bool) {
                (&mut self.from, &mut self.to, &mut self.ongoing)
            }
        })*
    };
}

impl_dated_entry!(Education, Certificate, Experience);
