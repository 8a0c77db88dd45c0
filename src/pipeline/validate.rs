//! Turn untrusted model output into a [`ResumeRecord`].
//!
//! 1. Strict parse into the canonical types.
//! 2. Otherwise recover a JSON value (see [`crate::pipeline::repair`]) and
//!    coerce it field by field: scalar/list reshaping, numbers to strings,
//!    boolean spellings, lenient dates, level synonyms, key aliases.
//!    Anything that cannot be coerced is a [`FieldViolation`] at its path.
//! 3. Normalise: drop placeholders, check emails, apply the industry
//!    vocabulary, enforce the `ongoing`/`to` and `from <= to` invariants.
//! 4. Require at least one identity field.
//!
//! Values are only ever reshaped or nulled, never invented. Every
//! correction is reported as a [`FieldWarning`]; all violations are
//! collected before failing so the error lists every offending path.

use crate::error::{FieldViolation, FieldWarning, PipelineError};
use crate::pipeline::dates::{in_supported_range, parse_date, DateParse};
use crate::pipeline::repair::repair;
use crate::schema::{
    Certificate, DatedEntry, Education, Experience, Language, LanguageLevel, Reference,
    ResumeRecord,
};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// A record that passed validation.
#[derive(Debug, Clone)]
pub struct Validated {
    pub record: ResumeRecord,
    pub warnings: Vec<FieldWarning>,
    /// Whether the strict parse failed and the coercion pass produced the record.
    pub repaired: bool,
}

#[derive(Debug, Default)]
struct Report {
    warnings: Vec<FieldWarning>,
    violations: Vec<FieldViolation>,
}

impl Report {
    fn warn(&mut self, path: &str, message: impl Into<String>) {
        self.warnings.push(FieldWarning::new(path, message));
    }

    fn violate(&mut self, path: &str, reason: impl Into<String>) {
        self.violations.push(FieldViolation::new(path, reason));
    }
}

static EMAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@.]{2,}$").unwrap());

const PLACEHOLDERS: &[&str] = &[
    "",
    "-",
    "--",
    "n/a",
    "na",
    "none",
    "null",
    "nil",
    "unknown",
    "tbd",
    "not specified",
    "not provided",
    "not available",
    "not mentioned",
];

fn is_placeholder(value: &str) -> bool {
    PLACEHOLDERS.contains(&value.trim().to_lowercase().as_str())
}

const IDENTITY_FIELDS: [&str; 3] = ["full_name", "email", "phone"];

/// Validate raw model output.
///
/// `industry_vocabulary`, when given, restricts record and experience
/// industries to its values (matched case-insensitively).
pub fn validate(
    raw: &str,
    industry_vocabulary: Option<&[String]>,
) -> Result<Validated, PipelineError> {
    let mut report = Report::default();

    let (mut record, repaired) = match serde_json::from_str::<ResumeRecord>(raw.trim()) {
        Ok(record) => (record, false),
        Err(strict) => {
            debug!("Strict parse failed ({}); coercing", strict);
            let value = serde_json::from_str::<Value>(raw.trim())
                .ok()
                .or_else(|| repair(raw));
            match value {
                Some(v) => (coerce_record(v, &mut report), true),
                None => {
                    return Err(PipelineError::SchemaViolation {
                        fields: vec![FieldViolation::new("$", "model output is not parseable JSON")],
                    })
                }
            }
        }
    };

    normalize_record(&mut record, industry_vocabulary, &mut report);

    if !record.is_identifiable() {
        for path in IDENTITY_FIELDS {
            if !report.violations.iter().any(|v| v.path == path) {
                report.violate(path, "at least one of full_name, email, phone is required");
            }
        }
    }

    if !report.violations.is_empty() {
        return Err(PipelineError::SchemaViolation {
            fields: report.violations,
        });
    }

    for w in &report.warnings {
        warn!("Field repaired: {}", w);
    }

    Ok(Validated {
        record,
        warnings: report.warnings,
        repaired,
    })
}

// ── Coercion ─────────────────────────────────────────────────────────────

fn root_object(value: Value, report: &mut Report) -> Option<Map<String, Value>> {
    match value {
        Value::Object(m) => Some(m),
        Value::Array(mut items) if items.len() == 1 => {
            report.warn("$", "single-element array unwrapped");
            root_object(items.remove(0), report)
        }
        other => {
            report.violate("$", format!("expected an object, got {}", kind(&other)));
            None
        }
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

fn coerce_record(value: Value, report: &mut Report) -> ResumeRecord {
    let mut obj = match root_object(value, report) {
        Some(o) => o,
        None => return ResumeRecord::default(),
    };

    let mut field = |key: &str| obj.remove(key);
    ResumeRecord {
        full_name: scalar(field("full_name"), "full_name", report),
        phone: scalar(field("phone"), "phone", report),
        email: scalar(field("email"), "email", report),
        country: scalar(field("country"), "country", report),
        industry: string_list(field("industry"), "industry", report),
        positions: string_list(field("positions"), "positions", report),
        contract: scalar(field("contract"), "contract", report),
        education: entries(field("education"), "education", report, education_entry),
        certificates: entries(field("certificates"), "certificates", report, certificate_entry),
        experience: entries(field("experience"), "experience", report, experience_entry),
        languages: entries(field("languages"), "languages", report, language_entry),
        extra_skills: string_list(field("extra_skills"), "extra_skills", report),
        references: entries(field("references"), "references", report, reference_entry),
    }
}

/// A single string. Numbers are stringified; a one-element list is unwrapped.
fn scalar(v: Option<Value>, path: &str, report: &mut Report) -> Option<String> {
    match v? {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(mut items) => match items.len() {
            0 => None,
            1 => scalar(items.pop(), path, report),
            n => {
                report.violate(path, format!("expected a single value, got a list of {n}"));
                None
            }
        },
        other => {
            report.violate(path, format!("expected a string, got {}", kind(&other)));
            None
        }
    }
}

/// A list of strings. A lone scalar becomes a one-element list.
fn string_list(v: Option<Value>, path: &str, report: &mut Report) -> Vec<String> {
    match v {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| scalar(Some(item), &format!("{path}[{i}]"), report))
            .collect(),
        Some(other) => scalar(Some(other), path, report).into_iter().collect(),
    }
}

fn boolean(v: Option<Value>, path: &str, report: &mut Report) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => match n.as_i64() {
            Some(0) => false,
            Some(1) => true,
            _ => {
                report.violate(path, format!("expected a boolean, got {n}"));
                false
            }
        },
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => true,
            "false" | "no" | "n" | "0" | "" => false,
            other => {
                report.violate(path, format!("expected a boolean, got '{other}'"));
                false
            }
        },
        Some(other) => {
            report.violate(path, format!("expected a boolean, got {}", kind(&other)));
            false
        }
    }
}

fn required(v: Option<Value>, path: &str, report: &mut Report) -> Option<String> {
    let before = report.violations.len();
    match scalar(v, path, report) {
        Some(s) if !is_placeholder(&s) => Some(s.trim().to_string()),
        _ => {
            if report.violations.len() == before {
                report.violate(path, "required field is missing");
            }
            None
        }
    }
}

fn is_empty_entry(m: &Map<String, Value>) -> bool {
    m.values().all(|v| match v {
        Value::Null => true,
        Value::String(s) => is_placeholder(s),
        Value::Array(a) => a.is_empty(),
        Value::Bool(b) => !b,
        _ => false,
    })
}

type EntryFn<T> = fn(Map<String, Value>, &str, &mut Report) -> Option<T>;

/// A list of entry objects. A lone object becomes a one-entry list; entries
/// with no content at all are dropped.
fn entries<T>(v: Option<Value>, path: &str, report: &mut Report, build: EntryFn<T>) -> Vec<T> {
    let items = match v {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::Array(items)) => items,
        Some(Value::Object(m)) => {
            report.warn(path, "single object wrapped into a list");
            vec![Value::Object(m)]
        }
        Some(other) => {
            report.violate(path, format!("expected a list of objects, got {}", kind(&other)));
            return Vec::new();
        }
    };

    items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let item_path = format!("{path}[{i}]");
            match item {
                Value::Object(m) if is_empty_entry(&m) => None,
                Value::Object(m) => build(m, &item_path, report),
                Value::Null => None,
                other => {
                    report.violate(&item_path, format!("expected an object, got {}", kind(&other)));
                    None
                }
            }
        })
        .collect()
}

struct DateRange {
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    ongoing: bool,
}

fn date_value(v: Option<Value>, path: &str, report: &mut Report) -> Option<DateParse> {
    let s = scalar(v, path, report)?;
    if is_placeholder(&s) {
        return None;
    }
    let parsed = parse_date(&s);
    if parsed == DateParse::Invalid {
        report.warn(path, format!("unparseable date '{}'; set to null", s.trim()));
    }
    Some(parsed)
}

fn date_range(m: &mut Map<String, Value>, path: &str, report: &mut Report) -> DateRange {
    let mut ongoing = boolean(m.remove("ongoing"), &format!("{path}.ongoing"), report);

    let from_path = format!("{path}.from");
    let from_v = m.remove("from").or_else(|| m.remove("from_date"));
    let from = match date_value(from_v, &from_path, report) {
        Some(DateParse::Date(d)) => Some(d),
        Some(DateParse::Present) => {
            report.warn(&from_path, "start date cannot be 'present'; set to null");
            None
        }
        _ => None,
    };

    let to_path = format!("{path}.to");
    let to_v = m.remove("to").or_else(|| m.remove("to_date"));
    let to = match date_value(to_v, &to_path, report) {
        Some(DateParse::Date(d)) => Some(d),
        Some(DateParse::Present) => {
            report.warn(&to_path, "end date means present; set to null and marked ongoing");
            ongoing = true;
            None
        }
        _ => None,
    };

    DateRange { from, to, ongoing }
}

fn education_entry(mut m: Map<String, Value>, path: &str, report: &mut Report) -> Option<Education> {
    let institution = required(m.remove("institution"), &format!("{path}.institution"), report);
    let degree = scalar(m.remove("degree"), &format!("{path}.degree"), report);
    let field_of_study = scalar(m.remove("field_of_study"), &format!("{path}.field_of_study"), report);
    let grade = scalar(m.remove("grade"), &format!("{path}.grade"), report);
    let range = date_range(&mut m, path, report);
    Some(Education {
        institution: institution?,
        degree,
        field_of_study,
        from: range.from,
        to: range.to,
        ongoing: range.ongoing,
        grade,
    })
}

fn certificate_entry(mut m: Map<String, Value>, path: &str, report: &mut Report) -> Option<Certificate> {
    let title = required(m.remove("title"), &format!("{path}.title"), report);
    let cert_path = scalar(m.remove("path"), &format!("{path}.path"), report);
    let range = date_range(&mut m, path, report);
    Some(Certificate {
        title: title?,
        from: range.from,
        to: range.to,
        ongoing: range.ongoing,
        path: cert_path,
    })
}

fn experience_entry(mut m: Map<String, Value>, path: &str, report: &mut Report) -> Option<Experience> {
    let position = required(m.remove("position"), &format!("{path}.position"), report);
    let industry = scalar(m.remove("industry"), &format!("{path}.industry"), report);
    let description = scalar(m.remove("description"), &format!("{path}.description"), report);
    let range = date_range(&mut m, path, report);
    Some(Experience {
        industry,
        position: position?,
        from: range.from,
        to: range.to,
        ongoing: range.ongoing,
        description,
    })
}

fn language_entry(mut m: Map<String, Value>, path: &str, report: &mut Report) -> Option<Language> {
    let language = required(m.remove("language"), &format!("{path}.language"), report);

    let level_path = format!("{path}.level");
    let before = report.violations.len();
    let level = match scalar(m.remove("level"), &level_path, report) {
        Some(label) if !is_placeholder(&label) => {
            let level = LanguageLevel::from_label(&label);
            if level.is_none() {
                report.violate(
                    &level_path,
                    format!("'{}' is not one of native, fluent, intermediate, beginner", label.trim()),
                );
            }
            level
        }
        _ => {
            if report.violations.len() == before {
                report.violate(&level_path, "required field is missing");
            }
            None
        }
    };

    Some(Language {
        language: language?,
        level: level?,
    })
}

fn reference_entry(mut m: Map<String, Value>, path: &str, report: &mut Report) -> Option<Reference> {
    let name = required(m.remove("name"), &format!("{path}.name"), report);
    let position = scalar(m.remove("position"), &format!("{path}.position"), report);
    let company = scalar(m.remove("company"), &format!("{path}.company"), report);
    let mobile = scalar(m.remove("mobile"), &format!("{path}.mobile"), report);
    let ref_path = scalar(m.remove("path"), &format!("{path}.path"), report);
    Some(Reference {
        name: name?,
        position,
        company,
        mobile,
        path: ref_path,
    })
}

// ── Normalisation ────────────────────────────────────────────────────────

fn clean_opt(field: &mut Option<String>, path: &str, report: &mut Report) {
    let value = match field.take() {
        Some(v) => v,
        None => return,
    };
    let trimmed = value.trim();
    if is_placeholder(trimmed) {
        if !trimmed.is_empty() {
            report.warn(path, format!("placeholder '{trimmed}' set to null"));
        }
    } else {
        *field = Some(trimmed.to_string());
    }
}

fn clean_required(field: &mut String, path: &str, report: &mut Report) {
    let trimmed = field.trim();
    if is_placeholder(trimmed) {
        report.violate(path, "required field is empty");
    } else if trimmed.len() != field.len() {
        *field = trimmed.to_string();
    }
}

fn clean_list(list: &mut Vec<String>) {
    let cleaned: Vec<String> = list
        .drain(..)
        .map(|s| s.trim().to_string())
        .filter(|s| !is_placeholder(s))
        .collect();
    *list = cleaned;
}

fn enforce_range<T: DatedEntry>(entries: &mut [T], section: &str, report: &mut Report) {
    for (i, entry) in entries.iter_mut().enumerate() {
        let (from, to, ongoing) = entry.range_mut();
        for (field, value) in [("from", &mut *from), ("to", &mut *to)] {
            if let Some(d) = *value {
                if !in_supported_range(d) {
                    report.warn(
                        &format!("{section}[{i}].{field}"),
                        format!("{d} is outside the supported year range; set to null"),
                    );
                    *value = None;
                }
            }
        }
        let path = format!("{section}[{i}].to");
        if *ongoing && to.is_some() {
            report.warn(&path, "ongoing entry had an end date; set to null");
            *to = None;
        }
        if let (Some(f), Some(t)) = (*from, *to) {
            if t < f {
                report.warn(&path, format!("end date {t} precedes start date {f}; set to null"));
                *to = None;
            }
        }
    }
}

fn apply_vocabulary(record: &mut ResumeRecord, vocabulary: &[String], report: &mut Report) {
    let canonical = |value: &str| {
        vocabulary
            .iter()
            .map(|v| v.trim())
            .find(|v| !v.is_empty() && v.eq_ignore_ascii_case(value.trim()))
            .map(str::to_string)
    };

    let mut kept = Vec::with_capacity(record.industry.len());
    for (i, value) in record.industry.drain(..).enumerate() {
        match canonical(&value) {
            Some(c) => kept.push(c),
            None => report.warn(
                &format!("industry[{i}]"),
                format!("'{value}' is not in the industry vocabulary; dropped"),
            ),
        }
    }
    record.industry = kept;

    for (i, exp) in record.experience.iter_mut().enumerate() {
        if let Some(value) = exp.industry.take() {
            match canonical(&value) {
                Some(c) => exp.industry = Some(c),
                None => report.warn(
                    &format!("experience[{i}].industry"),
                    format!("'{value}' is not in the industry vocabulary; set to null"),
                ),
            }
        }
    }
}

fn normalize_record(record: &mut ResumeRecord, vocabulary: Option<&[String]>, report: &mut Report) {
    clean_opt(&mut record.full_name, "full_name", report);
    clean_opt(&mut record.phone, "phone", report);
    clean_opt(&mut record.email, "email", report);
    clean_opt(&mut record.country, "country", report);
    clean_opt(&mut record.contract, "contract", report);
    clean_list(&mut record.industry);
    clean_list(&mut record.positions);
    clean_list(&mut record.extra_skills);

    if let Some(email) = record.email.take() {
        let email = email.trim_start_matches("mailto:").to_string();
        if EMAIL.is_match(&email) {
            record.email = Some(email);
        } else {
            report.warn("email", format!("'{email}' is not a valid email address; set to null"));
        }
    }

    for (i, e) in record.education.iter_mut().enumerate() {
        clean_required(&mut e.institution, &format!("education[{i}].institution"), report);
        clean_opt(&mut e.degree, &format!("education[{i}].degree"), report);
        clean_opt(&mut e.field_of_study, &format!("education[{i}].field_of_study"), report);
        clean_opt(&mut e.grade, &format!("education[{i}].grade"), report);
    }
    for (i, c) in record.certificates.iter_mut().enumerate() {
        clean_required(&mut c.title, &format!("certificates[{i}].title"), report);
        clean_opt(&mut c.path, &format!("certificates[{i}].path"), report);
    }
    for (i, e) in record.experience.iter_mut().enumerate() {
        clean_required(&mut e.position, &format!("experience[{i}].position"), report);
        clean_opt(&mut e.industry, &format!("experience[{i}].industry"), report);
        clean_opt(&mut e.description, &format!("experience[{i}].description"), report);
    }
    for (i, l) in record.languages.iter_mut().enumerate() {
        clean_required(&mut l.language, &format!("languages[{i}].language"), report);
    }
    for (i, r) in record.references.iter_mut().enumerate() {
        clean_required(&mut r.name, &format!("references[{i}].name"), report);
        clean_opt(&mut r.position, &format!("references[{i}].position"), report);
        clean_opt(&mut r.company, &format!("references[{i}].company"), report);
        clean_opt(&mut r.mobile, &format!("references[{i}].mobile"), report);
        clean_opt(&mut r.path, &format!("references[{i}].path"), report);
    }

    if let Some(vocab) = vocabulary {
        if vocab.iter().any(|v| !v.trim().is_empty()) {
            apply_vocabulary(record, vocab, report);
        }
    }

    enforce_range(&mut record.education, "education", report);
    enforce_range(&mut record.certificates, "certificates", report);
    enforce_range(&mut record.experience, "experience", report);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn strict_record_passes_untouched() {
        let raw = json!({
            "full_name": "John Doe",
            "email": "john@x.com",
            "education": [{
                "institution": "MIT",
                "degree": "M.Sc. Computer Science",
                "from": "2018-01-01",
                "to": "2022-01-01",
                "ongoing": false
            }]
        })
        .to_string();
        let v = validate(&raw, None).unwrap();
        assert!(!v.repaired);
        assert!(v.warnings.is_empty());
        assert_eq!(v.record.full_name.as_deref(), Some("John Doe"));
        let edu = &v.record.education[0];
        assert_eq!(edu.institution, "MIT");
        assert!(edu.degree.as_deref().unwrap().contains("M.Sc."));
        assert_eq!(edu.from, date(2018, 1, 1));
        assert_eq!(edu.to, date(2022, 1, 1));
        assert!(!edu.ongoing);
    }

    #[test]
    fn partial_dates_are_completed() {
        let raw = r#"{"full_name": "A", "experience": [{"position": "Dev", "from": "2019-03", "to": "2020"}]}"#;
        let v = validate(raw, None).unwrap();
        assert!(v.repaired);
        assert_eq!(v.record.experience[0].from, date(2019, 3, 1));
        assert_eq!(v.record.experience[0].to, date(2020, 1, 1));
    }

    #[test]
    fn invalid_date_is_nulled_with_warning() {
        let raw = r#"{"full_name": "A", "phone": "123", "experience": [{"position": "Dev", "from": "2019-01-01", "to": "soon"}]}"#;
        let v = validate(raw, None).unwrap();
        let exp = &v.record.experience[0];
        assert_eq!(exp.from, date(2019, 1, 1));
        assert_eq!(exp.to, None);
        assert_eq!(exp.position, "Dev");
        assert_eq!(v.record.phone.as_deref(), Some("123"));
        assert_eq!(v.warnings.len(), 1);
        assert_eq!(v.warnings[0].path, "experience[0].to");
    }

    #[test]
    fn present_end_date_marks_ongoing() {
        let raw = r#"{"full_name": "A", "experience": [{"position": "Dev", "from": "2021", "to": "Present"}]}"#;
        let v = validate(raw, None).unwrap();
        assert!(v.record.experience[0].ongoing);
        assert_eq!(v.record.experience[0].to, None);
    }

    #[test]
    fn ongoing_clears_end_date() {
        let raw = r#"{"full_name": "A", "education": [{"institution": "MIT", "from": "2018-01-01", "to": "2022-01-01", "ongoing": true}]}"#;
        let v = validate(raw, None).unwrap();
        assert!(!v.repaired);
        assert_eq!(v.record.education[0].to, None);
        assert_eq!(v.warnings[0].path, "education[0].to");
    }

    #[test]
    fn end_before_start_is_nulled() {
        let raw = r#"{"full_name": "A", "education": [{"institution": "MIT", "from": "2022-01-01", "to": "2018-01-01"}]}"#;
        let v = validate(raw, None).unwrap();
        assert_eq!(v.record.education[0].to, None);
        assert_eq!(v.record.education[0].from, date(2022, 1, 1));
    }

    #[test]
    fn empty_object_lists_identity_paths() {
        let err = validate("{}", None).unwrap_err();
        assert_eq!(err.field_paths(), vec!["full_name", "email", "phone"]);
    }

    #[test]
    fn unparseable_output_is_root_violation() {
        let err = validate("I'm sorry, I cannot help with that.", None).unwrap_err();
        assert_eq!(err.field_paths(), vec!["$"]);
    }

    #[test]
    fn every_offending_path_is_reported() {
        let raw = r#"{
            "full_name": "A",
            "education": 42,
            "experience": [{"position": "Dev", "ongoing": "maybe"}],
            "languages": [{"language": "Klingon", "level": "godlike"}],
            "references": [{"company": "Acme"}]
        }"#;
        let err = validate(raw, None).unwrap_err();
        let paths = err.field_paths();
        assert!(paths.contains(&"education"));
        assert!(paths.contains(&"experience[0].ongoing"));
        assert!(paths.contains(&"languages[0].level"));
        assert!(paths.contains(&"references[0].name"));
        assert_eq!(paths.len(), 4);
    }

    #[test]
    fn multi_value_list_for_scalar_is_violation() {
        let raw = r#"{"full_name": ["Jane Doe", "J. Doe"]}"#;
        let err = validate(raw, None).unwrap_err();
        assert_eq!(err.field_paths(), vec!["full_name", "email", "phone"]);
    }

    #[test]
    fn missing_identity_is_reported_alongside_other_violations() {
        let raw = r#"{
            "country": "Norway",
            "languages": [{"language": "Klingon", "level": "godlike"}]
        }"#;
        let err = validate(raw, None).unwrap_err();
        assert_eq!(
            err.field_paths(),
            vec!["languages[0].level", "full_name", "email", "phone"]
        );
    }

    #[test]
    fn shapes_are_coerced() {
        let raw = r#"{
            "full_name": ["Jane Doe"],
            "phone": 4712345678,
            "industry": "wind",
            "languages": {"language": "Norwegian", "level": "Mother tongue"},
            "certificates": [{"title": "GWO BST", "from_date": "2020-05-01", "ongoing": "yes"}]
        }"#;
        let v = validate(raw, None).unwrap();
        let r = &v.record;
        assert_eq!(r.full_name.as_deref(), Some("Jane Doe"));
        assert_eq!(r.phone.as_deref(), Some("4712345678"));
        assert_eq!(r.industry, vec!["wind"]);
        assert_eq!(r.languages[0].level, LanguageLevel::Native);
        assert_eq!(r.certificates[0].from, date(2020, 5, 1));
        assert!(r.certificates[0].ongoing);
    }

    #[test]
    fn placeholders_become_null() {
        let raw = r#"{"full_name": "Jane", "country": "N/A", "contract": "", "extra_skills": ["Rust", "none", " "]}"#;
        let v = validate(raw, None).unwrap();
        assert_eq!(v.record.country, None);
        assert_eq!(v.record.contract, None);
        assert_eq!(v.record.extra_skills, vec!["Rust"]);
    }

    #[test]
    fn placeholder_name_alone_is_not_identity() {
        let err = validate(r#"{"full_name": "Unknown"}"#, None).unwrap_err();
        assert_eq!(err.field_paths().len(), 3);
    }

    #[test]
    fn invalid_email_is_nulled() {
        let v = validate(r#"{"full_name": "Jane", "email": "jane at example"}"#, None).unwrap();
        assert_eq!(v.record.email, None);
        assert_eq!(v.warnings[0].path, "email");
    }

    #[test]
    fn vocabulary_filters_industries() {
        let vocab = vec!["wind".to_string(), "oil_n_gas".to_string()];
        let raw = r#"{"full_name": "Jane", "industry": ["Wind", "banking"],
                      "experience": [{"position": "Tech", "industry": "fishing"}]}"#;
        let v = validate(raw, Some(&vocab)).unwrap();
        assert_eq!(v.record.industry, vec!["wind"]);
        assert_eq!(v.record.experience[0].industry, None);
        assert_eq!(v.warnings.len(), 2);
    }

    #[test]
    fn empty_entries_are_dropped() {
        let raw = r#"{"full_name": "Jane", "references": [{"name": null, "company": ""}, null]}"#;
        let v = validate(raw, None).unwrap();
        assert!(v.record.references.is_empty());
    }

    #[test]
    fn absent_stays_absent() {
        let v = validate(r#"{"email": "a@b.io"}"#, None).unwrap();
        assert_eq!(v.record.full_name, None);
        assert!(v.record.education.is_empty());
        assert!(v.record.languages.is_empty());
    }

    #[test]
    fn fenced_output_is_repaired() {
        let raw = "```json\n{\"full_name\": \"Jane\", \"positions\": [\"Welder\",],}\n```";
        let v = validate(raw, None).unwrap();
        assert!(v.repaired);
        assert_eq!(v.record.positions, vec!["Welder"]);
    }

    #[test]
    fn canonical_record_round_trips() {
        let record = ResumeRecord {
            full_name: Some("Ada".into()),
            email: Some("ada@example.org".into()),
            experience: vec![Experience {
                industry: Some("computing".into()),
                position: "Analyst".into(),
                from: date(1985, 1, 1),
                to: None,
                ongoing: true,
                description: Some("Notes on the engine".into()),
            }],
            languages: vec![Language {
                language: "English".into(),
                level: LanguageLevel::Native,
            }],
            ..Default::default()
        };
        let raw = serde_json::to_string(&record).unwrap();
        let v = validate(&raw, None).unwrap();
        assert_eq!(v.record, record);
        assert!(!v.repaired);
    }

    #[test]
    fn cut_off_output_never_keeps_partial_values() {
        let raw = r#"{"full_name": "Jane", "experience": [{"position": "Engin"#;
        let v = validate(raw, None).unwrap();
        assert!(v.repaired);
        assert_eq!(v.record.full_name.as_deref(), Some("Jane"));
        assert!(v.record.experience.is_empty());
    }

    #[test]
    fn out_of_window_dates_are_nulled_even_when_well_formed() {
        let raw = r#"{
            "full_name": "Ada",
            "experience": [{"position": "Analyst", "from": "1895-01-01", "to": "2150-06-01"}],
            "education": [{"institution": "Oxford", "from": "1990-09-01", "to": "1994-06-30"}]
        }"#;
        let v = validate(raw, None).unwrap();
        assert!(!v.repaired);
        assert_eq!(v.record.experience[0].from, None);
        assert_eq!(v.record.experience[0].to, None);
        assert_eq!(v.record.education[0].from, date(1990, 9, 1));
        let paths: Vec<_> = v.warnings.iter().map(|w| w.path.as_str()).collect();
        assert_eq!(paths, vec!["experience[0].from", "experience[0].to"]);
    }

    #[test]
    fn lenient_and_strict_dates_share_one_window() {
        let strict = validate(
            r#"{"full_name": "Ada", "certificates": [{"title": "GWO", "from": "1899-12-31"}]}"#,
            None,
        )
        .unwrap();
        let lenient = validate(
            r#"{"full_name": "Ada", "certificates": [{"title": "GWO", "from": "Dec 1899"}]}"#,
            None,
        )
        .unwrap();
        assert_eq!(strict.record.certificates[0].from, None);
        assert_eq!(lenient.record.certificates[0].from, None);
    }
}
