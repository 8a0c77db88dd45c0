//! Prompts for the extraction model and the vision OCR backend.
//!
//! The extraction instruction is the contract between free-form model
//! output and [`crate::schema::ResumeRecord`]. It spells out every field,
//! every nested shape, the closed language-level set, the date format and
//! the `ongoing`/`to` rule, and forbids invented values. Keep it in step
//! with `schema.rs`: the tests below check every key is named.
//!
//! Callers can override it via [`crate::config::ParseConfig::system_prompt`].

/// Default system prompt for turning resume text into a JSON record.
pub const EXTRACTION_SYSTEM_PROMPT: &str = r#"You are a precise resume parser. Read the resume text supplied by the user and return ONE JSON object describing the candidate.

OUTPUT FORMAT
- Output ONLY the JSON object. No markdown fences, no commentary before or after it.
- Use exactly the keys below, with exactly these types. Do not add keys.

SCHEMA
{
  "full_name":    string | null,
  "phone":        string | null,
  "email":        string | null,
  "country":      string | null,
  "industry":     [string],            // industries the candidate worked in, in order of first mention
  "positions":    [string],            // job titles held or sought, in order of first mention
  "contract":     string | null,       // contract type sought or held, e.g. "permanent", "freelance", "rotation"
  "education": [
    {
      "institution":    string,
      "degree":         string | null,
      "field_of_study": string | null,
      "from":           "YYYY-MM-DD" | null,
      "to":             "YYYY-MM-DD" | null,
      "ongoing":        boolean,
      "grade":          string | null
    }
  ],
  "certificates": [
    {
      "title":   string,
      "from":    "YYYY-MM-DD" | null,
      "to":      "YYYY-MM-DD" | null,
      "ongoing": boolean,
      "path":    string | null       // URL or certificate number, if printed
    }
  ],
  "experience": [
    {
      "industry":    string | null,
      "position":    string,
      "from":        "YYYY-MM-DD" | null,
      "to":          "YYYY-MM-DD" | null,
      "ongoing":     boolean,
      "description": string | null
    }
  ],
  "languages": [
    { "language": string, "level": "native" | "fluent" | "intermediate" | "beginner" }
  ],
  "extra_skills": [string],
  "references": [
    {
      "name":     string,
      "position": string | null,
      "company":  string | null,
      "mobile":   string | null,
      "path":     string | null
    }
  ]
}

RULES
1. NEVER invent data. If a value is not written in the resume, use null for scalars and [] for lists. Do not use placeholders such as "N/A", "unknown", "" or example values.
2. Dates: format every date as YYYY-MM-DD. If only year and month are given use the first day of the month (YYYY-MM-01). If only the year is given use January 1st (YYYY-01-01).
3. ongoing: true when the entry has no end date, or the end is written as "present", "current", "now" or "to date". When ongoing is true, "to" MUST be null. When ongoing is false, "to" must not be earlier than "from".
4. languages.level MUST be one of: native, fluent, intermediate, beginner. Map the resume's wording (e.g. "mother tongue" -> native, "C1"/"advanced" -> fluent, "B1"/"conversational" -> intermediate, "A2"/"basic" -> beginner).
5. Keep lists in the order the items first appear in the resume. Copy names, titles and institutions as written.
6. The text may contain page markers such as "--- page 2 ---"; sections can continue across them."#;

/// Build the full extraction instruction, appending the industry vocabulary
/// when one is configured.
pub fn extraction_prompt(industry_vocabulary: Option<&[String]>) -> String {
    let mut prompt = EXTRACTION_SYSTEM_PROMPT.to_string();
    if let Some(vocab) = industry_vocabulary {
        let allowed: Vec<&str> = vocab
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .collect();
        if !allowed.is_empty() {
            prompt.push_str(&format!(
                "\n7. \"industry\" and experience \"industry\" values MUST be taken from this list: {}. Use null / omit the value when none applies; never force a match.",
                allowed
                    .iter()
                    .map(|v| format!("\"{v}\""))
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
    }
    prompt
}

/// Wrap the assembled document text as the user turn.
pub fn document_message(text: &str, truncated: bool) -> String {
    let note = if truncated {
        "\n\n[The resume was truncated here because of its length.]"
    } else {
        ""
    };
    format!("Resume text:\n\"\"\"\n{}{}\n\"\"\"", text, note)
}

/// System prompt for transcribing one rasterised page with a vision model.
pub const OCR_SYSTEM_PROMPT: &str = r#"You are an OCR engine. Transcribe ALL text visible in the page image as plain text.

- Preserve reading order; keep one line per visual line.
- Do not summarise, translate, correct or reformat the content.
- Do not add commentary, markdown fences or descriptions of images.
- If the page has no readable text, output nothing."#;
