//! Form validation and sanitization
//!
//! All functions are pure. Form validators either return a fully sanitized
//! field map or the first error encountered; nothing is half-applied.
//!
//! # Example
//!
//! ```
//! use campstore::validate;
//!
//! assert_eq!(validate::email(" Jane.Doe@Example.ORG ").unwrap(), "jane.doe@example.org");
//! assert!(validate::email("bad@@x").is_err());
//!
//! assert_eq!(validate::phone("+33 6 12 34 56 78").unwrap(), "+33612345678");
//! assert_eq!(validate::sanitize_text("  <b>Hi</b>  ", 100), "bHi/b");
//! ```

use super::record::Fields;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;

/// Longest accepted email address
pub const MAX_EMAIL_LEN: usize = 254;
/// Maximum length for names, schools and places
pub const MAX_SHORT_TEXT: usize = 100;
/// Maximum length for motivation statements and messages
pub const MAX_LONG_TEXT: usize = 2000;
/// Minimum length of an applicant's motivation statement
pub const MIN_MOTIVATION: usize = 20;
/// Minimum length of a contact message
pub const MIN_MESSAGE: usize = 10;
/// Accepted applicant ages, inclusive
pub const AGE_RANGE: (i64, i64) = (14, 18);

pub const GRADES: [&str; 5] = ["quatrieme", "troisieme", "seconde", "premiere", "terminale"];
pub const INTERESTS: [&str; 4] = ["participant", "parent", "intervenant", "partenaire"];

const APPLICANT_REQUIRED: [&str; 11] = [
    "first_name",
    "last_name",
    "email",
    "phone",
    "age",
    "grade",
    "school",
    "city",
    "region",
    "district",
    "motivation",
];
const APPLICANT_SHORT_TEXT: [&str; 6] = ["first_name", "last_name", "school", "city", "region", "district"];
const MESSAGE_REQUIRED: [&str; 4] = ["name", "email", "message", "interest"];
const PARENT_TEXT: [&str; 3] = ["name", "relationship", "occupation"];

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("valid email regex")
});
static INTERNATIONAL_PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[0-9]{8,15}$").expect("valid phone regex"));
static NATIONAL_PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{8,15}$").expect("valid phone regex"));

/// Reasons a submitted form is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("field `{0}` is required")]
    Missing(String),
    #[error("field `{field}` must be {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },
    #[error("invalid email address")]
    InvalidEmail,
    #[error("invalid phone number")]
    InvalidPhone,
    #[error("field `{field}` must be at least {min} characters")]
    TooShort { field: String, min: usize },
    #[error("field `{field}` has unsupported value `{value}`")]
    NotAllowed { field: String, value: String },
    #[error("field `{field}` is not a whole number")]
    NotANumber { field: String },
    #[error("field `{field}` must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        value: i64,
    },
}

pub type Result<T> = std::result::Result<T, ValidationError>;

/// Check an email address and normalize it to trimmed lower case
pub fn email(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_EMAIL_LEN || !EMAIL_RE.is_match(trimmed) {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(trimmed.to_lowercase())
}

/// Check a phone number and normalize it to `+digits` or `digits`
///
/// Spaces, dashes, dots, slashes and parentheses are dropped and a leading
/// `00` international prefix is rewritten to `+`.
pub fn phone(raw: &str) -> Result<String> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')' | '/'))
        .collect();

    let canonical = match compact.strip_prefix("00") {
        Some(rest) if !rest.is_empty() => format!("+{rest}"),
        _ => compact,
    };

    if INTERNATIONAL_PHONE_RE.is_match(&canonical) || NATIONAL_PHONE_RE.is_match(&canonical) {
        Ok(canonical)
    } else {
        Err(ValidationError::InvalidPhone)
    }
}

/// Strip control and markup characters, trim, and cut to `max_chars`
pub fn sanitize_text(raw: &str, max_chars: usize) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '<' | '>' | '"' | '\''))
        .collect();
    cleaned.trim().chars().take(max_chars).collect()
}

/// Fetch a field that must be present and non-blank
pub fn required<'a>(fields: &'a Fields, name: &str) -> Result<&'a Value> {
    match fields.get(name) {
        None | Some(Value::Null) => Err(ValidationError::Missing(name.to_string())),
        Some(Value::String(s)) if s.trim().is_empty() => {
            Err(ValidationError::Missing(name.to_string()))
        }
        Some(value) => Ok(value),
    }
}

fn as_str<'a>(field: &str, value: &'a Value) -> Result<&'a str> {
    value.as_str().ok_or_else(|| ValidationError::WrongType {
        field: field.to_string(),
        expected: "a string",
    })
}

/// Sanitized free text with an optional minimum length
pub fn text(field: &str, value: &Value, max_chars: usize, min_chars: usize) -> Result<String> {
    let cleaned = sanitize_text(as_str(field, value)?, max_chars);
    if cleaned.chars().count() < min_chars {
        return Err(ValidationError::TooShort {
            field: field.to_string(),
            min: min_chars,
        });
    }
    Ok(cleaned)
}

/// Value that must be one of `allowed`, compared exactly
pub fn one_of(field: &str, value: &Value, allowed: &[&str]) -> Result<String> {
    let s = as_str(field, value)?;
    if allowed.contains(&s) {
        Ok(s.to_string())
    } else {
        Err(ValidationError::NotAllowed {
            field: field.to_string(),
            value: s.to_string(),
        })
    }
}

/// Whole number given as a JSON number or numeric string, within `min..=max`
pub fn integer_in_range(field: &str, value: &Value, min: i64, max: i64) -> Result<i64> {
    let not_a_number = || ValidationError::NotANumber {
        field: field.to_string(),
    };

    let parsed = match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i,
            None => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => f as i64,
                _ => return Err(not_a_number()),
            },
        },
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| not_a_number())?,
        _ => return Err(not_a_number()),
    };

    if parsed < min || parsed > max {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min,
            max,
            value: parsed,
        });
    }
    Ok(parsed)
}

/// Validate and sanitize a camp application form
///
/// Required: `first_name`, `last_name`, `email`, `phone`, `age`, `grade`,
/// `school`, `city`, `region`, `district`, `motivation`. An optional
/// `parent` object is kept with its text sanitized and its contact details
/// checked. Unknown keys are dropped.
pub fn validate_applicant(fields: &Fields) -> Result<Fields> {
    for name in APPLICANT_REQUIRED {
        required(fields, name)?;
    }

    let mut clean = Fields::new();
    clean.insert(
        "email".into(),
        email(as_str("email", required(fields, "email")?)?)?.into(),
    );
    clean.insert(
        "phone".into(),
        phone(as_str("phone", required(fields, "phone")?)?)?.into(),
    );
    let (min_age, max_age) = AGE_RANGE;
    clean.insert(
        "age".into(),
        integer_in_range("age", required(fields, "age")?, min_age, max_age)?.into(),
    );
    clean.insert(
        "grade".into(),
        one_of("grade", required(fields, "grade")?, &GRADES)?.into(),
    );
    for name in APPLICANT_SHORT_TEXT {
        let value = text(name, required(fields, name)?, MAX_SHORT_TEXT, 1)?;
        clean.insert(name.into(), value.into());
    }
    clean.insert(
        "motivation".into(),
        text(
            "motivation",
            required(fields, "motivation")?,
            MAX_LONG_TEXT,
            MIN_MOTIVATION,
        )?
        .into(),
    );

    match fields.get("parent") {
        None | Some(Value::Null) => {}
        Some(Value::Object(parent)) => {
            clean.insert("parent".into(), Value::Object(validate_parent(parent)?));
        }
        Some(_) => {
            return Err(ValidationError::WrongType {
                field: "parent".into(),
                expected: "an object",
            });
        }
    }

    Ok(clean)
}

fn validate_parent(parent: &Fields) -> Result<Fields> {
    let mut clean = Fields::new();
    for name in PARENT_TEXT {
        if let Some(value) = parent.get(name).filter(|v| !v.is_null()) {
            let field = format!("parent.{name}");
            clean.insert(name.into(), text(&field, value, MAX_SHORT_TEXT, 0)?.into());
        }
    }
    if let Some(value) = parent.get("email").filter(|v| !v.is_null()) {
        clean.insert("email".into(), email(as_str("parent.email", value)?)?.into());
    }
    if let Some(value) = parent.get("phone").filter(|v| !v.is_null()) {
        clean.insert("phone".into(), phone(as_str("parent.phone", value)?)?.into());
    }
    Ok(clean)
}

/// Validate and sanitize a contact form message
///
/// Required: `name`, `email`, `message`, `interest`; `phone` is optional.
pub fn validate_message(fields: &Fields) -> Result<Fields> {
    for name in MESSAGE_REQUIRED {
        required(fields, name)?;
    }

    let mut clean = Fields::new();
    clean.insert(
        "name".into(),
        text("name", required(fields, "name")?, MAX_SHORT_TEXT, 1)?.into(),
    );
    clean.insert(
        "email".into(),
        email(as_str("email", required(fields, "email")?)?)?.into(),
    );

    let phone_value = match fields.get("phone") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) if s.trim().is_empty() => String::new(),
        Some(value) => phone(as_str("phone", value)?)?,
    };
    clean.insert("phone".into(), phone_value.into());

    clean.insert(
        "interest".into(),
        one_of("interest", required(fields, "interest")?, &INTERESTS)?.into(),
    );
    clean.insert(
        "message".into(),
        text("message", required(fields, "message")?, MAX_LONG_TEXT, MIN_MESSAGE)?.into(),
    );

    Ok(clean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn applicant() -> Fields {
        fields(json!({
            "first_name": "Awa",
            "last_name": "Diop",
            "email": "Awa.Diop@Example.com",
            "phone": "+221 77 123 45 67",
            "age": "16",
            "grade": "seconde",
            "school": "Lycee Blaise Diagne",
            "city": "Dakar",
            "region": "Dakar",
            "district": "Plateau",
            "motivation": "I want to learn how proofs work and meet other students."
        }))
    }

    #[test]
    fn test_email_shapes() {
        assert_eq!(email("a@b.co").unwrap(), "a@b.co");
        assert_eq!(email("A@B.CO").unwrap(), "a@b.co");
        assert_eq!(email("bad@@x"), Err(ValidationError::InvalidEmail));
        assert_eq!(email("no-at-sign.com"), Err(ValidationError::InvalidEmail));
        assert_eq!(email("a@b.c"), Err(ValidationError::InvalidEmail));
        assert_eq!(email(""), Err(ValidationError::InvalidEmail));

        let long = format!("{}@example.com", "a".repeat(250));
        assert_eq!(email(&long), Err(ValidationError::InvalidEmail));
    }

    #[test]
    fn test_phone_normalization() {
        assert_eq!(phone("06 12 34 56 78").unwrap(), "0612345678");
        assert_eq!(phone("0033 6 12 34 56 78").unwrap(), "+33612345678");
        assert_eq!(phone("(221) 77-123-45-67").unwrap(), "221771234567");
        assert_eq!(phone("1234567"), Err(ValidationError::InvalidPhone));
        assert_eq!(phone("+33 6 12 ab 56 78"), Err(ValidationError::InvalidPhone));
        assert_eq!(phone("6+12345678"), Err(ValidationError::InvalidPhone));
    }

    #[test]
    fn test_sanitize_strips_markup_and_controls() {
        assert_eq!(
            sanitize_text("  <script>alert('x')</script>\u{0}  ", 100),
            "scriptalert(x)/script"
        );
        assert_eq!(sanitize_text("éèà", 2), "éè");
        assert_eq!(sanitize_text("line\none", 100), "lineone");
    }

    #[test]
    fn test_age_bounds_are_inclusive() {
        assert!(integer_in_range("age", &json!(14), 14, 18).is_ok());
        assert!(integer_in_range("age", &json!(18), 14, 18).is_ok());
        assert!(integer_in_range("age", &json!("18"), 14, 18).is_ok());
        assert_eq!(
            integer_in_range("age", &json!(13), 14, 18),
            Err(ValidationError::OutOfRange {
                field: "age".into(),
                min: 14,
                max: 18,
                value: 13
            })
        );
        assert!(matches!(
            integer_in_range("age", &json!("19"), 14, 18),
            Err(ValidationError::OutOfRange { value: 19, .. })
        ));
        assert!(matches!(
            integer_in_range("age", &json!("sixteen"), 14, 18),
            Err(ValidationError::NotANumber { .. })
        ));
        assert!(matches!(
            integer_in_range("age", &json!(15.5), 14, 18),
            Err(ValidationError::NotANumber { .. })
        ));
    }

    #[test]
    fn test_valid_applicant_is_normalized() {
        let clean = validate_applicant(&applicant()).unwrap();
        assert_eq!(clean["email"], "awa.diop@example.com");
        assert_eq!(clean["phone"], "+221771234567");
        assert_eq!(clean["age"], 16);
        assert_eq!(clean["grade"], "seconde");
    }

    #[test]
    fn test_applicant_missing_field() {
        let mut form = applicant();
        form.insert("school".into(), json!("   "));
        assert_eq!(
            validate_applicant(&form),
            Err(ValidationError::Missing("school".into()))
        );
    }

    #[test]
    fn test_applicant_unknown_grade_is_rejected() {
        let mut form = applicant();
        form.insert("grade".into(), json!("Seconde"));
        assert!(matches!(
            validate_applicant(&form),
            Err(ValidationError::NotAllowed { .. })
        ));
    }

    #[test]
    fn test_applicant_short_motivation() {
        let mut form = applicant();
        form.insert("motivation".into(), json!("<b>too short</b>"));
        assert_eq!(
            validate_applicant(&form),
            Err(ValidationError::TooShort {
                field: "motivation".into(),
                min: MIN_MOTIVATION
            })
        );
    }

    #[test]
    fn test_applicant_drops_unknown_keys_and_checks_parent() {
        let mut form = applicant();
        form.insert("status".into(), json!("confirmed"));
        form.insert(
            "parent".into(),
            json!({"name": "Fatou Diop", "phone": "77 765 43 21 00"}),
        );
        let clean = validate_applicant(&form).unwrap();
        assert!(clean.get("status").is_none());
        assert_eq!(clean["parent"]["phone"], "77765432100");

        form.insert("parent".into(), json!({"email": "nope"}));
        assert_eq!(validate_applicant(&form), Err(ValidationError::InvalidEmail));
    }

    #[test]
    fn test_message_validation() {
        let form = fields(json!({
            "name": "Jean",
            "email": "Jean@Mail.fr",
            "message": "Is there a bus from the station?",
            "interest": "parent"
        }));
        let clean = validate_message(&form).unwrap();
        assert_eq!(clean["email"], "jean@mail.fr");
        assert_eq!(clean["phone"], "");

        let mut bad = form.clone();
        bad.insert("interest".into(), json!("sponsor"));
        assert!(matches!(
            validate_message(&bad),
            Err(ValidationError::NotAllowed { .. })
        ));
    }
}
