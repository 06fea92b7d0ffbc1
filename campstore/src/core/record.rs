//! Record and collection types shared by the store and its backends
//!
//! A [`Record`] has a small set of system fields managed by the store
//! (`id`, `status`, `created_at`, `status_changed_at`) and an open map of
//! collection-specific fields that is flattened into the same JSON object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::str::FromStr;

/// Collection-specific fields of a record
pub type Fields = Map<String, Value>;

/// Keys owned by the store; they never appear in [`Record::fields`]
pub const SYSTEM_FIELDS: [&str; 4] = ["id", "status", "created_at", "status_changed_at"];

/// One stored entity
///
/// # Example
///
/// ```
/// use campstore::Record;
///
/// let json = r#"{
///     "id": "STU0001",
///     "status": "pending",
///     "created_at": "2025-07-01T10:00:00Z",
///     "email": "a@b.co"
/// }"#;
///
/// let record: Record = serde_json::from_str(json).unwrap();
/// assert_eq!(record.str_field("email"), Some("a@b.co"));
/// assert!(record.status_changed_at.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_changed_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// Partial update applied by [`RecordStore::update`](crate::RecordStore::update)
///
/// Only the keys present are replaced. A status change also stamps
/// `status_changed_at`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Patch {
    /// Patch that only changes the status
    pub fn status(status: impl Into<String>) -> Self {
        Patch {
            status: Some(status.into()),
            fields: Fields::new(),
        }
    }

    /// Add a field replacement to the patch
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.fields.is_empty()
    }
}

/// Static description of a collection
///
/// The name doubles as the file stem of the file-backed store, so it is
/// restricted to lower-case ASCII letters, digits, `_` and `-`.
///
/// # Example
///
/// ```
/// use campstore::CollectionSpec;
///
/// let spec = CollectionSpec::new("waitlist", "WL", &["waiting", "admitted"])
///     .unique_field("email");
///
/// assert_eq!(spec.default_status, "waiting");
/// assert!(spec.is_valid_status("admitted"));
/// assert!(!spec.is_valid_status("Admitted"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub id_prefix: String,
    /// Width the sequence number is zero-padded to
    pub id_width: usize,
    pub statuses: Vec<String>,
    pub default_status: String,
    /// Field that must be unique across the collection, compared case-insensitively
    pub unique_field: Option<String>,
}

impl CollectionSpec {
    /// Create a spec; the first status is the default for new records
    pub fn new(name: &str, id_prefix: &str, statuses: &[&str]) -> Self {
        CollectionSpec {
            name: name.to_string(),
            id_prefix: id_prefix.to_string(),
            id_width: 4,
            statuses: statuses.iter().map(|s| s.to_string()).collect(),
            default_status: statuses.first().copied().unwrap_or_default().to_string(),
            unique_field: None,
        }
    }

    pub fn unique_field(mut self, field: &str) -> Self {
        self.unique_field = Some(field.to_string());
        self
    }

    pub fn default_status(mut self, status: &str) -> Self {
        self.default_status = status.to_string();
        self
    }

    pub fn id_width(mut self, width: usize) -> Self {
        self.id_width = width;
        self
    }

    /// Camp applicants: `STU0001`, one application per email address
    pub fn applicants() -> Self {
        CollectionSpec::new("applicants", "STU", &["pending", "confirmed", "rejected"])
            .unique_field("email")
    }

    /// Contact form messages: `MSG0001`
    pub fn messages() -> Self {
        CollectionSpec::new("messages", "MSG", &["new", "read", "replied"])
    }

    pub fn is_valid_status(&self, status: &str) -> bool {
        self.statuses.iter().any(|s| s == status)
    }

    pub fn has_valid_name(&self) -> bool {
        is_valid_collection_name(&self.name)
    }
}

pub(crate) fn is_valid_collection_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
}

/// Key used to order the output of [`RecordStore::list_by`](crate::RecordStore::list_by)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    CreatedAt,
    Id,
    Status,
    /// Any collection-specific field; records missing it sort first
    Field(String),
}

impl FromStr for SortKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "created_at" => SortKey::CreatedAt,
            "id" => SortKey::Id,
            "status" => SortKey::Status,
            other => SortKey::Field(other.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            _ => Err(format!("invalid sort order: {s}. Valid options are: asc, desc")),
        }
    }
}

impl SortKey {
    pub(crate) fn compare(&self, a: &Record, b: &Record) -> Ordering {
        match self {
            SortKey::CreatedAt => a.created_at.cmp(&b.created_at),
            SortKey::Id => a.id.cmp(&b.id),
            SortKey::Status => a.status.cmp(&b.status),
            SortKey::Field(name) => compare_values(a.field(name), b.field(name)),
        }
    }
}

/// Sort records in place; the sort is stable so ties keep insertion order
pub(crate) fn sort_records(records: &mut [Record], key: &SortKey, order: SortOrder) {
    match order {
        SortOrder::Ascending => records.sort_by(|a, b| key.compare(a, b)),
        SortOrder::Descending => records.sort_by(|a, b| key.compare(b, a)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            (Value::Number(x), Value::Number(y)) => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.total_cmp(&y)
            }
            (Value::String(x), Value::String(y)) => x.cmp(y),
            _ if type_rank(a) != type_rank(b) => type_rank(a).cmp(&type_rank(b)),
            _ => a.to_string().cmp(&b.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, created: &str, fields: Value) -> Record {
        Record {
            id: id.to_string(),
            status: "pending".to_string(),
            created_at: created.parse().unwrap(),
            status_changed_at: None,
            fields: fields.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_record_json_is_flat() {
        let r = record("STU0001", "2025-07-01T10:00:00Z", json!({"email": "a@b.co"}));
        let value = serde_json::to_value(&r).unwrap();

        assert_eq!(value["id"], "STU0001");
        assert_eq!(value["email"], "a@b.co");
        assert!(value.get("fields").is_none());
        assert!(value.get("status_changed_at").is_none());
    }

    #[test]
    fn test_default_sort_is_newest_first() {
        let mut records = vec![
            record("STU0001", "2025-07-01T10:00:00Z", json!({})),
            record("STU0002", "2025-07-02T10:00:00Z", json!({})),
            record("STU0003", "2025-06-30T10:00:00Z", json!({})),
        ];
        sort_records(&mut records, &SortKey::default(), SortOrder::default());

        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["STU0002", "STU0001", "STU0003"]);
    }

    #[test]
    fn test_field_sort_keeps_insertion_order_for_ties() {
        let mut records = vec![
            record("A", "2025-07-01T10:00:00Z", json!({"age": 15})),
            record("B", "2025-07-01T10:00:00Z", json!({"age": 14})),
            record("C", "2025-07-01T10:00:00Z", json!({"age": 15})),
            record("D", "2025-07-01T10:00:00Z", json!({})),
        ];
        sort_records(&mut records, &SortKey::Field("age".into()), SortOrder::Ascending);

        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["D", "B", "A", "C"]);

        sort_records(&mut records, &SortKey::Field("age".into()), SortOrder::Descending);
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["A", "C", "B", "D"]);
    }

    #[test]
    fn test_sort_parsing() {
        assert_eq!("created_at".parse::<SortKey>().unwrap(), SortKey::CreatedAt);
        assert_eq!(
            "last_name".parse::<SortKey>().unwrap(),
            SortKey::Field("last_name".into())
        );
        assert_eq!("ASC".parse::<SortOrder>().unwrap(), SortOrder::Ascending);
        assert!("sideways".parse::<SortOrder>().is_err());
    }

    #[test]
    fn test_collection_name_rules() {
        assert!(CollectionSpec::applicants().has_valid_name());
        assert!(!CollectionSpec::new("../etc", "X", &["a"]).has_valid_name());
        assert!(!CollectionSpec::new("", "X", &["a"]).has_valid_name());
    }
}
