// Response parser & normalizer
//
// The one boundary in the system where untrusted, dynamically-shaped model
// output becomes strictly-typed records. Policy: salvage every correct line
// item from a partially-good response, but never persist an amount that
// would corrupt the numeric aggregate.
//
// Per-record validation, never per-batch: one bad candidate drops that
// candidate alone. Only a response that fails structural parsing outright
// yields zero records.

use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use crate::error::TrackerError;
use crate::expense::{Category, NewExpense};

/// Quantity substituted when the model omits one, as the prompt instructs.
pub const DEFAULT_QUANTITY: &str = "1 piece";

/// Why one candidate was dropped while its neighbors survived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipNotice {
    /// Position of the candidate in the response, 0-based.
    pub index: usize,
    pub reason: String,
}

impl std::fmt::Display for SkipNotice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "item {} skipped: {}", self.index + 1, self.reason)
    }
}

/// Records that survived normalization plus notices for the ones that
/// didn't. Order matches the response.
#[derive(Debug, Default)]
pub struct NormalizedBill {
    pub records: Vec<NewExpense>,
    pub skipped: Vec<SkipNotice>,
}

/// Parse raw extraction text into expense candidates.
///
/// `processing_date` is injected rather than read from the wall clock so
/// the date-fallback policy is deterministic under test.
pub fn normalize_response(
    raw_text: &str,
    processing_date: NaiveDate,
    person: &str,
) -> Result<NormalizedBill, TrackerError> {
    let cleaned = strip_code_fences(raw_text);

    let parsed: Value = serde_json::from_str(cleaned)
        .map_err(|e| TrackerError::parse(format!("invalid JSON: {e}")))?;

    // Accept either the prompted envelope {"items": [...], "date": ...}
    // or a bare top-level array, which the model sometimes sends.
    let (items, bill_date) = match &parsed {
        Value::Object(map) => {
            let items = map
                .get("items")
                .and_then(Value::as_array)
                .ok_or_else(|| TrackerError::parse("missing 'items' array"))?;
            let bill_date = map
                .get("date")
                .and_then(Value::as_str)
                .and_then(parse_date_lenient);
            (items.as_slice(), bill_date)
        }
        Value::Array(items) => (items.as_slice(), None),
        _ => return Err(TrackerError::parse("expected an object or array")),
    };

    let fallback_date = bill_date.unwrap_or(processing_date);

    let mut out = NormalizedBill::default();
    for (index, candidate) in items.iter().enumerate() {
        match normalize_item(candidate, fallback_date, person) {
            Ok(record) => out.records.push(record),
            Err(reason) => {
                debug!(index, %reason, "dropping candidate");
                out.skipped.push(SkipNotice { index, reason });
            }
        }
    }
    Ok(out)
}

/// Coerce one candidate object into a NewExpense, or say why it can't be.
fn normalize_item(
    candidate: &Value,
    fallback_date: NaiveDate,
    person: &str,
) -> Result<NewExpense, String> {
    let obj = candidate
        .as_object()
        .ok_or_else(|| format!("candidate is not an object: {candidate}"))?;

    // Required: non-empty item name.
    let item = obj
        .get("item")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or("");
    if item.is_empty() {
        return Err("missing item name".to_string());
    }

    // Required: coercible non-negative amount. This is the only field
    // whose failure drops the record.
    let amount = obj
        .get("amount")
        .and_then(coerce_amount)
        .ok_or_else(|| {
            format!(
                "amount '{}' is not a non-negative number",
                obj.get("amount").cloned().unwrap_or(Value::Null)
            )
        })?;

    // Lenient: item date, then bill date (already folded into
    // fallback_date by the caller).
    let date = obj
        .get("date")
        .and_then(Value::as_str)
        .and_then(parse_date_lenient)
        .unwrap_or(fallback_date);

    // Lenient: unknown category becomes Other.
    let category = obj
        .get("category")
        .and_then(Value::as_str)
        .map(Category::parse_lenient)
        .unwrap_or(Category::Other);

    // Lenient: blank quantity gets the prompt's default.
    let quantity = obj
        .get("quantity")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .unwrap_or(DEFAULT_QUANTITY)
        .to_string();

    Ok(NewExpense {
        item: item.to_string(),
        quantity,
        date,
        amount,
        category,
        person: person.to_string(),
    })
}

/// Accept a JSON number or a numeric string. Models frequently echo the
/// bill's formatting ("₹1,250.00"), so currency symbols and thousand
/// separators are stripped before parsing. Negative, NaN, and infinite
/// values are refused.
fn coerce_amount(value: &Value) -> Option<f64> {
    let amount = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned: String = s
                .trim()
                .chars()
                .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
                .collect();
            cleaned.parse::<f64>().ok()?
        }
        _ => return None,
    };
    (amount.is_finite() && amount >= 0.0).then_some(amount)
}

/// Prompted format first, then the formats bills actually carry.
fn parse_date_lenient(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    const FORMATS: [&str; 4] = ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y"];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// The model often wraps its JSON in Markdown code fences despite being
/// told not to. Strip one outer fence, with or without a language tag.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}

// ============================================================================
// TESTS
// ============================================================================
