// Expense data model
// Everything the store persists and the pipeline produces lives here.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

// ============================================================================
// CATEGORY
// ============================================================================

/// Closed category set with `Other` as the total fallback.
///
/// Categories are a tagged variant set, not an open string, so analytics
/// grouping is exhaustive: every record lands in exactly one bucket and a
/// `match` over `Category` cannot silently miss one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Groceries,
    Snacks,
    Beverages,
    #[serde(rename = "Personal Care")]
    PersonalCare,
    Household,
    Medicine,
    Other,
}

impl Category {
    /// All variants, in display order. Kept in sync with the extraction
    /// prompt's category list.
    pub const ALL: [Category; 7] = [
        Category::Groceries,
        Category::Snacks,
        Category::Beverages,
        Category::PersonalCare,
        Category::Household,
        Category::Medicine,
        Category::Other,
    ];

    /// Human-readable label, matching the stored column value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Groceries => "Groceries",
            Category::Snacks => "Snacks",
            Category::Beverages => "Beverages",
            Category::PersonalCare => "Personal Care",
            Category::Household => "Household",
            Category::Medicine => "Medicine",
            Category::Other => "Other",
        }
    }

    /// Case-insensitive match against the closed set.
    ///
    /// Anything the model invents ("food", "produce", "") falls back to
    /// `Other` rather than being rejected — category is never a reason to
    /// drop a record.
    pub fn parse_lenient(raw: &str) -> Category {
        let normalized = raw.trim().to_lowercase();
        match normalized.as_str() {
            "groceries" | "grocery" => Category::Groceries,
            "snacks" | "snack" => Category::Snacks,
            "beverages" | "beverage" => Category::Beverages,
            "personal care" | "personalcare" | "personal_care" => Category::PersonalCare,
            "household" => Category::Household,
            "medicine" | "medicines" => Category::Medicine,
            _ => Category::Other,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = TrackerError;

    /// Strict parse for CLI flags: unknown names are an error here (the
    /// user typed them), unlike `parse_lenient` for model output.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let candidate = Category::parse_lenient(s);
        if candidate == Category::Other && !s.trim().eq_ignore_ascii_case("other") {
            return Err(TrackerError::RecordRejected {
                reason: format!(
                    "unknown category '{}' (expected one of: {})",
                    s,
                    Category::ALL.map(|c| c.as_str()).join(", ")
                ),
            });
        }
        Ok(candidate)
    }
}

// ============================================================================
// RECORDS
// ============================================================================

/// A normalized expense candidate that has passed validation but has not
/// been persisted yet. `id` and `created_at` do not exist at this stage —
/// the store assigns both on insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpense {
    /// Non-empty descriptive name ("Milk", "Dish soap").
    pub item: String,
    /// Free-form quantity with unit ("1L", "2 pieces"); unit not normalized.
    pub quantity: String,
    /// Purchase date; the processing date when the bill had none.
    pub date: NaiveDate,
    /// Non-negative amount. The one field analytics depends on for
    /// correctness, so coercion failure rejects the record upstream.
    pub amount: f64,
    pub category: Category,
    /// Optional attribution; empty string means unspecified.
    #[serde(default)]
    pub person: String,
}

/// A persisted expense row from the `expenditures` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    /// Store-assigned identity. Never set by the client.
    pub id: i64,
    pub item: String,
    pub quantity: String,
    pub date: NaiveDate,
    pub amount: f64,
    pub category: Category,
    #[serde(default)]
    pub person: String,
    /// Store-assigned insertion timestamp. Never set by the client.
    pub created_at: DateTime<Utc>,
}

impl ExpenseRecord {
    /// The mutable portion of a record, for round-tripping through the
    /// review/edit surface.
    pub fn fields(&self) -> NewExpense {
        NewExpense {
            item: self.item.clone(),
            quantity: self.quantity.clone(),
            date: self.date,
            amount: self.amount,
            category: self.category,
            person: self.person.clone(),
        }
    }
}

// ============================================================================
// UPDATE & FILTER
// ============================================================================

/// Partial-field patch for `update`. Absent fields are left untouched.
/// `id` and `created_at` are deliberately not patchable.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExpenseUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub person: Option<String>,
}

impl ExpenseUpdate {
    pub fn is_empty(&self) -> bool {
        self.item.is_none()
            && self.quantity.is_none()
            && self.date.is_none()
            && self.amount.is_none()
            && self.category.is_none()
            && self.person.is_none()
    }

    /// Corrected values must pass the same rules as initial extraction:
    /// item non-empty after trimming, amount finite and non-negative.
    pub fn validate(&self) -> Result<(), TrackerError> {
        if let Some(item) = &self.item {
            if item.trim().is_empty() {
                return Err(TrackerError::RecordRejected {
                    reason: "item must not be empty".to_string(),
                });
            }
        }
        if let Some(amount) = self.amount {
            if !amount.is_finite() || amount < 0.0 {
                return Err(TrackerError::RecordRejected {
                    reason: format!("amount must be a non-negative number, got {amount}"),
                });
            }
        }
        Ok(())
    }

    /// Apply the patch to an existing record's fields (for MemoryStore and
    /// for previewing edits).
    pub fn apply_to(&self, record: &mut ExpenseRecord) {
        if let Some(item) = &self.item {
            record.item = item.trim().to_string();
        }
        if let Some(quantity) = &self.quantity {
            record.quantity = quantity.clone();
        }
        if let Some(date) = self.date {
            record.date = date;
        }
        if let Some(amount) = self.amount {
            record.amount = amount;
        }
        if let Some(category) = self.category {
            record.category = category;
        }
        if let Some(person) = &self.person {
            record.person = person.clone();
        }
    }
}

/// List filter mirroring the review surface: date range, category, person.
/// Every field optional; an empty filter returns everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpenseFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub category: Option<Category>,
    pub person: Option<String>,
}

impl ExpenseFilter {
    pub fn matches(&self, record: &ExpenseRecord) -> bool {
        if let Some(from) = self.from {
            if record.date < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if record.date > to {
                return false;
            }
        }
        if let Some(category) = self.category {
            if record.category != category {
                return false;
            }
        }
        if let Some(person) = &self.person {
            if !record.person.eq_ignore_ascii_case(person) {
                return false;
            }
        }
        true
    }
}

// ============================================================================
// TESTS
// ============================================================================
