// Expense store adapter
//
// The store is a remote table named `expenditures`. Every operation is a
// network call that reflects the table's state at call time; there is no
// local cache and no silent retry. The trait exists so the pipeline and
// the tests don't care which side of the network the rows live on.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::sync::RwLock;
use tracing::{debug, instrument};

use crate::config::AppConfig;
use crate::error::TrackerError;
use crate::expense::{ExpenseFilter, ExpenseRecord, ExpenseUpdate, NewExpense};

pub const EXPENDITURES_TABLE: &str = "expenditures";

#[async_trait]
pub trait ExpenseStore: Send + Sync {
    /// Persist one record. The store assigns `id` and `created_at`.
    async fn insert(&self, expense: NewExpense) -> Result<ExpenseRecord, TrackerError>;

    /// All records matching the filter, ordered by date desc then
    /// created_at desc (newest purchases first).
    async fn list(&self, filter: &ExpenseFilter) -> Result<Vec<ExpenseRecord>, TrackerError>;

    /// Patch the given fields. `NotFound` when the id does not exist.
    async fn update(&self, id: i64, update: &ExpenseUpdate) -> Result<ExpenseRecord, TrackerError>;

    /// Remove a record. `NotFound` when the id does not exist.
    async fn delete(&self, id: i64) -> Result<(), TrackerError>;

    /// Case-insensitive substring match on the item name.
    async fn search(&self, text: &str) -> Result<Vec<ExpenseRecord>, TrackerError>;
}

// ============================================================================
// SUPABASE (PostgREST) ADAPTER
// ============================================================================

pub struct SupabaseStore {
    client: reqwest::Client,
    table_url: String,
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Result<Self, TrackerError> {
        use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

        let mut headers = HeaderMap::new();
        let key_value = HeaderValue::from_str(&config.supabase_key)
            .map_err(|_| TrackerError::store("store key contains invalid header characters"))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.supabase_key))
            .map_err(|_| TrackerError::store("store key contains invalid header characters"))?;
        headers.insert("apikey", key_value);
        headers.insert(AUTHORIZATION, bearer);

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| TrackerError::store(format!("failed to build HTTP client: {e}")))?;

        Ok(SupabaseStore {
            client,
            table_url: format!("{}/rest/v1/{}", config.supabase_url, EXPENDITURES_TABLE),
        })
    }

    fn transport_error(e: reqwest::Error) -> TrackerError {
        if e.is_timeout() {
            TrackerError::store("request timed out")
        } else {
            TrackerError::store(format!("network error: {e}"))
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TrackerError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response.text().await.unwrap_or_default();
        let snippet: String = detail.chars().take(200).collect();
        Err(TrackerError::store(format!("store returned {status}: {snippet}")))
    }

    /// PostgREST returns the affected rows as a JSON array when asked for
    /// a representation. An empty array on update/delete means the id
    /// filter matched nothing.
    async fn rows(response: reqwest::Response) -> Result<Vec<ExpenseRecord>, TrackerError> {
        let body: Value = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| TrackerError::store(format!("unreadable store response: {e}")))?;
        serde_json::from_value(body)
            .map_err(|e| TrackerError::store(format!("unexpected row shape: {e}")))
    }

    fn filter_params(filter: &ExpenseFilter) -> Vec<(String, String)> {
        let mut params = vec![
            ("select".to_string(), "*".to_string()),
            ("order".to_string(), "date.desc,created_at.desc".to_string()),
        ];
        if let Some(from) = filter.from {
            params.push(("date".to_string(), format!("gte.{from}")));
        }
        if let Some(to) = filter.to {
            params.push(("date".to_string(), format!("lte.{to}")));
        }
        if let Some(category) = filter.category {
            params.push(("category".to_string(), format!("eq.{}", category.as_str())));
        }
        if let Some(person) = &filter.person {
            // ilike without wildcards = case-insensitive equality.
            params.push(("person".to_string(), format!("ilike.{person}")));
        }
        params
    }
}

#[async_trait]
impl ExpenseStore for SupabaseStore {
    #[instrument(skip(self, expense), fields(item = %expense.item))]
    async fn insert(&self, expense: NewExpense) -> Result<ExpenseRecord, TrackerError> {
        let response = self
            .client
            .post(&self.table_url)
            .header("Prefer", "return=representation")
            .json(&expense)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let mut rows = Self::rows(response).await?;
        rows.pop()
            .ok_or_else(|| TrackerError::store("insert returned no row"))
    }

    #[instrument(skip(self, filter))]
    async fn list(&self, filter: &ExpenseFilter) -> Result<Vec<ExpenseRecord>, TrackerError> {
        let response = self
            .client
            .get(&self.table_url)
            .query(&Self::filter_params(filter))
            .send()
            .await
            .map_err(Self::transport_error)?;
        Self::rows(response).await
    }

    #[instrument(skip(self, update))]
    async fn update(&self, id: i64, update: &ExpenseUpdate) -> Result<ExpenseRecord, TrackerError> {
        update.validate()?;
        if update.is_empty() {
            return Err(TrackerError::RecordRejected {
                reason: "update contains no fields".to_string(),
            });
        }

        let response = self
            .client
            .patch(&self.table_url)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(update)
            .send()
            .await
            .map_err(Self::transport_error)?;

        let mut rows = Self::rows(response).await?;
        rows.pop().ok_or(TrackerError::NotFound { id })
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: i64) -> Result<(), TrackerError> {
        let response = self
            .client
            .delete(&self.table_url)
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .send()
            .await
            .map_err(Self::transport_error)?;

        let rows = Self::rows(response).await?;
        if rows.is_empty() {
            return Err(TrackerError::NotFound { id });
        }
        debug!(id, "record deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn search(&self, text: &str) -> Result<Vec<ExpenseRecord>, TrackerError> {
        let response = self
            .client
            .get(&self.table_url)
            .query(&[
                ("select", "*"),
                ("order", "date.desc,created_at.desc"),
                ("item", &format!("ilike.*{text}*")),
            ])
            .send()
            .await
            .map_err(Self::transport_error)?;
        Self::rows(response).await
    }
}

// ============================================================================
// IN-MEMORY STORE
// ============================================================================

/// Store with the same contract as the remote table, held in memory.
/// Backs the test suite and offline runs; ids are sequential, timestamps
/// are insertion time.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    next_id: i64,
    rows: Vec<ExpenseRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted(mut rows: Vec<ExpenseRecord>) -> Vec<ExpenseRecord> {
        rows.sort_by(|a, b| {
            b.date
                .cmp(&a.date)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        rows
    }
}

#[async_trait]
impl ExpenseStore for MemoryStore {
    async fn insert(&self, expense: NewExpense) -> Result<ExpenseRecord, TrackerError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        inner.next_id += 1;
        let record = ExpenseRecord {
            id: inner.next_id,
            item: expense.item,
            quantity: expense.quantity,
            date: expense.date,
            amount: expense.amount,
            category: expense.category,
            person: expense.person,
            created_at: Utc::now(),
        };
        inner.rows.push(record.clone());
        Ok(record)
    }

    async fn list(&self, filter: &ExpenseFilter) -> Result<Vec<ExpenseRecord>, TrackerError> {
        let inner = self.inner.read().expect("store lock poisoned");
        let rows = inner
            .rows
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        Ok(Self::sorted(rows))
    }

    async fn update(&self, id: i64, update: &ExpenseUpdate) -> Result<ExpenseRecord, TrackerError> {
        update.validate()?;
        if update.is_empty() {
            return Err(TrackerError::RecordRejected {
                reason: "update contains no fields".to_string(),
            });
        }
        let mut inner = self.inner.write().expect("store lock poisoned");
        let record = inner
            .rows
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(TrackerError::NotFound { id })?;
        update.apply_to(record);
        Ok(record.clone())
    }

    async fn delete(&self, id: i64) -> Result<(), TrackerError> {
        let mut inner = self.inner.write().expect("store lock poisoned");
        let before = inner.rows.len();
        inner.rows.retain(|r| r.id != id);
        if inner.rows.len() == before {
            return Err(TrackerError::NotFound { id });
        }
        Ok(())
    }

    async fn search(&self, text: &str) -> Result<Vec<ExpenseRecord>, TrackerError> {
        let needle = text.to_lowercase();
        let inner = self.inner.read().expect("store lock poisoned");
        let rows = inner
            .rows
            .iter()
            .filter(|r| r.item.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        Ok(Self::sorted(rows))
    }
}

// ============================================================================
// TESTS
// ============================================================================
