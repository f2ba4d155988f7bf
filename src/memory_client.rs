// In-memory implementation of the table client. Backs the test suites and
// local development; mirrors the hosted backend's envelope semantics,
// including id assignment, predicate evaluation, and per-record bulk
// outcomes, plus failure injection for exercising error paths.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;

use crate::client::{
    BulkResponse, BulkResult, Condition, FetchResponse, FieldError, GroupOperator, Operator,
    QueryParams, Record, RecordResponse, SortDirection, TableClient,
};
use crate::error::ServiceError;

const UNAVAILABLE: &str = "Service temporarily unavailable";

pub struct MemoryTableClient {
    tables: DashMap<String, BTreeMap<i64, Record>>,
    next_id: AtomicI64,
    fail_next: AtomicUsize,
    reject_field: Mutex<Option<(String, String)>>,
}

impl Default for MemoryTableClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTableClient {
    pub fn new() -> Self {
        Self {
            tables: DashMap::new(),
            next_id: AtomicI64::new(1),
            fail_next: AtomicUsize::new(0),
            reject_field: Mutex::new(None),
        }
    }

    // The next `count` operations report a remote failure.
    pub fn fail_next_requests(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    // The next write batch rejects every record carrying `field`, with a
    // field-level error, the way backend validation reports them.
    pub fn reject_field(&self, field: &str, message: &str) {
        *self.reject_field.lock() = Some((field.to_string(), message.to_string()));
    }

    // Inserts a record directly, assigning an id when absent. Lets tests
    // stage wire shapes the service write path would normalize away
    // (linked-record foreign keys, malformed embedded JSON).
    pub fn seed(&self, table: &str, mut record: Record) -> i64 {
        let id = match record.get("Id").and_then(Value::as_i64) {
            Some(id) => {
                self.next_id.fetch_max(id + 1, Ordering::SeqCst);
                id
            }
            None => self.next_id.fetch_add(1, Ordering::SeqCst),
        };
        record.insert("Id".to_string(), Value::from(id));
        self.tables
            .entry(table.to_string())
            .or_default()
            .insert(id, record);
        id
    }

    fn should_fail(&self) -> bool {
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
                count.checked_sub(1)
            })
            .is_ok()
    }

    fn take_reject(&self) -> Option<(String, String)> {
        self.reject_field.lock().take()
    }

    fn records(&self, table: &str) -> Vec<Record> {
        self.tables
            .get(table)
            .map(|store| store.values().cloned().collect())
            .unwrap_or_default()
    }
}

// Predicate evaluation. Linked-record foreign keys compare by their `Id`.
fn field_value<'a>(record: &'a Record, field: &str) -> Option<&'a Value> {
    let value = record.get(field)?;
    match value {
        Value::Object(map) => map.get("Id").or(Some(value)),
        _ => Some(value),
    }
}

fn value_eq(actual: &Value, expected: &Value) -> bool {
    match (actual.as_f64(), expected.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => actual == expected,
    }
}

fn value_cmp(actual: &Value, expected: &Value) -> Option<CmpOrdering> {
    if let (Some(a), Some(b)) = (actual.as_f64(), expected.as_f64()) {
        return a.partial_cmp(&b);
    }
    match (actual.as_str(), expected.as_str()) {
        (Some(a), Some(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn matches(record: &Record, field: &str, operator: Operator, values: &[Value]) -> bool {
    let actual = match field_value(record, field) {
        Some(value) => value,
        None => return false,
    };
    match operator {
        Operator::EqualTo => values.first().is_some_and(|v| value_eq(actual, v)),
        Operator::ExactMatch => values.iter().any(|v| value_eq(actual, v)),
        Operator::GreaterThanOrEqualTo => values
            .first()
            .and_then(|v| value_cmp(actual, v))
            .is_some_and(|ord| ord != CmpOrdering::Less),
        Operator::LessThanOrEqualTo => values
            .first()
            .and_then(|v| value_cmp(actual, v))
            .is_some_and(|ord| ord != CmpOrdering::Greater),
        Operator::Contains => match (actual.as_str(), values.first().and_then(Value::as_str)) {
            (Some(haystack), Some(needle)) => haystack
                .to_ascii_lowercase()
                .contains(&needle.to_ascii_lowercase()),
            _ => false,
        },
    }
}

fn matches_query(record: &Record, params: &QueryParams) -> bool {
    let plain = params
        .conditions
        .iter()
        .all(|c: &Condition| matches(record, &c.field_name, c.operator, &c.values));
    if !plain {
        return false;
    }

    params.where_groups.iter().all(|group| {
        let sub = |s: &crate::client::SubGroup| match s.operator {
            GroupOperator::Or => s
                .conditions
                .iter()
                .any(|c| matches(record, &c.field_name, c.operator, &c.values)),
            GroupOperator::And => s
                .conditions
                .iter()
                .all(|c| matches(record, &c.field_name, c.operator, &c.values)),
        };
        match group.operator {
            GroupOperator::Or => group.sub_groups.iter().any(sub),
            GroupOperator::And => group.sub_groups.iter().all(sub),
        }
    })
}

fn apply_order(records: &mut [Record], params: &QueryParams) {
    if params.order_by.is_empty() {
        return;
    }
    records.sort_by(|a, b| {
        for spec in &params.order_by {
            let ordering = match (
                field_value(a, &spec.field_name),
                field_value(b, &spec.field_name),
            ) {
                (Some(left), Some(right)) => value_cmp(left, right).unwrap_or(CmpOrdering::Equal),
                (Some(_), None) => CmpOrdering::Greater,
                (None, Some(_)) => CmpOrdering::Less,
                (None, None) => CmpOrdering::Equal,
            };
            let ordering = match spec.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            };
            if ordering != CmpOrdering::Equal {
                return ordering;
            }
        }
        CmpOrdering::Equal
    });
}

fn project(record: Record, params: &QueryParams) -> Record {
    if params.fields.is_empty() {
        return record;
    }
    let keep: Vec<&str> = params
        .fields
        .iter()
        .map(|f| f.field.name.as_str())
        .collect();
    record
        .into_iter()
        .filter(|(key, _)| keep.contains(&key.as_str()))
        .collect()
}

#[async_trait]
impl TableClient for MemoryTableClient {
    async fn fetch_records(
        &self,
        table: &str,
        params: QueryParams,
    ) -> Result<FetchResponse, ServiceError> {
        if self.should_fail() {
            return Ok(FetchResponse {
                success: false,
                message: Some(UNAVAILABLE.to_string()),
                data: None,
            });
        }

        let mut records: Vec<Record> = self
            .records(table)
            .into_iter()
            .filter(|record| matches_query(record, &params))
            .collect();
        apply_order(&mut records, &params);

        if let Some(paging) = params.paging {
            records = records
                .into_iter()
                .skip(paging.offset)
                .take(paging.limit)
                .collect();
        }

        let data = records
            .into_iter()
            .map(|record| project(record, &params))
            .collect();
        Ok(FetchResponse {
            success: true,
            message: None,
            data: Some(data),
        })
    }

    async fn get_record_by_id(
        &self,
        table: &str,
        id: i64,
        params: QueryParams,
    ) -> Result<RecordResponse, ServiceError> {
        if self.should_fail() {
            return Ok(RecordResponse {
                success: false,
                message: Some(UNAVAILABLE.to_string()),
                data: None,
            });
        }

        let data = self
            .tables
            .get(table)
            .and_then(|store| store.get(&id).cloned())
            .map(|record| project(record, &params));
        Ok(RecordResponse {
            success: true,
            message: None,
            data,
        })
    }

    async fn create_records(
        &self,
        table: &str,
        records: Vec<Record>,
    ) -> Result<BulkResponse, ServiceError> {
        if self.should_fail() {
            return Ok(BulkResponse {
                success: false,
                message: Some(UNAVAILABLE.to_string()),
                results: None,
            });
        }

        let reject = self.take_reject();
        let mut results = Vec::with_capacity(records.len());
        for mut record in records {
            if let Some((field, message)) = reject
                .as_ref()
                .filter(|(field, _)| record.contains_key(field))
            {
                results.push(BulkResult {
                    success: false,
                    data: None,
                    message: Some("Validation failed".to_string()),
                    errors: Some(vec![FieldError {
                        field_label: field.clone(),
                        message: message.clone(),
                    }]),
                });
                continue;
            }

            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            record.insert("Id".to_string(), Value::from(id));
            self.tables
                .entry(table.to_string())
                .or_default()
                .insert(id, record.clone());
            results.push(BulkResult {
                success: true,
                data: Some(record),
                message: None,
                errors: None,
            });
        }

        Ok(BulkResponse {
            success: true,
            message: None,
            results: Some(results),
        })
    }

    async fn update_records(
        &self,
        table: &str,
        records: Vec<Record>,
    ) -> Result<BulkResponse, ServiceError> {
        if self.should_fail() {
            return Ok(BulkResponse {
                success: false,
                message: Some(UNAVAILABLE.to_string()),
                results: None,
            });
        }

        let reject = self.take_reject();
        let mut results = Vec::with_capacity(records.len());
        for record in records {
            if let Some((field, message)) = reject
                .as_ref()
                .filter(|(field, _)| record.contains_key(field))
            {
                results.push(BulkResult {
                    success: false,
                    data: None,
                    message: Some("Validation failed".to_string()),
                    errors: Some(vec![FieldError {
                        field_label: field.clone(),
                        message: message.clone(),
                    }]),
                });
                continue;
            }

            let id = record.get("Id").and_then(Value::as_i64);
            let mut store = self.tables.entry(table.to_string()).or_default();
            let stored = match id {
                Some(id) => store.get_mut(&id),
                None => None,
            };
            match stored {
                Some(existing) => {
                    for (key, value) in record {
                        existing.insert(key, value);
                    }
                    results.push(BulkResult {
                        success: true,
                        data: Some(existing.clone()),
                        message: None,
                        errors: None,
                    });
                }
                None => results.push(BulkResult {
                    success: false,
                    data: None,
                    message: Some("Record does not exist".to_string()),
                    errors: None,
                }),
            }
        }

        Ok(BulkResponse {
            success: true,
            message: None,
            results: Some(results),
        })
    }

    async fn delete_records(
        &self,
        table: &str,
        ids: Vec<i64>,
    ) -> Result<BulkResponse, ServiceError> {
        if self.should_fail() {
            return Ok(BulkResponse {
                success: false,
                message: Some(UNAVAILABLE.to_string()),
                results: None,
            });
        }

        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let removed = self
                .tables
                .entry(table.to_string())
                .or_default()
                .remove(&id);
            results.push(match removed {
                Some(_) => BulkResult {
                    success: true,
                    data: None,
                    message: None,
                    errors: None,
                },
                None => BulkResult {
                    success: false,
                    data: None,
                    message: Some("Record does not exist".to_string()),
                    errors: None,
                },
            });
        }

        Ok(BulkResponse {
            success: true,
            message: None,
            results: Some(results),
        })
    }
}
