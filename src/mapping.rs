// Record-reshaping helpers shared by the four entity services: foreign-key
// normalization, lenient embedded-JSON recovery, and the common handling of
// fetch envelopes and per-record bulk outcomes.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::client::{BulkResponse, QueryParams, Record, TableClient};
use crate::error::{ServiceError, ServiceResult};
use crate::notify::Notifier;

// A foreign key arrives either as a bare id or as a linked record carrying
// an `Id` field (plus display columns we do not care about).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RecordRef {
    Id(i64),
    Linked {
        #[serde(rename = "Id")]
        id: i64,
    },
}

impl RecordRef {
    pub fn id(self) -> i64 {
        match self {
            RecordRef::Id(id) | RecordRef::Linked { id } => id,
        }
    }
}

// Free-form JSON columns are stored as text; malformed content degrades to
// an empty value on read instead of failing the whole record.
pub fn lenient_object(value: Option<&Value>) -> Map<String, Value> {
    match value {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw)
            .ok()
            .and_then(|parsed| parsed.as_object().cloned())
            .unwrap_or_default(),
        _ => Map::new(),
    }
}

pub fn lenient_array(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw)
            .ok()
            .and_then(|parsed| parsed.as_array().cloned())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

// Serializes a patch sub-object into the JSON text the backend stores.
// Only called for fields that survived `skip_serializing_if`.
pub(crate) fn as_json_text<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
where
    T: Serialize,
    S: Serializer,
{
    match value {
        Some(inner) => {
            let text = serde_json::to_string(inner).map_err(serde::ser::Error::custom)?;
            serializer.serialize_str(&text)
        }
        None => serializer.serialize_none(),
    }
}

pub(crate) fn encode<T: Serialize>(payload: &T) -> ServiceResult<Record> {
    match serde_json::to_value(payload) {
        Ok(Value::Object(record)) => Ok(record),
        Ok(_) => Err(ServiceError::Config(
            "payload did not serialize to a record".to_string(),
        )),
        Err(err) => Err(ServiceError::Config(err.to_string())),
    }
}

pub(crate) fn decode<T: DeserializeOwned>(record: Record) -> ServiceResult<T> {
    serde_json::from_value(Value::Object(record))
        .map_err(|err| ServiceError::Remote(format!("Malformed {}", err)))
}

// Read-path list fetch: degrade to an empty list on any failure, after
// logging and notifying. Records that fail to decode are skipped.
pub(crate) async fn fetch_all<T: DeserializeOwned>(
    client: &dyn TableClient,
    table: &str,
    params: QueryParams,
    entity: &'static str,
    notifier: &dyn Notifier,
) -> Vec<T> {
    let response = match client.fetch_records(table, params).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(entity, error = %err, "list fetch failed");
            notifier.error(&err.to_string());
            return Vec::new();
        }
    };

    if !response.success {
        let message = response
            .message
            .unwrap_or_else(|| format!("Failed to load {}s", entity));
        tracing::error!(entity, %message, "list fetch rejected");
        notifier.error(&message);
        return Vec::new();
    }

    response
        .data
        .unwrap_or_default()
        .into_iter()
        .filter_map(|record| match decode::<T>(record) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                tracing::debug!(entity, error = %err, "skipping undecodable record");
                None
            }
        })
        .collect()
}

// By-id fetch: a zero-row result is a not-found error, distinct from the
// transport/remote failure paths.
pub(crate) async fn fetch_one<T: DeserializeOwned>(
    client: &dyn TableClient,
    table: &str,
    id: i64,
    params: QueryParams,
    entity: &'static str,
    notifier: &dyn Notifier,
) -> ServiceResult<T> {
    let response = match client.get_record_by_id(table, id, params).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(entity, id, error = %err, "record fetch failed");
            notifier.error(&err.to_string());
            return Err(err);
        }
    };

    if !response.success {
        let message = response
            .message
            .unwrap_or_else(|| format!("Failed to load {}", entity));
        tracing::error!(entity, id, %message, "record fetch rejected");
        notifier.error(&message);
        return Err(ServiceError::Remote(message));
    }

    match response.data {
        Some(record) => decode(record),
        None => Err(ServiceError::NotFound(entity)),
    }
}

// Bulk write outcome: every per-record failure is reported to the user
// (field-level where available) and any failure fails the whole call, even
// when other records in the batch succeeded.
pub(crate) fn first_successful(
    response: BulkResponse,
    op: &'static str,
    entity: &'static str,
    notifier: &dyn Notifier,
) -> ServiceResult<Record> {
    if !response.success {
        let message = response
            .message
            .unwrap_or_else(|| format!("Failed to {} {}", op, entity));
        tracing::error!(entity, op, %message, "bulk write rejected");
        notifier.error(&message);
        return Err(ServiceError::Remote(message));
    }

    let results = response.results.unwrap_or_default();
    let mut first = None;
    let mut failed = 0usize;

    for result in results {
        if result.success {
            if first.is_none() {
                first = result.data;
            }
            continue;
        }
        failed += 1;
        for error in result.errors.unwrap_or_default() {
            notifier.error(&format!("{}: {}", error.field_label, error.message));
        }
        if let Some(message) = result.message {
            notifier.error(&message);
        }
    }

    if failed > 0 {
        tracing::error!(entity, op, failed, "bulk write had failing records");
        return Err(ServiceError::OperationFailed { op, entity });
    }

    first.ok_or(ServiceError::OperationFailed { op, entity })
}

pub(crate) fn all_deleted(
    response: BulkResponse,
    entity: &'static str,
    notifier: &dyn Notifier,
) -> ServiceResult<()> {
    if !response.success {
        let message = response
            .message
            .unwrap_or_else(|| format!("Failed to delete {}", entity));
        tracing::error!(entity, %message, "delete rejected");
        notifier.error(&message);
        return Err(ServiceError::Remote(message));
    }

    let mut failed = 0usize;
    for result in response.results.unwrap_or_default() {
        if result.success {
            continue;
        }
        failed += 1;
        if let Some(message) = result.message {
            notifier.error(&message);
        }
    }

    if failed > 0 {
        tracing::error!(entity, failed, "delete had failing records");
        return Err(ServiceError::OperationFailed {
            op: "delete",
            entity,
        });
    }

    Ok(())
}
