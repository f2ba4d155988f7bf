// Remote table client abstraction.
// The hosted backend exposes five table-scoped operations; everything the
// entity services do goes through this trait so an in-memory double can be
// substituted for the HTTP transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ServiceError;

// Wire records are loosely-typed field maps; the services give them shape.
pub type Record = serde_json::Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    EqualTo,
    GreaterThanOrEqualTo,
    LessThanOrEqualTo,
    Contains,
    ExactMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "ASC")]
    Ascending,
    #[serde(rename = "DESC")]
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupOperator {
    #[serde(rename = "OR")]
    Or,
    #[serde(rename = "AND")]
    And,
}

// Top-level predicates use PascalCase keys on the wire; predicates nested
// inside OR-groups use camelCase. The backend is strict about both.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "FieldName")]
    pub field_name: String,
    #[serde(rename = "Operator")]
    pub operator: Operator,
    #[serde(rename = "Values")]
    pub values: Vec<Value>,
}

impl Condition {
    pub fn new(field_name: &str, operator: Operator, values: Vec<Value>) -> Self {
        Self {
            field_name: field_name.to_string(),
            operator,
            values,
        }
    }

    pub fn equal_to(field_name: &str, value: impl Into<Value>) -> Self {
        Self::new(field_name, Operator::EqualTo, vec![value.into()])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupCondition {
    #[serde(rename = "fieldName")]
    pub field_name: String,
    pub operator: Operator,
    pub values: Vec<Value>,
}

impl GroupCondition {
    pub fn contains(field_name: &str, value: &str) -> Self {
        Self {
            field_name: field_name.to_string(),
            operator: Operator::Contains,
            values: vec![Value::from(value)],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubGroup {
    pub conditions: Vec<GroupCondition>,
    pub operator: GroupOperator,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditionGroup {
    pub operator: GroupOperator,
    #[serde(rename = "subGroups")]
    pub sub_groups: Vec<SubGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub field: FieldName,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldName {
    #[serde(rename = "Name")]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortSpec {
    #[serde(rename = "fieldName")]
    pub field_name: String,
    #[serde(rename = "sorttype")]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PagingInfo {
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryParams {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub fields: Vec<FieldSpec>,
    #[serde(rename = "where", skip_serializing_if = "Vec::is_empty", default)]
    pub conditions: Vec<Condition>,
    #[serde(rename = "whereGroups", skip_serializing_if = "Vec::is_empty", default)]
    pub where_groups: Vec<ConditionGroup>,
    #[serde(rename = "orderBy", skip_serializing_if = "Vec::is_empty", default)]
    pub order_by: Vec<SortSpec>,
    #[serde(rename = "pagingInfo", skip_serializing_if = "Option::is_none", default)]
    pub paging: Option<PagingInfo>,
}

impl QueryParams {
    pub fn select(field_names: &[&str]) -> Self {
        Self {
            fields: field_names
                .iter()
                .map(|name| FieldSpec {
                    field: FieldName {
                        name: name.to_string(),
                    },
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    // OR-group over the given predicates: a record matches if any holds.
    pub fn any_of(mut self, conditions: Vec<GroupCondition>) -> Self {
        self.where_groups.push(ConditionGroup {
            operator: GroupOperator::Or,
            sub_groups: vec![SubGroup {
                conditions,
                operator: GroupOperator::Or,
            }],
        });
        self
    }

    pub fn sort(mut self, field_name: &str, direction: SortDirection) -> Self {
        self.order_by.push(SortSpec {
            field_name: field_name.to_string(),
            direction,
        });
        self
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.paging = Some(PagingInfo { limit, offset });
        self
    }
}

// Response envelopes. Reads carry `data`; writes always wrap records in a
// batch, with per-record outcomes in `results` even for a single record.

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Vec<Record>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Record>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub results: Option<Vec<BulkResult>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub data: Option<Record>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub errors: Option<Vec<FieldError>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(rename = "fieldLabel")]
    pub field_label: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub project_id: String,
    pub public_key: String,
    pub timeout_ms: u64,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self, ServiceError> {
        let var = |name: &str| {
            std::env::var(name)
                .map_err(|_| ServiceError::Config(format!("{} is not set", name)))
        };
        Ok(Self {
            base_url: var("STAYHUB_BASE_URL")?,
            project_id: var("STAYHUB_PROJECT_ID")?,
            public_key: var("STAYHUB_PUBLIC_KEY")?,
            timeout_ms: std::env::var("STAYHUB_TIMEOUT_MS")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(10_000),
        })
    }
}

// A trait-level Err is a transport failure; `success: false` in an envelope
// is a remote-reported one. The services treat the two differently on read
// paths, so implementations must not collapse one into the other.
#[async_trait]
pub trait TableClient: Send + Sync + 'static {
    async fn fetch_records(
        &self,
        table: &str,
        params: QueryParams,
    ) -> Result<FetchResponse, ServiceError>;

    async fn get_record_by_id(
        &self,
        table: &str,
        id: i64,
        params: QueryParams,
    ) -> Result<RecordResponse, ServiceError>;

    async fn create_records(
        &self,
        table: &str,
        records: Vec<Record>,
    ) -> Result<BulkResponse, ServiceError>;

    async fn update_records(
        &self,
        table: &str,
        records: Vec<Record>,
    ) -> Result<BulkResponse, ServiceError>;

    async fn delete_records(
        &self,
        table: &str,
        ids: Vec<i64>,
    ) -> Result<BulkResponse, ServiceError>;
}
