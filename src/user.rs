// User service: profile reads and partial updates over the user table.
// The preferences sub-object is stored flattened into top-level columns.
// Authentication itself is owned by the hosted platform's UI components.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::client::{QueryParams, TableClient};
use crate::error::{ServiceError, ServiceResult};
use crate::mapping::{decode, encode, fetch_one, first_successful};
use crate::notify::{Notifier, NullNotifier};

const TABLE: &str = "user_c";
const ENTITY: &str = "user";

const FIELDS: [&str; 16] = [
    "Id",
    "Name",
    "avatar_c",
    "bed_type_c",
    "email_c",
    "first_name_c",
    "floor_preference_c",
    "last_name_c",
    "loyalty_status_c",
    "member_since_c",
    "name_c",
    "newsletter_c",
    "phone_c",
    "room_type_c",
    "smoking_preference_c",
    "total_bookings_c",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Preferences {
    pub room_type: Option<String>,
    pub bed_type: Option<String>,
    pub smoking_preference: Option<String>,
    pub floor_preference: Option<String>,
    pub newsletter: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<String>,
    pub loyalty_status: Option<String>,
    pub member_since: Option<NaiveDate>,
    pub total_bookings: u32,
    pub preferences: Preferences,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    #[serde(rename = "Id")]
    id: i64,
    #[serde(rename = "name_c", default)]
    name: Option<String>,
    #[serde(rename = "Name", default)]
    display_name: Option<String>,
    #[serde(rename = "first_name_c", default)]
    first_name: Option<String>,
    #[serde(rename = "last_name_c", default)]
    last_name: Option<String>,
    #[serde(rename = "email_c", default)]
    email: Option<String>,
    #[serde(rename = "phone_c", default)]
    phone: Option<String>,
    #[serde(rename = "avatar_c", default)]
    avatar: Option<String>,
    #[serde(rename = "loyalty_status_c", default)]
    loyalty_status: Option<String>,
    #[serde(rename = "member_since_c", default)]
    member_since: Option<NaiveDate>,
    #[serde(rename = "total_bookings_c", default)]
    total_bookings: u32,
    #[serde(rename = "room_type_c", default)]
    room_type: Option<String>,
    #[serde(rename = "bed_type_c", default)]
    bed_type: Option<String>,
    #[serde(rename = "smoking_preference_c", default)]
    smoking_preference: Option<String>,
    #[serde(rename = "floor_preference_c", default)]
    floor_preference: Option<String>,
    #[serde(rename = "newsletter_c", default)]
    newsletter: bool,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            name: record.name.or(record.display_name).unwrap_or_default(),
            first_name: record.first_name,
            last_name: record.last_name,
            email: record.email,
            phone: record.phone,
            avatar: record.avatar,
            loyalty_status: record.loyalty_status,
            member_since: record.member_since,
            total_bookings: record.total_bookings,
            preferences: Preferences {
                room_type: record.room_type,
                bed_type: record.bed_type,
                smoking_preference: record.smoking_preference,
                floor_preference: record.floor_preference,
                newsletter: record.newsletter,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PreferencesPatch {
    #[serde(rename = "room_type_c", skip_serializing_if = "Option::is_none")]
    pub room_type: Option<String>,
    #[serde(rename = "bed_type_c", skip_serializing_if = "Option::is_none")]
    pub bed_type: Option<String>,
    #[serde(rename = "smoking_preference_c", skip_serializing_if = "Option::is_none")]
    pub smoking_preference: Option<String>,
    #[serde(rename = "floor_preference_c", skip_serializing_if = "Option::is_none")]
    pub floor_preference: Option<String>,
    #[serde(rename = "newsletter_c", skip_serializing_if = "Option::is_none")]
    pub newsletter: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserPatch {
    #[serde(rename = "first_name_c", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(rename = "last_name_c", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(rename = "name_c", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "email_c", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "phone_c", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "avatar_c", skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(rename = "loyalty_status_c", skip_serializing_if = "Option::is_none")]
    pub loyalty_status: Option<String>,
    #[serde(rename = "member_since_c", skip_serializing_if = "Option::is_none")]
    pub member_since: Option<NaiveDate>,
    #[serde(rename = "total_bookings_c", skip_serializing_if = "Option::is_none")]
    pub total_bookings: Option<u32>,
    #[serde(flatten)]
    pub preferences: PreferencesPatch,
}

pub struct UserService {
    client: Arc<dyn TableClient>,
    notifier: Arc<dyn Notifier>,
}

impl UserService {
    pub fn new(client: Arc<dyn TableClient>) -> Self {
        Self::with_notifier(client, Arc::new(NullNotifier))
    }

    pub fn with_notifier(client: Arc<dyn TableClient>, notifier: Arc<dyn Notifier>) -> Self {
        Self { client, notifier }
    }

    pub async fn get_by_id(&self, id: i64) -> ServiceResult<User> {
        fetch_one::<UserRecord>(
            self.client.as_ref(),
            TABLE,
            id,
            QueryParams::select(&FIELDS),
            ENTITY,
            self.notifier.as_ref(),
        )
        .await
        .map(User::from)
    }

    // Stand-in for an authenticated-user lookup: the first profile row.
    pub async fn get_current(&self) -> ServiceResult<User> {
        let params = QueryParams::select(&FIELDS).page(1, 0);
        let response = match self.client.fetch_records(TABLE, params).await {
            Ok(response) => response,
            Err(err) => {
                tracing::error!(error = %err, "current user fetch failed");
                self.notifier.error(&err.to_string());
                return Err(err);
            }
        };

        if !response.success {
            let message = response
                .message
                .unwrap_or_else(|| "Failed to load user".to_string());
            tracing::error!(%message, "current user fetch rejected");
            self.notifier.error(&message);
            return Err(ServiceError::Remote(message));
        }

        let record = response
            .data
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or(ServiceError::NotFound(ENTITY))?;
        decode::<UserRecord>(record).map(User::from)
    }

    pub async fn update_profile(&self, id: i64, patch: UserPatch) -> ServiceResult<User> {
        let mut record = encode(&patch)?;
        record.insert("Id".to_string(), id.into());

        let response = self.client.update_records(TABLE, vec![record]).await?;
        first_successful(response, "update", ENTITY, self.notifier.as_ref())?;
        self.get_by_id(id).await
    }

    pub async fn update_preferences(
        &self,
        id: i64,
        preferences: PreferencesPatch,
    ) -> ServiceResult<User> {
        self.update_profile(
            id,
            UserPatch {
                preferences,
                ..UserPatch::default()
            },
        )
        .await
    }

    pub async fn upload_avatar(&self, id: i64, avatar_url: &str) -> ServiceResult<User> {
        self.update_profile(
            id,
            UserPatch {
                avatar: Some(avatar_url.to_string()),
                ..UserPatch::default()
            },
        )
        .await
    }

    pub async fn authenticate(&self, _email: &str, _password: &str) -> ServiceResult<User> {
        Err(ServiceError::Unsupported("authentication"))
    }

    pub async fn register(&self, _patch: UserPatch) -> ServiceResult<User> {
        Err(ServiceError::Unsupported("registration"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_client::MemoryTableClient;
    use serde_json::json;

    fn seed_user(client: &MemoryTableClient, name: &str, email: &str) -> i64 {
        client.seed(
            "user_c",
            json!({
                "name_c": name,
                "email_c": email,
                "phone_c": "+351 900 000 000",
                "loyalty_status_c": "gold",
                "member_since_c": "2021-03-15",
                "total_bookings_c": 12,
                "room_type_c": "Deluxe Room",
                "bed_type_c": "king",
                "smoking_preference_c": "non-smoking",
                "floor_preference_c": "high",
                "newsletter_c": true
            })
            .as_object()
            .cloned()
            .unwrap(),
        )
    }

    fn service() -> (Arc<MemoryTableClient>, UserService) {
        let client = Arc::new(MemoryTableClient::new());
        let service = UserService::new(client.clone());
        (client, service)
    }

    #[tokio::test]
    async fn flat_columns_nest_into_preferences() {
        let (client, service) = service();
        let id = seed_user(&client, "Ana Martins", "ana@example.com");

        let user = service.get_by_id(id).await.unwrap();
        assert_eq!(user.name, "Ana Martins");
        assert_eq!(user.preferences.bed_type.as_deref(), Some("king"));
        assert_eq!(user.preferences.floor_preference.as_deref(), Some("high"));
        assert!(user.preferences.newsletter);
        assert_eq!(
            user.member_since,
            Some(NaiveDate::from_ymd_opt(2021, 3, 15).unwrap())
        );
    }

    #[tokio::test]
    async fn update_preferences_leaves_profile_fields_alone() {
        let (client, service) = service();
        let id = seed_user(&client, "Ana Martins", "ana@example.com");

        let updated = service
            .update_preferences(
                id,
                PreferencesPatch {
                    bed_type: Some("twin".to_string()),
                    newsletter: Some(false),
                    ..PreferencesPatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.preferences.bed_type.as_deref(), Some("twin"));
        assert!(!updated.preferences.newsletter);
        // Untouched preference and profile fields survive.
        assert_eq!(updated.preferences.room_type.as_deref(), Some("Deluxe Room"));
        assert_eq!(updated.email.as_deref(), Some("ana@example.com"));
        assert_eq!(updated.total_bookings, 12);
    }

    #[tokio::test]
    async fn profile_update_omission_is_not_nullification() {
        let (client, service) = service();
        let id = seed_user(&client, "Ana Martins", "ana@example.com");

        let updated = service
            .update_profile(
                id,
                UserPatch {
                    phone: Some("+351 911 111 111".to_string()),
                    ..UserPatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.phone.as_deref(), Some("+351 911 111 111"));
        assert_eq!(updated.name, "Ana Martins");
        assert_eq!(updated.loyalty_status.as_deref(), Some("gold"));
    }

    #[tokio::test]
    async fn upload_avatar_sets_only_the_avatar() {
        let (client, service) = service();
        let id = seed_user(&client, "Ana Martins", "ana@example.com");

        let updated = service
            .upload_avatar(id, "https://cdn.example.com/avatars/ana.png")
            .await
            .unwrap();
        assert_eq!(
            updated.avatar.as_deref(),
            Some("https://cdn.example.com/avatars/ana.png")
        );
        assert_eq!(updated.email.as_deref(), Some("ana@example.com"));
    }

    #[tokio::test]
    async fn current_user_is_the_first_profile_row() {
        let (client, service) = service();
        let first = seed_user(&client, "Ana Martins", "ana@example.com");
        seed_user(&client, "Bruno Costa", "bruno@example.com");

        let current = service.get_current().await.unwrap();
        assert_eq!(current.id, first);
    }

    #[tokio::test]
    async fn current_user_on_empty_table_is_not_found() {
        let (_, service) = service();
        assert!(service.get_current().await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn auth_operations_are_unsupported() {
        let (_, service) = service();
        assert!(matches!(
            service.authenticate("ana@example.com", "secret").await,
            Err(ServiceError::Unsupported(_))
        ));
        assert!(matches!(
            service.register(UserPatch::default()).await,
            Err(ServiceError::Unsupported(_))
        ));
    }
}
