// Review service: CRUD over the review table plus the rating aggregation
// the hotel detail page is enriched with.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{Condition, Operator, QueryParams, SortDirection, TableClient};
use crate::error::{ServiceError, ServiceResult};
use crate::mapping::{
    self, all_deleted, decode, encode, fetch_all, fetch_one, first_successful, RecordRef,
};
use crate::notify::{Notifier, NullNotifier};

const TABLE: &str = "review_c";
const ENTITY: &str = "review";

const FIELDS: [&str; 15] = [
    "Id",
    "Name",
    "comment_c",
    "created_at_c",
    "helpful_c",
    "hotel_id_c",
    "photos_c",
    "rating_c",
    "stay_date_c",
    "title_c",
    "updated_at_c",
    "user_avatar_c",
    "user_id_c",
    "user_name_c",
    "verified_c",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Review {
    pub id: i64,
    pub hotel_id: i64,
    pub user_id: i64,
    pub user_name: Option<String>,
    pub user_avatar: Option<String>,
    pub rating: u8,
    pub title: String,
    pub comment: String,
    pub photos: Vec<Value>,
    pub stay_date: Option<NaiveDate>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub helpful: u32,
    pub verified: bool,
}

#[derive(Debug, Deserialize)]
struct ReviewRecord {
    #[serde(rename = "Id")]
    id: i64,
    #[serde(rename = "hotel_id_c")]
    hotel_id: RecordRef,
    #[serde(rename = "user_id_c")]
    user_id: RecordRef,
    #[serde(rename = "user_name_c", default)]
    user_name: Option<String>,
    #[serde(rename = "user_avatar_c", default)]
    user_avatar: Option<String>,
    #[serde(rename = "rating_c")]
    rating: u8,
    #[serde(rename = "title_c")]
    title: String,
    #[serde(rename = "comment_c", default)]
    comment: Option<String>,
    #[serde(rename = "photos_c", default)]
    photos: Option<Value>,
    #[serde(rename = "stay_date_c", default)]
    stay_date: Option<NaiveDate>,
    #[serde(rename = "created_at_c", default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updated_at_c", default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "helpful_c", default)]
    helpful: u32,
    #[serde(rename = "verified_c", default)]
    verified: bool,
}

impl From<ReviewRecord> for Review {
    fn from(record: ReviewRecord) -> Self {
        Self {
            id: record.id,
            hotel_id: record.hotel_id.id(),
            user_id: record.user_id.id(),
            user_name: record.user_name,
            user_avatar: record.user_avatar,
            rating: record.rating,
            title: record.title,
            comment: record.comment.unwrap_or_default(),
            photos: mapping::lenient_array(record.photos.as_ref()),
            stay_date: record.stay_date,
            created_at: record.created_at,
            updated_at: record.updated_at,
            helpful: record.helpful,
            verified: record.verified,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub hotel_id: i64,
    pub user_id: i64,
    pub rating: u8,
    pub title: String,
    pub comment: Option<String>,
    pub stay_date: Option<NaiveDate>,
    pub user_name: Option<String>,
    pub user_avatar: Option<String>,
    pub photos: Vec<Value>,
}

#[derive(Serialize)]
struct CreateReviewRecord<'a> {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "comment_c")]
    comment: &'a str,
    #[serde(rename = "created_at_c")]
    created_at: DateTime<Utc>,
    #[serde(rename = "helpful_c")]
    helpful: u32,
    #[serde(rename = "hotel_id_c")]
    hotel_id: i64,
    #[serde(rename = "photos_c", serialize_with = "mapping::as_json_text")]
    photos: Option<&'a Vec<Value>>,
    #[serde(rename = "rating_c")]
    rating: u8,
    #[serde(rename = "stay_date_c")]
    stay_date: NaiveDate,
    #[serde(rename = "title_c")]
    title: &'a str,
    #[serde(rename = "updated_at_c")]
    updated_at: DateTime<Utc>,
    #[serde(rename = "user_avatar_c")]
    user_avatar: Option<&'a str>,
    #[serde(rename = "user_id_c")]
    user_id: i64,
    #[serde(rename = "user_name_c")]
    user_name: &'a str,
    #[serde(rename = "verified_c")]
    verified: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReviewPatch {
    #[serde(rename = "comment_c", skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(rename = "helpful_c", skip_serializing_if = "Option::is_none")]
    pub helpful: Option<u32>,
    #[serde(
        rename = "photos_c",
        serialize_with = "mapping::as_json_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub photos: Option<Vec<Value>>,
    #[serde(rename = "rating_c", skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(rename = "stay_date_c", skip_serializing_if = "Option::is_none")]
    pub stay_date: Option<NaiveDate>,
    #[serde(rename = "title_c", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(rename = "user_avatar_c", skip_serializing_if = "Option::is_none")]
    pub user_avatar: Option<String>,
    #[serde(rename = "user_name_c", skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(rename = "verified_c", skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewSort {
    Newest,
    Oldest,
    RatingHigh,
    RatingLow,
}

impl ReviewSort {
    fn order(self) -> (&'static str, SortDirection) {
        match self {
            ReviewSort::Newest => ("created_at_c", SortDirection::Descending),
            ReviewSort::Oldest => ("created_at_c", SortDirection::Ascending),
            ReviewSort::RatingHigh => ("rating_c", SortDirection::Descending),
            ReviewSort::RatingLow => ("rating_c", SortDirection::Ascending),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReviewFilters {
    pub hotel_id: Option<i64>,
    pub user_id: Option<i64>,
    pub min_rating: Option<u8>,
    pub search: Option<String>,
    pub sort: Option<ReviewSort>,
}

// Histogram over the five rating values; every bucket is always present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingDistribution {
    #[serde(rename = "1")]
    pub one: u32,
    #[serde(rename = "2")]
    pub two: u32,
    #[serde(rename = "3")]
    pub three: u32,
    #[serde(rename = "4")]
    pub four: u32,
    #[serde(rename = "5")]
    pub five: u32,
}

impl RatingDistribution {
    fn add(&mut self, rating: u8) {
        match rating {
            1 => self.one += 1,
            2 => self.two += 1,
            3 => self.three += 1,
            4 => self.four += 1,
            5 => self.five += 1,
            _ => {}
        }
    }

    pub fn count(&self, rating: u8) -> u32 {
        match rating {
            1 => self.one,
            2 => self.two,
            3 => self.three,
            4 => self.four,
            5 => self.five,
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct HotelStats {
    pub average_rating: f64,
    pub total_reviews: usize,
    pub rating_distribution: RatingDistribution,
}

// Aggregated ratings for a hotel. The hotel service depends on this trait
// rather than on the review service directly, so the enrichment step can be
// substituted (or omitted) independently.
#[async_trait]
pub trait RatingStatsProvider: Send + Sync {
    async fn hotel_stats(&self, hotel_id: i64) -> ServiceResult<HotelStats>;
}

pub struct ReviewService {
    client: Arc<dyn TableClient>,
    notifier: Arc<dyn Notifier>,
}

impl ReviewService {
    pub fn new(client: Arc<dyn TableClient>) -> Self {
        Self::with_notifier(client, Arc::new(NullNotifier))
    }

    pub fn with_notifier(client: Arc<dyn TableClient>, notifier: Arc<dyn Notifier>) -> Self {
        Self { client, notifier }
    }

    pub async fn get_all(&self, filters: &ReviewFilters) -> Vec<Review> {
        let mut params = QueryParams::select(&FIELDS);
        if let Some(hotel_id) = filters.hotel_id {
            params = params.filter(Condition::equal_to("hotel_id_c", hotel_id));
        }
        if let Some(user_id) = filters.user_id {
            params = params.filter(Condition::equal_to("user_id_c", user_id));
        }
        if let Some(min_rating) = filters.min_rating {
            params = params.filter(Condition::new(
                "rating_c",
                Operator::GreaterThanOrEqualTo,
                vec![min_rating.into()],
            ));
        }
        if let Some(search) = filters.search.as_deref() {
            params = params.filter(Condition::new(
                "title_c",
                Operator::Contains,
                vec![search.into()],
            ));
        }
        let (field, direction) = filters.sort.unwrap_or(ReviewSort::Newest).order();
        params = params.sort(field, direction);

        fetch_all::<ReviewRecord>(
            self.client.as_ref(),
            TABLE,
            params,
            ENTITY,
            self.notifier.as_ref(),
        )
        .await
        .into_iter()
        .map(Review::from)
        .collect()
    }

    pub async fn get_by_id(&self, id: i64) -> ServiceResult<Review> {
        fetch_one::<ReviewRecord>(
            self.client.as_ref(),
            TABLE,
            id,
            QueryParams::select(&FIELDS),
            ENTITY,
            self.notifier.as_ref(),
        )
        .await
        .map(Review::from)
    }

    pub async fn get_by_hotel(&self, hotel_id: i64) -> Vec<Review> {
        self.get_all(&ReviewFilters {
            hotel_id: Some(hotel_id),
            ..ReviewFilters::default()
        })
        .await
    }

    pub async fn get_by_user(&self, user_id: i64) -> Vec<Review> {
        self.get_all(&ReviewFilters {
            user_id: Some(user_id),
            ..ReviewFilters::default()
        })
        .await
    }

    pub async fn create(&self, review: NewReview) -> ServiceResult<Review> {
        if review.title.trim().is_empty() {
            return Err(ServiceError::MissingField("title"));
        }
        if !(1..=5).contains(&review.rating) {
            return Err(ServiceError::InvalidField("rating"));
        }
        if review.hotel_id <= 0 {
            return Err(ServiceError::InvalidField("hotel_id"));
        }
        if review.user_id <= 0 {
            return Err(ServiceError::InvalidField("user_id"));
        }

        let now = Utc::now();
        let record = encode(&CreateReviewRecord {
            name: format!("Review - {}", review.title),
            comment: review.comment.as_deref().unwrap_or(""),
            created_at: now,
            helpful: 0,
            hotel_id: review.hotel_id,
            photos: Some(&review.photos),
            rating: review.rating,
            stay_date: review.stay_date.unwrap_or_else(|| now.date_naive()),
            title: &review.title,
            updated_at: now,
            user_avatar: review.user_avatar.as_deref(),
            user_id: review.user_id,
            user_name: review.user_name.as_deref().unwrap_or("Anonymous"),
            verified: true,
        })?;

        let response = self.client.create_records(TABLE, vec![record]).await?;
        let created = first_successful(response, "create", ENTITY, self.notifier.as_ref())?;
        decode::<ReviewRecord>(created).map(Review::from)
    }

    pub async fn update(&self, id: i64, patch: ReviewPatch) -> ServiceResult<Review> {
        if let Some(rating) = patch.rating {
            if !(1..=5).contains(&rating) {
                return Err(ServiceError::InvalidField("rating"));
            }
        }

        let mut record = encode(&patch)?;
        record.insert("Id".to_string(), id.into());
        // The updated-at stamp refreshes on every write.
        record.insert(
            "updated_at_c".to_string(),
            serde_json::to_value(Utc::now()).map_err(|err| ServiceError::Config(err.to_string()))?,
        );

        let response = self.client.update_records(TABLE, vec![record]).await?;
        first_successful(response, "update", ENTITY, self.notifier.as_ref())?;
        // Read back through the authoritative path rather than trusting the
        // write response.
        self.get_by_id(id).await
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        let response = self.client.delete_records(TABLE, vec![id]).await?;
        all_deleted(response, ENTITY, self.notifier.as_ref())
    }

    // Average (one decimal), total, and a zero-filled five-bucket histogram.
    // Zero reviews yields all-zero stats rather than a division by zero.
    pub async fn get_hotel_stats(&self, hotel_id: i64) -> HotelStats {
        let reviews = self.get_by_hotel(hotel_id).await;
        if reviews.is_empty() {
            return HotelStats::default();
        }

        let mut distribution = RatingDistribution::default();
        let mut total = 0u32;
        for review in &reviews {
            distribution.add(review.rating);
            total += u32::from(review.rating);
        }
        let average = f64::from(total) / reviews.len() as f64;

        HotelStats {
            average_rating: (average * 10.0).round() / 10.0,
            total_reviews: reviews.len(),
            rating_distribution: distribution,
        }
    }
}

#[async_trait]
impl RatingStatsProvider for ReviewService {
    async fn hotel_stats(&self, hotel_id: i64) -> ServiceResult<HotelStats> {
        Ok(self.get_hotel_stats(hotel_id).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_client::MemoryTableClient;
    use crate::notify::RecordingNotifier;
    use serde_json::json;
    use test_case::test_case;

    fn service() -> (Arc<MemoryTableClient>, ReviewService) {
        let client = Arc::new(MemoryTableClient::new());
        let service = ReviewService::new(client.clone());
        (client, service)
    }

    fn sample(hotel_id: i64, rating: u8, title: &str) -> NewReview {
        NewReview {
            hotel_id,
            user_id: 1,
            rating,
            title: title.to_string(),
            comment: None,
            stay_date: None,
            user_name: None,
            user_avatar: None,
            photos: Vec::new(),
        }
    }

    #[tokio::test]
    async fn create_applies_defaults_and_round_trips() {
        let (_, service) = service();
        let created = service.create(sample(3, 4, "Great stay")).await.unwrap();

        assert_eq!(created.comment, "");
        assert_eq!(created.helpful, 0);
        assert!(created.verified);
        assert_eq!(created.user_name.as_deref(), Some("Anonymous"));
        assert!(created.created_at.is_some());
        assert!(created.stay_date.is_some());

        let fetched = service.get_by_id(created.id).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn create_validates_required_fields() {
        let (_, service) = service();
        assert!(matches!(
            service.create(sample(3, 4, "  ")).await,
            Err(ServiceError::MissingField("title"))
        ));
        assert!(matches!(
            service.create(sample(3, 0, "Too low")).await,
            Err(ServiceError::InvalidField("rating"))
        ));
        assert!(matches!(
            service.create(sample(3, 6, "Too high")).await,
            Err(ServiceError::InvalidField("rating"))
        ));
        assert!(matches!(
            service.create(sample(0, 4, "No hotel")).await,
            Err(ServiceError::InvalidField("hotel_id"))
        ));
    }

    #[tokio::test]
    async fn create_surfaces_per_record_field_errors() {
        let client = Arc::new(MemoryTableClient::new());
        let notifier = RecordingNotifier::new();
        let service = ReviewService::with_notifier(client.clone(), notifier.clone());
        client.reject_field("rating_c", "value out of range");

        let outcome = service.create(sample(3, 4, "Rejected")).await;
        assert!(matches!(
            outcome,
            Err(ServiceError::OperationFailed {
                op: "create",
                entity: "review"
            })
        ));
        assert!(notifier
            .messages()
            .iter()
            .any(|m| m.contains("rating_c") && m.contains("value out of range")));
    }

    #[tokio::test]
    async fn update_sends_only_present_fields_and_reads_back() {
        let (_, service) = service();
        let created = service
            .create(NewReview {
                comment: Some("Initial comment".to_string()),
                ..sample(3, 4, "Editable")
            })
            .await
            .unwrap();

        let updated = service
            .update(
                created.id,
                ReviewPatch {
                    comment: Some("Edited comment".to_string()),
                    ..ReviewPatch::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.comment, "Edited comment");
        assert_eq!(updated.title, created.title);
        assert_eq!(updated.rating, created.rating);
        assert!(updated.updated_at >= created.updated_at);
    }

    #[tokio::test]
    async fn get_by_id_distinguishes_not_found_from_transport_failure() {
        let (client, service) = service();
        let missing = service.get_by_id(404).await.unwrap_err();
        assert!(missing.is_not_found());

        client.fail_next_requests(1);
        let failed = service.get_by_id(404).await.unwrap_err();
        assert!(matches!(failed, ServiceError::Remote(_)));
    }

    #[tokio::test]
    async fn get_all_degrades_to_empty_on_failure() {
        let (client, _) = service();
        let notifier = RecordingNotifier::new();
        let service = ReviewService::with_notifier(client.clone(), notifier.clone());
        service.create(sample(3, 5, "Present")).await.unwrap();

        client.fail_next_requests(1);
        let reviews = service.get_all(&ReviewFilters::default()).await;
        assert!(reviews.is_empty());
        assert!(!notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn stats_on_zero_reviews_are_all_zero() {
        let (_, service) = service();
        let stats = service.get_hotel_stats(42).await;
        assert_eq!(stats.average_rating, 0.0);
        assert_eq!(stats.total_reviews, 0);
        for rating in 1..=5 {
            assert_eq!(stats.rating_distribution.count(rating), 0);
        }
    }

    #[tokio::test]
    async fn stats_average_rounds_to_one_decimal() {
        let (_, service) = service();
        for (rating, title) in [(5, "First"), (5, "Second"), (4, "Third")] {
            service.create(sample(9, rating, title)).await.unwrap();
        }
        // A review for another hotel must not leak into the aggregate.
        service.create(sample(10, 1, "Elsewhere")).await.unwrap();

        let stats = service.get_hotel_stats(9).await;
        assert_eq!(stats.average_rating, 4.7);
        assert_eq!(stats.total_reviews, 3);
        assert_eq!(stats.rating_distribution.five, 2);
        assert_eq!(stats.rating_distribution.four, 1);
        assert_eq!(stats.rating_distribution.three, 0);
        assert_eq!(stats.rating_distribution.two, 0);
        assert_eq!(stats.rating_distribution.one, 0);
    }

    #[tokio::test]
    async fn malformed_photos_degrade_to_empty_list() {
        let (client, service) = service();
        let id = client.seed(
            "review_c",
            json!({
                "hotel_id_c": 3,
                "user_id_c": {"Id": 8},
                "rating_c": 4,
                "title_c": "Broken photos",
                "photos_c": "[not json"
            })
            .as_object()
            .cloned()
            .unwrap(),
        );

        let review = service.get_by_id(id).await.unwrap();
        assert!(review.photos.is_empty());
        assert_eq!(review.user_id, 8);
    }

    #[test_case(ReviewFilters { min_rating: Some(4), ..ReviewFilters::default() }, vec!["Five", "Four"]; "minimum rating")]
    #[test_case(ReviewFilters { search: Some("fiv".to_string()), ..ReviewFilters::default() }, vec!["Five"]; "title search")]
    #[test_case(ReviewFilters { sort: Some(ReviewSort::RatingHigh), ..ReviewFilters::default() }, vec!["Five", "Four", "Two"]; "sorted by rating")]
    #[tokio::test]
    async fn list_filters_apply(filters: ReviewFilters, expected_titles: Vec<&str>) {
        let (_, service) = service();
        for (rating, title) in [(2, "Two"), (5, "Five"), (4, "Four")] {
            service.create(sample(1, rating, title)).await.unwrap();
        }

        let mut titles: Vec<String> = service
            .get_all(&filters)
            .await
            .into_iter()
            .map(|review| review.title)
            .collect();
        if filters.sort.is_none() {
            titles.sort();
        }
        assert_eq!(titles, expected_titles);
    }

    #[tokio::test]
    async fn delete_fails_when_any_id_fails() {
        let (client, _) = service();
        let notifier = RecordingNotifier::new();
        let service = ReviewService::with_notifier(client, notifier.clone());
        let created = service.create(sample(2, 3, "Removable")).await.unwrap();

        service.delete(created.id).await.unwrap();
        let outcome = service.delete(created.id).await;
        assert!(matches!(
            outcome,
            Err(ServiceError::OperationFailed {
                op: "delete",
                entity: "review"
            })
        ));
        assert!(!notifier.messages().is_empty());
    }
}
