// Hotel service: filtered search over the hotel table, detail lookup
// enriched with review aggregates, and a simulated availability check.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::client::{Condition, GroupCondition, Operator, QueryParams, SortDirection, TableClient};
use crate::error::ServiceResult;
use crate::mapping::{fetch_all, fetch_one};
use crate::notify::{Notifier, NullNotifier};
use crate::review::{RatingDistribution, RatingStatsProvider};

const TABLE: &str = "hotel_c";
const ENTITY: &str = "hotel";

const FIELDS: [&str; 15] = [
    "Id",
    "Name",
    "address_c",
    "available_c",
    "city_c",
    "coordinates_c",
    "country_c",
    "description_c",
    "featured_c",
    "name_c",
    "price_per_night_c",
    "rating_c",
    "review_count_c",
    "star_rating_c",
    "state_c",
];

// Catalog media is not modeled in the hotel table yet; stable placeholders
// keep the consumer-facing shape intact.
const PLACEHOLDER_IMAGES: [&str; 2] = [
    "https://images.unsplash.com/photo-1566073771259-6a8506099945?w=800&h=600&fit=crop",
    "https://images.unsplash.com/photo-1564013799919-ab600027ffc6?w=800&h=600&fit=crop",
];
const PLACEHOLDER_AMENITIES: [&str; 5] = ["Free WiFi", "Pool", "Spa", "Gym", "Restaurant"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Location {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub coordinates: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hotel {
    pub id: i64,
    pub name: String,
    pub address: Option<String>,
    pub description: Option<String>,
    pub available: bool,
    pub featured: bool,
    pub location: Location,
    pub price_per_night: f64,
    pub rating: f64,
    pub review_count: u32,
    pub star_rating: u8,
    pub images: Vec<String>,
    pub amenities: Vec<String>,
    // Present only after rating enrichment on the detail path.
    pub review_stats: Option<RatingDistribution>,
}

#[derive(Debug, Deserialize)]
struct HotelRecord {
    #[serde(rename = "Id")]
    id: i64,
    #[serde(rename = "name_c", default)]
    name: Option<String>,
    #[serde(rename = "Name", default)]
    display_name: Option<String>,
    #[serde(rename = "address_c", default)]
    address: Option<String>,
    #[serde(rename = "description_c", default)]
    description: Option<String>,
    #[serde(rename = "available_c", default)]
    available: bool,
    #[serde(rename = "featured_c", default)]
    featured: bool,
    #[serde(rename = "city_c", default)]
    city: Option<String>,
    #[serde(rename = "state_c", default)]
    state: Option<String>,
    #[serde(rename = "country_c", default)]
    country: Option<String>,
    #[serde(rename = "coordinates_c", default)]
    coordinates: Option<String>,
    #[serde(rename = "price_per_night_c", default)]
    price_per_night: f64,
    #[serde(rename = "rating_c", default)]
    rating: f64,
    #[serde(rename = "review_count_c", default)]
    review_count: u32,
    #[serde(rename = "star_rating_c", default)]
    star_rating: u8,
}

impl From<HotelRecord> for Hotel {
    fn from(record: HotelRecord) -> Self {
        Self {
            id: record.id,
            // The dedicated name column wins over the generic display column.
            name: record
                .name
                .or(record.display_name)
                .unwrap_or_default(),
            address: record.address,
            description: record.description,
            available: record.available,
            featured: record.featured,
            location: Location {
                city: record.city,
                state: record.state,
                country: record.country,
                coordinates: record.coordinates,
            },
            price_per_night: record.price_per_night,
            rating: record.rating,
            review_count: record.review_count,
            star_rating: record.star_rating,
            images: PLACEHOLDER_IMAGES.iter().map(|s| s.to_string()).collect(),
            amenities: PLACEHOLDER_AMENITIES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            review_stats: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotelSort {
    PriceLowToHigh,
    PriceHighToLow,
    Rating,
    Name,
}

impl HotelSort {
    fn order(self) -> (&'static str, SortDirection) {
        match self {
            HotelSort::PriceLowToHigh => ("price_per_night_c", SortDirection::Ascending),
            HotelSort::PriceHighToLow => ("price_per_night_c", SortDirection::Descending),
            HotelSort::Rating => ("rating_c", SortDirection::Descending),
            HotelSort::Name => ("name_c", SortDirection::Ascending),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct HotelFilters {
    pub destination: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub star_ratings: Vec<u8>,
    pub min_rating: Option<f64>,
    pub sort: Option<HotelSort>,
}

// Outcome of the simulated availability check. The availability gate and
// the two room offers are placeholder logic standing in for a real
// inventory system; nothing here places a hold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Availability {
    pub available: bool,
    pub hotel_id: i64,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub rooms: Vec<RoomOffer>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomOffer {
    pub id: String,
    pub room_type: String,
    pub capacity: u32,
    pub price_per_night: f64,
    pub amenities: Vec<String>,
    pub available: bool,
}

pub struct HotelService {
    client: Arc<dyn TableClient>,
    notifier: Arc<dyn Notifier>,
    stats: Option<Arc<dyn RatingStatsProvider>>,
}

impl HotelService {
    pub fn new(client: Arc<dyn TableClient>) -> Self {
        Self {
            client,
            notifier: Arc::new(NullNotifier),
            stats: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    // Wires up the detail-path rating enrichment; without a provider the
    // base record is returned as stored.
    pub fn with_stats_provider(mut self, provider: Arc<dyn RatingStatsProvider>) -> Self {
        self.stats = Some(provider);
        self
    }

    pub async fn get_all(&self, filters: &HotelFilters) -> Vec<Hotel> {
        let mut params = QueryParams::select(&FIELDS);

        if let Some(destination) = filters.destination.as_deref() {
            params = params.any_of(vec![
                GroupCondition::contains("city_c", destination),
                GroupCondition::contains("state_c", destination),
                GroupCondition::contains("name_c", destination),
            ]);
        }
        if let Some(min_price) = filters.min_price {
            params = params.filter(Condition::new(
                "price_per_night_c",
                Operator::GreaterThanOrEqualTo,
                vec![min_price.into()],
            ));
        }
        if let Some(max_price) = filters.max_price {
            params = params.filter(Condition::new(
                "price_per_night_c",
                Operator::LessThanOrEqualTo,
                vec![max_price.into()],
            ));
        }
        if !filters.star_ratings.is_empty() {
            params = params.filter(Condition::new(
                "star_rating_c",
                Operator::ExactMatch,
                filters.star_ratings.iter().map(|s| (*s).into()).collect(),
            ));
        }
        if let Some(min_rating) = filters.min_rating {
            params = params.filter(Condition::new(
                "rating_c",
                Operator::GreaterThanOrEqualTo,
                vec![min_rating.into()],
            ));
        }
        if let Some(sort) = filters.sort {
            let (field, direction) = sort.order();
            params = params.sort(field, direction);
        }

        fetch_all::<HotelRecord>(
            self.client.as_ref(),
            TABLE,
            params,
            ENTITY,
            self.notifier.as_ref(),
        )
        .await
        .into_iter()
        .map(Hotel::from)
        .collect()
    }

    pub async fn get_by_id(&self, id: i64) -> ServiceResult<Hotel> {
        let record = fetch_one::<HotelRecord>(
            self.client.as_ref(),
            TABLE,
            id,
            QueryParams::select(&FIELDS),
            ENTITY,
            self.notifier.as_ref(),
        )
        .await?;
        let mut hotel = Hotel::from(record);

        // Enrichment is best-effort: when the aggregation provider fails,
        // the base record is returned unchanged.
        if let Some(provider) = &self.stats {
            match provider.hotel_stats(id).await {
                Ok(stats) => {
                    if stats.total_reviews > 0 {
                        hotel.rating = stats.average_rating;
                        hotel.review_count = stats.total_reviews as u32;
                    }
                    hotel.review_stats = Some(stats.rating_distribution);
                }
                Err(err) => {
                    tracing::debug!(hotel_id = id, error = %err, "skipping rating enrichment");
                }
            }
        }

        Ok(hotel)
    }

    pub async fn get_featured(&self) -> Vec<Hotel> {
        let params = QueryParams::select(&FIELDS)
            .filter(Condition::equal_to("featured_c", true))
            .page(4, 0);

        fetch_all::<HotelRecord>(
            self.client.as_ref(),
            TABLE,
            params,
            ENTITY,
            self.notifier.as_ref(),
        )
        .await
        .into_iter()
        .map(Hotel::from)
        .collect()
    }

    pub async fn search(&self, query: &str) -> Vec<Hotel> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let params = QueryParams::select(&FIELDS).any_of(vec![
            GroupCondition::contains("name_c", query),
            GroupCondition::contains("city_c", query),
            GroupCondition::contains("state_c", query),
            GroupCondition::contains("description_c", query),
        ]);

        fetch_all::<HotelRecord>(
            self.client.as_ref(),
            TABLE,
            params,
            ENTITY,
            self.notifier.as_ref(),
        )
        .await
        .into_iter()
        .map(Hotel::from)
        .collect()
    }

    // Simulated: the hotel's own availability flag gated by a 90% random
    // pass, with two synthesized room offers. Stand-in data, not an
    // inventory hold.
    pub async fn check_availability(
        &self,
        hotel_id: i64,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> ServiceResult<Availability> {
        let hotel = self.get_by_id(hotel_id).await?;
        let available = hotel.available && rand::random::<f64>() > 0.1;

        let rooms = if available {
            vec![
                RoomOffer {
                    id: format!("{}_deluxe", hotel.id),
                    room_type: "Deluxe Room".to_string(),
                    capacity: 2,
                    price_per_night: hotel.price_per_night,
                    amenities: vec![
                        "Free WiFi".to_string(),
                        "Mini Bar".to_string(),
                        "City View".to_string(),
                    ],
                    available: true,
                },
                RoomOffer {
                    id: format!("{}_suite", hotel.id),
                    room_type: "Executive Suite".to_string(),
                    capacity: 4,
                    price_per_night: hotel.price_per_night * 1.5,
                    amenities: vec![
                        "Free WiFi".to_string(),
                        "Mini Bar".to_string(),
                        "Ocean View".to_string(),
                        "Living Area".to_string(),
                    ],
                    available: true,
                },
            ]
        } else {
            Vec::new()
        };

        Ok(Availability {
            available,
            hotel_id: hotel.id,
            check_in,
            check_out,
            rooms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ServiceError, ServiceResult};
    use crate::memory_client::MemoryTableClient;
    use crate::review::{HotelStats, NewReview, ReviewService};
    use async_trait::async_trait;
    use serde_json::json;
    use test_case::test_case;

    fn seed_hotel(
        client: &MemoryTableClient,
        name: &str,
        city: &str,
        price: f64,
        stars: u8,
        rating: f64,
    ) -> i64 {
        client.seed(
            "hotel_c",
            json!({
                "name_c": name,
                "city_c": city,
                "state_c": "Algarve",
                "country_c": "Portugal",
                "available_c": true,
                "featured_c": false,
                "price_per_night_c": price,
                "rating_c": rating,
                "review_count_c": 10,
                "star_rating_c": stars
            })
            .as_object()
            .cloned()
            .unwrap(),
        )
    }

    fn fixture() -> (Arc<MemoryTableClient>, HotelService) {
        let client = Arc::new(MemoryTableClient::new());
        seed_hotel(&client, "Harbor Light", "Lagos", 80.0, 3, 4.1);
        seed_hotel(&client, "Cliffside Palace", "Sagres", 210.0, 5, 4.8);
        seed_hotel(&client, "Old Town Inn", "Faro", 120.0, 4, 3.9);
        let service = HotelService::new(client.clone());
        (client, service)
    }

    #[test_case(HotelFilters { destination: Some("faro".to_string()), ..HotelFilters::default() }, vec!["Old Town Inn"]; "destination matches city")]
    #[test_case(HotelFilters { min_price: Some(100.0), max_price: Some(220.0), ..HotelFilters::default() }, vec!["Cliffside Palace", "Old Town Inn"]; "price range")]
    #[test_case(HotelFilters { star_ratings: vec![3, 5], ..HotelFilters::default() }, vec!["Cliffside Palace", "Harbor Light"]; "star rating membership")]
    #[test_case(HotelFilters { min_rating: Some(4.0), ..HotelFilters::default() }, vec!["Cliffside Palace", "Harbor Light"]; "minimum rating")]
    #[test_case(HotelFilters { sort: Some(HotelSort::PriceLowToHigh), ..HotelFilters::default() }, vec!["Harbor Light", "Old Town Inn", "Cliffside Palace"]; "sorted by price")]
    #[tokio::test]
    async fn list_filters_apply(filters: HotelFilters, expected_names: Vec<&str>) {
        let (_, service) = fixture();
        let mut names: Vec<String> = service
            .get_all(&filters)
            .await
            .into_iter()
            .map(|hotel| hotel.name)
            .collect();
        if filters.sort.is_none() {
            names.sort();
        }
        assert_eq!(names, expected_names);
    }

    #[tokio::test]
    async fn get_all_degrades_to_empty_on_failure() {
        let (client, service) = fixture();
        client.fail_next_requests(1);
        assert!(service.get_all(&HotelFilters::default()).await.is_empty());
    }

    #[tokio::test]
    async fn name_falls_back_to_generic_column() {
        let client = Arc::new(MemoryTableClient::new());
        let id = client.seed(
            "hotel_c",
            json!({"Name": "Fallback Lodge", "price_per_night_c": 50.0})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let service = HotelService::new(client);
        let hotel = service.get_by_id(id).await.unwrap();
        assert_eq!(hotel.name, "Fallback Lodge");
    }

    #[tokio::test]
    async fn get_by_id_enriches_from_review_aggregates() {
        let (client, _) = fixture();
        let reviews = Arc::new(ReviewService::new(client.clone()));
        let hotels = HotelService::new(client.clone()).with_stats_provider(reviews.clone());

        let hotel_id = seed_hotel(&client, "Reviewed Stay", "Tavira", 95.0, 4, 2.0);
        for rating in [5, 5, 4] {
            reviews
                .create(NewReview {
                    hotel_id,
                    user_id: 1,
                    rating,
                    title: format!("Rated {}", rating),
                    comment: None,
                    stay_date: None,
                    user_name: None,
                    user_avatar: None,
                    photos: Vec::new(),
                })
                .await
                .unwrap();
        }

        let hotel = hotels.get_by_id(hotel_id).await.unwrap();
        assert_eq!(hotel.rating, 4.7);
        assert_eq!(hotel.review_count, 3);
        let stats = hotel.review_stats.unwrap();
        assert_eq!(stats.five, 2);
        assert_eq!(stats.four, 1);
    }

    struct FailingStats;

    #[async_trait]
    impl RatingStatsProvider for FailingStats {
        async fn hotel_stats(&self, _hotel_id: i64) -> ServiceResult<HotelStats> {
            Err(ServiceError::Remote("aggregation offline".to_string()))
        }
    }

    #[tokio::test]
    async fn enrichment_failure_returns_base_record() {
        let (client, _) = fixture();
        let hotel_id = seed_hotel(&client, "Unenriched", "Olhao", 75.0, 3, 3.5);
        let hotels = HotelService::new(client).with_stats_provider(Arc::new(FailingStats));

        let hotel = hotels.get_by_id(hotel_id).await.unwrap();
        assert_eq!(hotel.rating, 3.5);
        assert_eq!(hotel.review_count, 10);
        assert!(hotel.review_stats.is_none());
    }

    #[tokio::test]
    async fn zero_reviews_keep_the_stored_rating() {
        let (client, _) = fixture();
        let hotel_id = seed_hotel(&client, "Quiet Place", "Aljezur", 60.0, 2, 4.4);
        let reviews = Arc::new(ReviewService::new(client.clone()));
        let hotels = HotelService::new(client).with_stats_provider(reviews);

        let hotel = hotels.get_by_id(hotel_id).await.unwrap();
        assert_eq!(hotel.rating, 4.4);
        assert_eq!(hotel.review_stats, Some(RatingDistribution::default()));
    }

    #[tokio::test]
    async fn search_short_circuits_on_blank_query() {
        let (_, service) = fixture();
        assert!(service.search("   ").await.is_empty());
        assert_eq!(service.search("cliffside").await.len(), 1);
    }

    #[tokio::test]
    async fn featured_is_capped_at_four() {
        let client = Arc::new(MemoryTableClient::new());
        for index in 0..6 {
            client.seed(
                "hotel_c",
                json!({"name_c": format!("Featured {}", index), "featured_c": true})
                    .as_object()
                    .cloned()
                    .unwrap(),
            );
        }
        let service = HotelService::new(client);
        assert_eq!(service.get_featured().await.len(), 4);
    }

    #[tokio::test]
    async fn missing_hotel_is_not_found() {
        let (_, service) = fixture();
        assert!(service.get_by_id(999).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn availability_respects_the_hotel_flag() {
        let client = Arc::new(MemoryTableClient::new());
        let id = client.seed(
            "hotel_c",
            json!({"name_c": "Closed Doors", "available_c": false, "price_per_night_c": 100.0})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let service = HotelService::new(client);

        let check_in = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        let check_out = NaiveDate::from_ymd_opt(2026, 9, 5).unwrap();
        let availability = service
            .check_availability(id, check_in, check_out)
            .await
            .unwrap();
        assert!(!availability.available);
        assert!(availability.rooms.is_empty());
    }

    #[tokio::test]
    async fn availability_offers_follow_the_base_price() {
        let client = Arc::new(MemoryTableClient::new());
        let id = client.seed(
            "hotel_c",
            json!({"name_c": "Open Doors", "available_c": true, "price_per_night_c": 100.0})
                .as_object()
                .cloned()
                .unwrap(),
        );
        let service = HotelService::new(client);
        let check_in = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        let check_out = NaiveDate::from_ymd_opt(2026, 9, 5).unwrap();

        let mut saw_available = false;
        for _ in 0..100 {
            let availability = service
                .check_availability(id, check_in, check_out)
                .await
                .unwrap();
            if !availability.available {
                assert!(availability.rooms.is_empty());
                continue;
            }
            saw_available = true;
            assert_eq!(availability.rooms.len(), 2);
            assert_eq!(availability.rooms[0].price_per_night, 100.0);
            assert_eq!(availability.rooms[1].price_per_night, 150.0);
        }
        assert!(saw_available, "the 90% gate never passed in 100 attempts");
    }
}
