// Booking service: CRUD over the booking table plus the derived queries
// the trips screens are built on (by status, upcoming, recent).

use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::client::{Condition, QueryParams, TableClient};
use crate::error::{ServiceError, ServiceResult};
use crate::mapping::{
    self, all_deleted, decode, encode, fetch_all, fetch_one, first_successful, RecordRef,
};
use crate::notify::{Notifier, NullNotifier};

const TABLE: &str = "booking_c";
const ENTITY: &str = "booking";

pub const DEFAULT_RECENT_LIMIT: usize = 5;

const FIELDS: [&str; 17] = [
    "Id",
    "Name",
    "check_in_c",
    "check_out_c",
    "confirmation_number_c",
    "created_at_c",
    "guest_details_c",
    "guests_c",
    "hotel_id_c",
    "hotel_image_c",
    "hotel_name_c",
    "location_c",
    "nights_c",
    "room_type_c",
    "status_c",
    "total_price_c",
    "user_id_c",
];

// The only modeled state transition is confirmed -> cancelled, via
// `cancel`. Nothing prevents cancelling an already-cancelled booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Booking {
    pub id: i64,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub confirmation_number: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub guest_details: Map<String, Value>,
    pub guests: u32,
    pub hotel_id: i64,
    pub hotel_image: Option<String>,
    pub hotel_name: String,
    pub location: Option<String>,
    pub nights: u32,
    pub room_type: Option<String>,
    pub status: BookingStatus,
    pub total_price: f64,
    pub user_id: i64,
}

#[derive(Debug, Deserialize)]
struct BookingRecord {
    #[serde(rename = "Id")]
    id: i64,
    #[serde(rename = "check_in_c")]
    check_in: NaiveDate,
    #[serde(rename = "check_out_c")]
    check_out: NaiveDate,
    #[serde(rename = "confirmation_number_c", default)]
    confirmation_number: Option<String>,
    #[serde(rename = "created_at_c", default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(rename = "guest_details_c", default)]
    guest_details: Option<Value>,
    #[serde(rename = "guests_c", default)]
    guests: u32,
    #[serde(rename = "hotel_id_c")]
    hotel_id: RecordRef,
    #[serde(rename = "hotel_image_c", default)]
    hotel_image: Option<String>,
    #[serde(rename = "hotel_name_c", default)]
    hotel_name: Option<String>,
    #[serde(rename = "location_c", default)]
    location: Option<String>,
    #[serde(rename = "nights_c", default)]
    nights: u32,
    #[serde(rename = "room_type_c", default)]
    room_type: Option<String>,
    #[serde(rename = "status_c")]
    status: BookingStatus,
    #[serde(rename = "total_price_c", default)]
    total_price: f64,
    #[serde(rename = "user_id_c")]
    user_id: RecordRef,
}

impl From<BookingRecord> for Booking {
    fn from(record: BookingRecord) -> Self {
        Self {
            id: record.id,
            check_in: record.check_in,
            check_out: record.check_out,
            confirmation_number: record.confirmation_number,
            created_at: record.created_at,
            guest_details: mapping::lenient_object(record.guest_details.as_ref()),
            guests: record.guests,
            hotel_id: record.hotel_id.id(),
            hotel_image: record.hotel_image,
            hotel_name: record.hotel_name.unwrap_or_default(),
            location: record.location,
            nights: record.nights,
            room_type: record.room_type,
            status: record.status,
            total_price: record.total_price,
            user_id: record.user_id.id(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guest_details: Map<String, Value>,
    pub guests: u32,
    pub hotel_id: i64,
    pub hotel_image: Option<String>,
    pub hotel_name: String,
    pub location: Option<String>,
    pub nights: u32,
    pub room_type: String,
    pub total_price: f64,
    pub user_id: i64,
}

#[derive(Serialize)]
struct CreateBookingRecord<'a> {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "check_in_c")]
    check_in: NaiveDate,
    #[serde(rename = "check_out_c")]
    check_out: NaiveDate,
    #[serde(rename = "confirmation_number_c")]
    confirmation_number: String,
    #[serde(rename = "created_at_c")]
    created_at: DateTime<Utc>,
    #[serde(rename = "guest_details_c", serialize_with = "mapping::as_json_text")]
    guest_details: Option<&'a Map<String, Value>>,
    #[serde(rename = "guests_c")]
    guests: u32,
    #[serde(rename = "hotel_id_c")]
    hotel_id: i64,
    #[serde(rename = "hotel_image_c")]
    hotel_image: Option<&'a str>,
    #[serde(rename = "hotel_name_c")]
    hotel_name: &'a str,
    #[serde(rename = "location_c")]
    location: Option<&'a str>,
    #[serde(rename = "nights_c")]
    nights: u32,
    #[serde(rename = "room_type_c")]
    room_type: &'a str,
    #[serde(rename = "status_c")]
    status: BookingStatus,
    #[serde(rename = "total_price_c")]
    total_price: f64,
    #[serde(rename = "user_id_c")]
    user_id: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BookingPatch {
    #[serde(rename = "check_in_c", skip_serializing_if = "Option::is_none")]
    pub check_in: Option<NaiveDate>,
    #[serde(rename = "check_out_c", skip_serializing_if = "Option::is_none")]
    pub check_out: Option<NaiveDate>,
    #[serde(
        rename = "confirmation_number_c",
        skip_serializing_if = "Option::is_none"
    )]
    pub confirmation_number: Option<String>,
    #[serde(
        rename = "guest_details_c",
        serialize_with = "mapping::as_json_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub guest_details: Option<Map<String, Value>>,
    #[serde(rename = "guests_c", skip_serializing_if = "Option::is_none")]
    pub guests: Option<u32>,
    #[serde(rename = "hotel_id_c", skip_serializing_if = "Option::is_none")]
    pub hotel_id: Option<i64>,
    #[serde(rename = "hotel_image_c", skip_serializing_if = "Option::is_none")]
    pub hotel_image: Option<String>,
    #[serde(rename = "hotel_name_c", skip_serializing_if = "Option::is_none")]
    pub hotel_name: Option<String>,
    #[serde(rename = "location_c", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(rename = "nights_c", skip_serializing_if = "Option::is_none")]
    pub nights: Option<u32>,
    #[serde(rename = "room_type_c", skip_serializing_if = "Option::is_none")]
    pub room_type: Option<String>,
    #[serde(rename = "status_c", skip_serializing_if = "Option::is_none")]
    pub status: Option<BookingStatus>,
    #[serde(rename = "total_price_c", skip_serializing_if = "Option::is_none")]
    pub total_price: Option<f64>,
    #[serde(rename = "user_id_c", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

pub struct BookingService {
    client: Arc<dyn TableClient>,
    notifier: Arc<dyn Notifier>,
}

impl BookingService {
    pub fn new(client: Arc<dyn TableClient>) -> Self {
        Self::with_notifier(client, Arc::new(NullNotifier))
    }

    pub fn with_notifier(client: Arc<dyn TableClient>, notifier: Arc<dyn Notifier>) -> Self {
        Self { client, notifier }
    }

    pub async fn get_all(&self, user_id: Option<i64>) -> Vec<Booking> {
        let mut params = QueryParams::select(&FIELDS);
        if let Some(user_id) = user_id {
            params = params.filter(Condition::equal_to("user_id_c", user_id));
        }

        fetch_all::<BookingRecord>(
            self.client.as_ref(),
            TABLE,
            params,
            ENTITY,
            self.notifier.as_ref(),
        )
        .await
        .into_iter()
        .map(Booking::from)
        .collect()
    }

    pub async fn get_by_id(&self, id: i64) -> ServiceResult<Booking> {
        fetch_one::<BookingRecord>(
            self.client.as_ref(),
            TABLE,
            id,
            QueryParams::select(&FIELDS),
            ENTITY,
            self.notifier.as_ref(),
        )
        .await
        .map(Booking::from)
    }

    pub async fn create(&self, booking: NewBooking) -> ServiceResult<Booking> {
        if booking.hotel_id <= 0 {
            return Err(ServiceError::InvalidField("hotel_id"));
        }
        if booking.user_id <= 0 {
            return Err(ServiceError::InvalidField("user_id"));
        }

        let record = encode(&CreateBookingRecord {
            name: format!("Booking - {}", booking.hotel_name),
            check_in: booking.check_in,
            check_out: booking.check_out,
            confirmation_number: confirmation_number(),
            created_at: Utc::now(),
            guest_details: Some(&booking.guest_details),
            guests: booking.guests,
            hotel_id: booking.hotel_id,
            hotel_image: booking.hotel_image.as_deref(),
            hotel_name: &booking.hotel_name,
            location: booking.location.as_deref(),
            nights: booking.nights,
            room_type: &booking.room_type,
            status: BookingStatus::Confirmed,
            total_price: booking.total_price,
            user_id: booking.user_id,
        })?;

        let response = self.client.create_records(TABLE, vec![record]).await?;
        let created = first_successful(response, "create", ENTITY, self.notifier.as_ref())?;
        decode::<BookingRecord>(created).map(Booking::from)
    }

    pub async fn update(&self, id: i64, patch: BookingPatch) -> ServiceResult<Booking> {
        let mut record = encode(&patch)?;
        record.insert("Id".to_string(), id.into());

        let response = self.client.update_records(TABLE, vec![record]).await?;
        first_successful(response, "update", ENTITY, self.notifier.as_ref())?;
        // Read back through the authoritative path rather than trusting the
        // write response.
        self.get_by_id(id).await
    }

    pub async fn cancel(&self, id: i64) -> ServiceResult<Booking> {
        self.update(
            id,
            BookingPatch {
                status: Some(BookingStatus::Cancelled),
                ..BookingPatch::default()
            },
        )
        .await
    }

    pub async fn delete(&self, id: i64) -> ServiceResult<()> {
        let response = self.client.delete_records(TABLE, vec![id]).await?;
        all_deleted(response, ENTITY, self.notifier.as_ref())
    }

    pub async fn get_by_status(
        &self,
        status: BookingStatus,
        user_id: Option<i64>,
    ) -> Vec<Booking> {
        self.get_all(user_id)
            .await
            .into_iter()
            .filter(|booking| booking.status == status)
            .collect()
    }

    // Future check-ins that have not been cancelled.
    pub async fn get_upcoming(&self, user_id: Option<i64>) -> Vec<Booking> {
        let today = Utc::now().date_naive();
        self.get_all(user_id)
            .await
            .into_iter()
            .filter(|booking| {
                booking.check_in >= today && booking.status != BookingStatus::Cancelled
            })
            .collect()
    }

    pub async fn get_recent(&self, user_id: Option<i64>, limit: usize) -> Vec<Booking> {
        let mut bookings = self.get_all(user_id).await;
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        bookings.truncate(limit);
        bookings
    }
}

fn confirmation_number() -> String {
    format!(
        "STY-{:03}-{}",
        rand::thread_rng().gen_range(0..1000),
        Utc::now().year()
    )
}
