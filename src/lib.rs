// Data-access services for the StayHub booking front-end: field-name
// translation between wire records and domain objects, CRUD against the
// hosted table backend, and light client-side aggregation.

pub mod booking;
pub mod client;
pub mod error;
pub mod hotel;
pub mod http_client;
pub mod mapping;
pub mod memory_client;
pub mod notify;
pub mod review;
pub mod user;

// Re-export key types for convenience
pub use booking::{Booking, BookingPatch, BookingService, BookingStatus, NewBooking};
pub use client::{
    ClientConfig, Condition, Operator, QueryParams, Record, SortDirection, TableClient,
};
pub use error::{ServiceError, ServiceResult};
pub use hotel::{Availability, Hotel, HotelFilters, HotelService, HotelSort, RoomOffer};
pub use http_client::HttpTableClient;
pub use memory_client::MemoryTableClient;
pub use notify::{Notifier, NullNotifier, RecordingNotifier};
pub use review::{
    HotelStats, NewReview, RatingDistribution, RatingStatsProvider, Review, ReviewFilters,
    ReviewPatch, ReviewService, ReviewSort,
};
pub use user::{Preferences, PreferencesPatch, User, UserPatch, UserService};
