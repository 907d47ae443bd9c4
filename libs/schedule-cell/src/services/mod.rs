pub mod availability;

pub use availability::{is_bookable, list_available_dates, AvailabilityResolver, AvailableSlots};
