pub mod booking;
pub mod notifier;
pub mod store;
pub mod supabase_store;

pub use booking::{AppointmentBookingService, BookingSettings, Clock};
pub use notifier::{AppointmentNotifier, NotifyError};
pub use store::{AppointmentStore, InMemoryAppointmentStore};
pub use supabase_store::SupabaseAppointmentStore;
