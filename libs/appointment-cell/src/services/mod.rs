pub mod booking;
pub mod lifecycle;
pub mod patients;
pub mod query;

pub use booking::BookingCoordinator;
pub use lifecycle::SlotLifecycle;
pub use patients::{PatientDirectory, StaticPatientDirectory, SupabasePatientDirectory};
pub use query::AppointmentQueryService;
