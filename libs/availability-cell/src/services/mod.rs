pub mod availability;
pub mod directory;
pub mod slot_generator;
pub mod store;

pub use availability::AvailabilityService;
pub use directory::{DoctorDirectory, StaticDoctorDirectory, SupabaseDoctorDirectory};
pub use slot_generator::SlotGenerator;
pub use store::{AvailabilityRepository, InMemoryAvailabilityRepository, SupabaseAvailabilityRepository};
