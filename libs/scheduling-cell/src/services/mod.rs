pub mod assignment;
pub mod availability;
pub mod booking;
pub mod circuit_breaker;
pub mod conflict;
pub mod draft;
pub mod fetch_controller;
pub mod slots;
pub mod store;

pub use assignment::{assign_first_available, first_available};
pub use availability::AvailabilityService;
pub use booking::BookingService;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerState, CircuitState};
pub use conflict::{sort_by_severity, ConflictDetector, ScanStrategy};
pub use draft::{DraftStore, InMemoryDraftStore};
pub use fetch_controller::{
    AvailabilityController, AvailabilitySource, AvailabilityView, FetchEffect, FetchEvent, FetchMachine, FetchPhase,
};
pub use slots::SlotGenerator;
pub use store::{AppointmentSubmitter, BookingStore, SupabaseScheduleStore, WorkPeriodStore};
