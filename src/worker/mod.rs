//! Worker Module
//!
//! The offline cache worker: lifecycle, fetch interception, admission,
//! eviction and the control channel, plus the registration that hosts it.

mod admission;
mod fallback;
mod instance;
mod lifecycle;
mod messages;
pub mod network;
mod registration;

pub use admission::AdmissionRules;
pub use fallback::{placeholder_image, PLACEHOLDER_SVG};
pub use instance::{FetchOutcome, ResponseSource, Worker, WorkerId};
pub use lifecycle::WorkerState;
pub use messages::{ClientMessage, WorkerMessage};
pub use network::{HttpNetwork, Network};
pub use registration::{
    CacheSummary, ClientId, Registration, RegistrationStatus, UpdateOutcome, WorkerSummary,
};
