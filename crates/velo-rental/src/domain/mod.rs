pub mod availability;
pub mod clock;
pub mod fare;
pub mod fleet;
pub mod geofence;
pub mod locks;
pub mod rentals;
pub mod types;
pub mod users;

pub use availability::AvailabilityCoordinator;
pub use clock::{Clock, ManualClock, SystemClock};
pub use fare::Fare;
pub use fleet::FleetManager;
pub use geofence::Geofence;
pub use locks::LifecycleLocks;
pub use rentals::{RentalLifecycleManager, RentalOperations};
pub use types::*;
pub use users::{AccountChanges, PasswordHashing, Registration, UserManager};
