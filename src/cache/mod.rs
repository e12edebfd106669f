//! Expiring caches: the generic TTL store and the typed user/profile caches.

pub mod clock;
pub mod ttl;
pub mod typed;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ttl::TtlCache;
pub use typed::{
    StudentProfileCache, UserCache, DEFAULT_STUDENT_PROFILE_TTL, DEFAULT_USER_TTL,
};
