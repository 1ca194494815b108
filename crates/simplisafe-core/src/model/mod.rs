// ── Domain model ──
//
// Canonical representations of the account's systems, devices and
// events. Raw vendor payloads from simplisafe-api are converted into these
// types in `crate::convert`; consumers only ever see these.

pub mod device;
pub mod event;
pub mod ids;
pub mod system;

pub use device::{Device, DeviceType, LockState, ReportedState};
pub use event::{Event, EventType, Notification};
pub use ids::{DeviceId, SystemId};
pub use system::{Address, AlarmState, Camera, System, SystemVersion};
