//! Queue driver module.
//!
//! ## Module organization
//!
//! - `driver.rs` - Core `BalancedQueue` struct and builder
//! - `push.rs` - Push operations and partition-resolution entry points
//! - `pop.rs` - Pop, combined pop-and-acquire, try-next-partition
//! - `ack.rs` - Release, delete, delayed promotion
//! - `admin.rs` - Sizes, enumeration, clear operations
//! - `partition.rs` - Partition capability protocol and resolution
//! - `reservation.rs` - Reservation handle
//! - `events.rs` - Event hook surface
//! - `sweeper.rs` - Periodic delayed-job promoter

mod ack;
mod admin;
mod driver;
mod events;
mod partition;
mod pop;
mod push;
mod reservation;
mod sweeper;

#[cfg(test)]
mod tests;

pub use driver::{BalancedQueue, Builder, DEFAULT_PREFIX};
pub use events::{EventHook, NoopHook};
pub use partition::{PartitionResolver, PartitionedJob, DEFAULT_PARTITION};
pub use push::PushOptions;
pub use reservation::Reservation;
pub use sweeper::spawn_sweeper;
