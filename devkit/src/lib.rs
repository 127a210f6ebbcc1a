//! Dev and test tooling for the homelink bridge.
//!
//! Lets you exercise the bridge without a broker or a physical controller:
//! a stub publisher that records every outbound message (and can inject
//! transport failures), raw payload builders for the device's inbound
//! messages, and canned collaborator implementations.

pub mod events;
pub mod providers;
pub mod stub;

pub use providers::{CountingNotifier, FailingScheduleProvider, FixedScheduleProvider};
pub use stub::{PublishedMessage, StubPublisher};
