//! CloudEvents support for event-mode functions.
//!
//! Events are `cloudevents-sdk` values; this module only adapts them to the
//! host's buffered requests and mounts the receiver.

pub mod binding;
mod receiver;

pub use cloudevents::{AttributesReader, Data, Event, EventBuilder, EventBuilderV10};
pub use receiver::EventReceiver;
