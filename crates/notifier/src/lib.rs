//! Announcement delivery: channels, message rendering and the paced dispatcher.

pub mod channel;
pub mod dispatcher;
pub mod message;

pub use channel::{DeliveryChannel, TelegramChannel};
pub use dispatcher::{BroadcastReport, DispatchPacing, Dispatcher, RecipientOutcome};
