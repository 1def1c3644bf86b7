//! One-shot contract event subscriptions.
//!
//! Agreement flows advance on ledger events ("agreement executed",
//! "access granted"). Each wait is a [`Subscription`] that resolves with the
//! first matching event and then tears itself down.

pub mod listener;

pub use listener::{EventListener, ListenerHandle, Subscription};
