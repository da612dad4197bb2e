// External hotel system clients

//! # Integrations Module
//!
//! Clients for the three external systems the executor coordinates:
//!
//! - Property management (guest lookup, room status, guest notes)
//! - Access control (keycard revocation, temporary access, area lockdown)
//! - Notifications (per-channel delivery)
//!
//! Each system is a trait so the executor can be driven against in-process
//! fakes in tests; the HTTP implementations use bearer-token auth and map
//! response status codes onto the transient/permanent error taxonomy.

pub mod access;
pub mod notify;
pub mod pms;

pub use access::{AccessControlOutcome, AccessControlSystem, HttpAccessControl};
pub use notify::{HttpNotificationGateway, NotificationChannel, NotificationGateway, NotificationReceipt};
pub use pms::{GuestProfile, HttpPropertySystem, PropertySystem, RoomStatus};
