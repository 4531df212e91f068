//! API handlers for the Freightlane backend

mod admin;
mod booking;
mod health;
mod notification;
mod payment;
mod trip;

pub use admin::*;
pub use booking::*;
pub use health::*;
pub use notification::*;
pub use payment::*;
pub use trip::*;
