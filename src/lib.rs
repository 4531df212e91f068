//! Freightlane Backend Library
//!
//! Trip booking and lifecycle engine for a freight marketplace: transporters
//! offer trips, clients book them, and bookings move through confirmation,
//! dispatch, delivery or cancellation with the matching payment handling.

pub mod auth;
pub mod booking;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod geocode;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod notification;
pub mod payment;
pub mod routes;
pub mod state;
pub mod store;
pub mod trip;
pub mod websocket;
