//! Front Desk dialer
//!
//! Outbound call orchestration for a front-desk telephony product: caller id
//! resolution, choice of how each call is established, a single-session call
//! state machine and realtime/polling reconciliation against Supabase.

pub mod api;
pub mod config;
pub mod models;
pub mod phone;
pub mod state;
