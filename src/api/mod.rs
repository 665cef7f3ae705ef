pub mod client;
pub mod functions;
pub mod realtime;
pub mod records;

pub use client::*;
pub use realtime::SupabaseRealtime;
