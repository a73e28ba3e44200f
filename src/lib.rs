// Pet model and stat vector
pub mod pet;

// SQLite-backed pet store
pub mod store;

// User directory and token verification
pub mod identity;

// Bearer-token extraction
pub mod auth;

// Wire protocol (client and server events)
pub mod events;

// Scoped event fan-out
pub mod broadcast;

// Threshold notifications
pub mod notify;

// Connected session registry
pub mod presence;

// Geo rooms and location routing
pub mod rooms;

// Decay engine and tick scheduler
pub mod tick;

// Per-connection WebSocket handling
pub mod connection;

// HTTP and WebSocket APIs
pub mod api;

// Configuration
pub mod config;
