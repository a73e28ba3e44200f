// HTTP and WebSocket APIs

pub mod pets;
pub mod tick;
pub mod users;
pub mod websocket;

pub use pets::{create_pets_router, PetsAppState};
pub use tick::{create_tick_router, TickAppState};
pub use users::{create_users_router, UsersAppState};
pub use websocket::{create_ws_router, WsAppState};
