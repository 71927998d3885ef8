pub mod color_pool;
pub mod game_events;
pub mod round;
pub mod scoring;
pub mod session;
pub mod store;

// Re-export main components
pub use color_pool::*;
pub use game_events::*;
pub use round::*;
pub use scoring::*;
pub use session::*;
pub use store::*;
