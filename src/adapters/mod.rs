// Adapters layer: concrete implementations for external systems (upstream HTTP, SQLite, CSV).

pub mod export;
pub mod pocket;
pub mod store;
pub mod warrant_board;

pub use pocket::PocketClient;
pub use store::Store;
pub use warrant_board::WarrantBoardClient;
