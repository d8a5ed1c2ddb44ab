pub mod db;
pub mod realtime;
pub mod token;

pub use db::PgStore;
pub use realtime::WsHub;
pub use token::JwtTokens;
