// Exchange feed clients

pub mod feed;

// Re-export client types
pub use feed::{decode_book_message, BookMessage, FeedConnector};
