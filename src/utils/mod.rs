pub mod bitreader;
pub mod bytereader;
pub mod error;
pub mod image;
pub mod info;
pub mod logger;
pub mod traits;
