pub mod console;
pub mod crypto;
pub mod http;
pub mod poll;
pub mod types;
