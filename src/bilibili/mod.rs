pub mod client;
pub mod playurl;
