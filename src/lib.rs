pub mod net;

pub mod cache;
pub mod preload;
pub mod bridge;
pub mod links;
