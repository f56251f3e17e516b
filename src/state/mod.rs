//! Network state: the in-memory mirror of one IRC network.

pub mod channel;
pub mod network;
pub mod server;
pub mod uid;
pub mod user;

pub use channel::Channel;
pub use network::{DetachedSubtree, Network};
pub use server::Server;
pub use uid::{UidGenerator, DEFAULT_UID_ALPHABET, DEFAULT_UID_WIDTH};
pub use user::User;
