pub mod attendance;
pub mod notification;
pub mod requests;
pub mod team;
pub mod user;
