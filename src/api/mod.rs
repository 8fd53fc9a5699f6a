pub mod attendance;
pub mod auth;
pub mod health;
pub mod notification;
pub mod requests;
pub mod team;
pub mod ws;
