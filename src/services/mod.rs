pub mod auth;
pub mod otp;
pub mod phone;
pub mod token;
pub mod users;
