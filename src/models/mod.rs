pub mod user;
pub mod otp;

pub use user::*;
pub use otp::*;
