pub mod auth;
pub mod billing;
pub mod lockout;
pub mod password_policy;
pub mod privacy;
