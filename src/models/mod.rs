pub mod audit;
pub mod bill;
pub mod consumer;
pub mod disconnection;
pub mod health;
pub mod lockout;
pub mod pagination;
pub mod password_policy;
pub mod password_reset;
pub mod payment;
pub mod privacy;
pub mod session;
pub mod user;
