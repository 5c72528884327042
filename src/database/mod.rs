pub mod audit;
pub mod bill;
pub mod consumer;
pub mod disconnection;
pub mod lockout;
pub mod password_policy;
pub mod password_reset;
pub mod payment;
pub mod postgres_repository;
pub mod privacy;
pub mod session;
pub mod user;
