pub mod bill;
pub mod consumer;
pub mod cron;
pub mod disconnection;
pub mod error;
pub mod health;
pub mod password_reset;
pub mod payment;
pub mod portal;
pub mod privacy;
pub mod security;
pub mod user;
