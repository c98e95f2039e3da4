pub mod analyze;
pub mod health;
pub mod intake;
pub mod webhook;
