//! BDD step definitions for cert-checker service

pub mod cycle_steps;
pub mod dispatch_steps;
pub mod doubles;
pub mod notification_steps;
