pub mod anomaly;
pub mod dashboard;
pub mod patient;
pub mod session;
