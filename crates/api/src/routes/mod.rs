pub mod health;
pub mod metrics;
pub mod people;
pub mod sales;
