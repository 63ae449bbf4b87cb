pub mod core;
pub mod exceptions;
pub mod offerings;
pub mod schedule_day;
