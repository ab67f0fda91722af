pub mod availability;
pub mod coordinator;
pub mod eversports;
pub mod registry;
pub mod sensor;
pub mod slots;
