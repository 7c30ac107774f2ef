mod driver_registry;

pub use driver_registry::{DriverConstructor, DriverRegistry};
