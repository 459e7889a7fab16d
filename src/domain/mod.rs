// Domain layer: records, lenient field readers and the ports (interfaces) adapters implement.

pub mod model;
pub mod ports;
pub mod timestamp;
