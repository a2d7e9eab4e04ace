// Domain layer: records exchanged with the CRM and the ports the core is written against.

pub mod model;
pub mod ports;
