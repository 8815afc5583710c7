// Domain layer: records, buckets, distance math and the transport port.

pub mod distance;
pub mod model;
pub mod ports;
