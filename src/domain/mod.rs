// Domain layer: table row types and the ports (storage, geocoder, pipeline).

pub mod model;
pub mod ports;
