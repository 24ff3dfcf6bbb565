pub mod aggregate;
pub mod crosswalk;
pub mod etl;
pub mod extractor;
pub mod geocode;
pub mod herfindahl;
pub mod normalize;
pub mod orchestrator;
pub mod parser;
pub mod responses;
pub mod tables;

pub use crate::domain::model::{Record, TransformResult};
pub use crate::domain::ports::{Geocoder, Pipeline, Storage};
pub use crate::utils::error::Result;
