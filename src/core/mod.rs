pub mod changes;
pub mod etl;
pub mod sorting;
pub mod volume;

pub use crate::domain::ports::Pipeline;
pub use crate::utils::error::Result;
pub use etl::EtlEngine;
