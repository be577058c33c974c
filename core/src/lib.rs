pub mod descriptor;
pub mod keypoint;
pub mod rect;
pub mod robust;

pub use descriptor::*;
pub use keypoint::*;
pub use rect::*;
pub use robust::{Ransac, RobustConfig, RobustModel, RobustResult};
