// ROI templates
// A template stores ROI positions for one screen together with reference
// regions; applying it to a new screenshot re-locates those regions and moves
// the ROIs accordingly.

pub mod applier;
pub mod model;
pub mod solver;
pub mod store;


pub use applier::{AppliedTemplate, TemplateApplier};
pub use model::{ReferenceRegion, RoiDefinition, Template, TemplateBuilder};
pub use solver::{Correspondence, Transform};
pub use store::TemplateStore;
