//! Output selection: which files the renderer receives and the model it
//! renders them with.

pub mod merge;
pub mod select;
pub mod transform;

pub use merge::{merge_model, MergedModel, MergedValue};
pub use select::{select_outputs, ResolvedFileEntry, SelectedOutputs};
pub use transform::{Interpolated, Transformation};

pub(crate) use select::{build_glob_set, stays_inside};
