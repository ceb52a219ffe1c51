//! Tasks: control blocks, the registry and initial execution contexts.

pub use self::{
    context::{ContextTemplate, FrameLayout},
    task::*,
    task_list::*,
};

pub mod context;
mod task;
mod task_list;
