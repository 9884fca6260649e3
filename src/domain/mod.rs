mod enrollment;
mod module;
mod registry;
mod student;

pub use enrollment::*;
pub use module::*;
pub use registry::*;
pub use student::*;
