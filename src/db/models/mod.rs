mod account;
mod certificate;
mod enrollment;
mod program;
mod task_result;

pub use account::*;
pub use certificate::*;
pub use enrollment::*;
pub use program::*;
pub use task_result::*;
