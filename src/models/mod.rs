pub mod binding;
pub mod target;

pub use binding::Binding;
pub use target::ActiveTarget;
