pub mod controller;
pub mod loop_worker;

pub use controller::MonitorController;
pub use loop_worker::{monitor_loop, Monitor};
