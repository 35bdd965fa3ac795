pub mod debounce;
pub mod session;
pub mod subscriber;

pub use debounce::DebounceGate;
pub use session::{ProcessOutcome, WatchSession};
pub use subscriber::{ChangeEvent, ChangeKind, NotifySubscriber, Subscriber, Subscription};
