pub mod errors;
pub mod events;
pub mod id;

pub use errors::{ConfigError, PlatformError, PortalError};
pub use events::{EventBus, PopupEvent};
pub use id::{ListenerId, TabId, TimerId, WindowId};

pub type Result<T> = std::result::Result<T, PortalError>;
