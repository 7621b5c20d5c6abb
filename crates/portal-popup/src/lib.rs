//! Popup lifecycle coordination for privileged device interaction.
//!
//! Provides:
//! - A request gate that debounces and deduplicates popup requests
//! - Window and extension-tab transports behind one interface
//! - The two-phase handshake that gates popup initialization
//! - Open timeout, liveness polling and caller-driven retry
//! - A tokio service driver and an in-memory browser for tests and demos

pub mod coordinator;
pub mod gate;
pub mod message;
pub mod platform;
pub mod retry;
pub mod service;
pub mod sim;
pub mod timer;
pub mod transport;

pub use coordinator::{MessageSource, PopupCoordinator};
pub use gate::HandshakeGate;
pub use message::{ControlMessage, CoreMessage};
pub use platform::{ChannelPort, ExtensionPlatform, PopupWindow, WindowPlatform};
pub use retry::{ChannelPrompt, RecordingPrompt, RetryChoice, RetryOffer, RetryPrompt};
pub use service::{PopupCommand, PopupService, PopupServiceHandle, TokioScheduler};
pub use timer::{ManualClock, Scheduler, TimerKind, TimerMode};
pub use transport::{ChannelVerdict, Liveness, Platform, PopupTransport, TransportKind};
