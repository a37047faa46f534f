//! Notification-preference evaluation, wake dispatch, session
//! continuity, and the invocation lock (C7).

pub mod error;
pub mod invoker;
pub mod preferences;
pub mod session;
pub mod trigger;

pub use error::{ErrorKind, WakeError};
pub use invoker::{InvocationLock, Invoker, NoopInvoker, TmuxInvoker, WakePayload};
pub use preferences::{MessageContext, NotificationLevel, NotificationPreferences, WakeCondition};
pub use session::{SessionData, SessionManager, SessionState};
pub use trigger::{WakeCallback, WakeDecision, WakeEvent, WakeTrigger};
