pub mod queue;

pub use queue::{Popup, PopupKind, PopupQueue};
