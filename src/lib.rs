// deckd - configuration-driven button deck dispatcher
// App grid loading, key face rendering, paging and per-device sessions

pub mod config;
pub mod dispatch;
pub mod error;
pub mod launcher;
pub mod pager;
pub mod render;
pub mod session;
pub mod settings;

pub use config::{Action, AppGrid, ConfigStore, Direction, Slot};
pub use dispatch::Dispatcher;
pub use error::{ConfigError, DeckError};
pub use launcher::{ActionRunner, ProcessLauncher};
pub use pager::{Effect, Pager};
pub use render::{FaceRenderer, KeyRenderer, KeyStyle, Margins};
pub use session::{DeckSession, Flow, SessionContext};
pub use settings::Settings;
