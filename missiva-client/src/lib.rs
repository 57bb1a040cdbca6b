//! missiva-client: sessione di conversazione lato client.
//!
//! [`ClientSession`] tiene la vista della conversazione aperta e la riconcilia
//! con lo storico, gli invii locali e gli eventi live. Il trasporto è dietro il
//! trait [`ChatBackend`]; [`RemoteBackend`] parla con `missiva-server`.

pub mod backend;
pub mod remote;
pub mod session;
pub mod view;

pub use backend::{ChatBackend, PushFeed};
pub use remote::RemoteBackend;
pub use session::{ClientSession, PendingSend, SessionState};
pub use view::{ClientViewState, Origin, ViewEntry};
