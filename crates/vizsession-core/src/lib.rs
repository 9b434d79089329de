//! Session orchestration for live visualization.
//!
//! One [`Session`] runs per transport connection. It resolves the requested
//! workbook and view through the document loader, takes the view's
//! exclusive binding, and wires the view's simulation tick stream into a
//! [`tick multicast`](multicast) that seeds the viewer's renderer once and
//! streams path-addressed deltas for every tick.
//!
//! # Architecture
//!
//! ```text
//! transport connect
//!     |
//!     +-- Session (connecting -> seeded -> streaming -> closed)
//!         |-- DocumentLoader ---------> CacheRegistry (workbooksById, nBodiesById)
//!         |-- BindingRegistry --------> one live binding per view (supersession)
//!         +-- TickMulticast
//!             |-- producer  (single upstream subscription)
//!             |-- seed      (first tick only: attach render feedback)
//!             |-- diff      (latest-wins: mask -> delta -> transport)
//!             +-- pong      (ping replies, off the session loop)
//! ```
//!
//! Every resource a session acquires is owned by a guard or a `JoinSet`
//! inside [`Session::run`], so dropping the session future at any await
//! point releases the binding and aborts the pipeline tasks.

pub mod binding;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod mask;
pub mod multicast;
pub mod session;
pub mod transport;

pub use binding::{Binding, BindingGuard, BindingRegistry, Revoked};
pub use config::SessionConfig;
pub use dispatcher::DeltaDispatcher;
pub use error::{DeltaPublishError, DispatchError, SessionError, TransportError};
pub use mask::{MaskError, MaskProvider, MaskedFrame, SceneMask};
pub use multicast::{Ownership, PipelineExit, TickMulticast};
pub use session::{Session, SessionContext, SessionOutcome, SessionState};
pub use transport::Transport;
