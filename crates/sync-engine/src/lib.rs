//! Interface synchronization engine
//!
//! Drives an asynchronously rendering interface to known states:
//! - network quiescence detection over a filtered request stream
//! - idempotent disclosure, toggle and selection controllers that act only when needed and
//!   confirm the resulting state within bounded waits
//! - typed numeric readback for counters and zoom levels
//!
//! The engine talks to the host runtime only through the traits in [`ports`].

pub mod disclosure;
pub mod errors;
pub mod metrics;
pub mod policy;
pub mod ports;
pub mod probe;
pub mod quiescence;
pub mod readback;
pub mod selection;
pub mod session;
pub mod toggle;
pub mod wait;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use disclosure::{disclosure_state, ensure_closed, ensure_open, Disclosure};
pub use errors::{DisclosureState, PortError, SyncError, ToggleState};
pub use policy::{QuiescenceOptions, SyncPolicy};
pub use ports::{ElementPort, InputPort, InterfaceHandle, NavigationPort, NetworkPort};
pub use probe::StateProbe;
pub use quiescence::{await_quiescence, require_loaded, QuiescenceVerdict, QuiescenceWatch};
pub use readback::{parse_count, read_count, read_number, step_and_confirm};
pub use selection::{
    clear_selection, read_selection, select_item, ClearAll, SelectionCount, SelectionWidget,
};
pub use session::{OpenDisclosure, Session};
pub use toggle::{ensure_selected, set_toggle, Precondition, Toggle};

pub use mapsync_core_types::{Key, Locator, Point};
pub use request_tap::{ResponseRewrite, UrlPattern};
