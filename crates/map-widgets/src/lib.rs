//! Page objects for the climate resilience map application.
//!
//! Every widget is a plain descriptor (locators plus controller descriptors from
//! `sync-engine`). Operations take the scenario's [`Session`](sync_engine::Session) and
//! delegate the waiting and the idempotence to the engine.

pub mod app;
pub mod assets_by_type;
pub mod assets_config;
pub mod categories;
pub mod errors;
pub mod facilities;
pub mod home;
pub mod map_page;
pub mod more_layers;
pub mod selectors;
pub mod sidebar;

pub use app::{AppUi, MapTargets};
pub use assets_by_type::{AssetType, AssetsByType};
pub use assets_config::AssetsConfig;
pub use categories::CategoriesBar;
pub use errors::WidgetError;
pub use facilities::Facilities;
pub use home::{HomePage, NavSection};
pub use map_page::{Dataset, DatasetVisibility, MapPage};
pub use more_layers::MoreLayers;
pub use sidebar::Sidebar;
