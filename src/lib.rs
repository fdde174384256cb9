pub mod android_jni;
pub mod announcer;
pub mod config;
pub mod directions;
pub mod engine;
pub mod error;
pub mod geo;
pub mod gpx;
pub mod instructions;
pub mod matcher;
pub mod navigator;
pub mod path;
pub mod route;
pub mod source;

pub use config::NavConfig;
pub use engine::{Engine, NavPhase, NavigationStatus};
pub use error::{NavError, Result};
pub use geo::GeoPoint;
pub use navigator::Navigator;
pub use route::{Route, Step};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
