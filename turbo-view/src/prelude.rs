//! Types and traits needed to render templates.
//!
//! ```
//! use turbo_view::prelude::*;
//! ```
pub use crate::cache::{Cache, FileCache, MemoryCache};
pub use crate::config::Config;
pub use crate::csrf::{MemorySession, Session};
pub use crate::logging::Logger;
pub use crate::view::{Context, Engine, Error, Template, ToTemplateValue, Value};

pub use time::{Duration, OffsetDateTime};

pub use serde::{Deserialize, Serialize};
