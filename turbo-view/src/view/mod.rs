//! Templates and the engine rendering them.
//!
//! Templates are markup with `{{ interpolations }}` and `@directives`. They are translated into a small
//! template language and interpreted at runtime, so a template changed on disk is picked up by the next
//! render. Compiled templates are cached in memory and on disk, see [`Templates`].
//!
//! # Example
//!
//! ```
//! # use turbo_view::view::*;
//! let template = Template::from_str("@if($user)<h1>{{ $user }}</h1>@endif").unwrap();
//! let mut context = Context::new();
//!
//! context.set("user", "Lev").unwrap();
//!
//! let rendered = template.render(&context).unwrap();
//!
//! assert_eq!(rendered, "<h1>Lev</h1>");
//! ```
pub mod cache;
pub mod engine;
pub mod template;

pub use cache::Templates;
pub use engine::{Engine, Function};
pub use template::Context;
pub use template::Error;
pub use template::Template;

pub use template::{ToTemplateValue, Value};
