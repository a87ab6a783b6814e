//! Backend discovery, registration and allow-listing.

mod allow_list;
mod loader;
mod registry;

pub use allow_list::{AllowList, ContainerPolicy};
pub use loader::{BackendContext, BackendFactory, BackendLoader, BuildFn, BUILTIN_BACKENDS};
pub use registry::BackendRegistry;
