#[allow(clippy::module_inception)]
pub mod page;
pub mod page_guard;
pub mod page_id;
