//! lom-search
//!
//! Two-phase search over resources and orders:
//! - `Search::create` validates a model name and a criteria tree (write-once)
//! - `Search::run` / `Search::page` evaluate it against current state
//!
//! Pure: the caller supplies the registry and order snapshot to evaluate.

mod criteria;
mod model;
mod page;
mod search;

pub use criteria::{
    Criteria, ItemMatch, OrderCriteria, OrderFields, ResourceCriteria, ResourceOrderCriteria,
};
pub use model::Model;
pub use page::{paginate, parse_page_segment, PageInfo, DEFAULT_PAGE_SIZE};
pub use search::{Hit, Search, SearchError};
