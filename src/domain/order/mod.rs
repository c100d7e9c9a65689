// ============================================================================
// Order Domain - the aggregate served and ingested by this system
// ============================================================================
//
// An order is a four-part aggregate: header, delivery, payment, and line
// items. The four parts are written together or not at all; the identifier
// (`order_uid`) is globally unique and immutable once created.
//
// ============================================================================

pub mod errors;
pub mod model;

pub use errors::ValidationError;
pub use model::{Delivery, Order, OrderItem, Payment};
