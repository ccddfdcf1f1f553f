mod order_ids;
mod phone;

pub use order_ids::{format_order_id, IdSpaceExhausted};
pub use phone::{normalize_phone, InvalidPhoneNumber};
