pub mod confidence_badge;
pub mod nav;
pub mod refund_result;
