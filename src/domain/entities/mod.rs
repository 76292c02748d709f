pub mod billing_event;
pub mod entitlement;
pub mod feature;
pub mod processed_event;
pub mod tier;
