pub mod entitlement_store;
pub mod processed_events;
