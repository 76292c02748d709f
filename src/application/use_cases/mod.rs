pub mod access;
pub mod entitlement;
pub mod quota;
pub mod reconciliation;
