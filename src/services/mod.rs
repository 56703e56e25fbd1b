pub mod allocator;
pub mod circuit_breaker;
pub mod cleanup;
pub mod entitlement;
pub mod events;
pub mod ledger;
pub mod locations;
pub mod schedule_index;
pub mod scheduler;
