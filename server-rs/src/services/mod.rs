pub mod access_gate;
pub mod folio;
pub mod housekeeping;
pub mod inventory;
pub mod loans;
pub mod pricing;
pub mod reservations;
pub mod subscriptions;
