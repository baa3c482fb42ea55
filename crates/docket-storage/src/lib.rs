//! Docket storage
//!
//! A durable `CaseRepository` on top of sled. Records are stored as JSON in
//! one tree per record type; ids come from the database's monotonic id
//! generator and are encoded big-endian so prefix scans walk them in creation
//! order.
//!
//! ## Trees
//!
//! | tree             | key                    | value          |
//! |------------------|------------------------|----------------|
//! | `users`          | user id                | `User`         |
//! | `usernames`      | username bytes         | user id        |
//! | `cases`          | case id                | `Case`         |
//! | `cases_by_owner` | owner id ++ case id    | empty          |
//! | `rulings`        | case id                | `Ruling`       |
//! | `ruling_index`   | ruling id              | case id        |
//! | `bias_checks`    | ruling id              | `BiasCheck`    |
//! | `audit`          | user id ++ entry id    | `AuditEntry`   |
//!
//! Keying rulings by case and bias checks by ruling makes "one per parent"
//! structural.

mod keys;
mod repository;

pub use repository::SledRepository;
