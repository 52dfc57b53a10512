//! Fee Payment Engine
//!
//! The core of the school-fee payment gateway: the payment-order data model, the canonical status vocabulary, and
//! the reconciliation rules that decide which of three differently-trusted ingestion channels (browser callback,
//! status poll, authenticated webhook) gets to settle a payment's final state.
//!
//! The library is divided into two main sections:
//! 1. Storage ([`traits::PaymentStore`] and its SQLite implementation). The store guarantees that concurrent
//!    read-modify-write sequences on the same settlement record cannot lose updates; callers never talk to the
//!    database directly.
//! 2. The public flow API ([`PaymentFlowApi`]), which the HTTP layer drives: create orders, register the
//!    gateway's collect requests against them, and apply status updates subject to the monotonic-trust rule.
mod flow_api;

pub mod db_types;
pub mod traits;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub mod test_utils;

pub use flow_api::PaymentFlowApi;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{PaymentStore, PaymentStoreError};
