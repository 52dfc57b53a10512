//! The behaviour contract a storage backend must satisfy to host the payment gateway.

mod payment_store;

pub use payment_store::{PaymentStore, PaymentStoreError};
