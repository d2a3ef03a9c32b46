//! Marketplace operations, independent of HTTP.
//!
//! Handlers parse the request and resolve the caller; everything else lives here
//! and talks to the [`MarketplaceStore`](crate::store::MarketplaceStore) and
//! [`PaymentGateway`](crate::payments::PaymentGateway) traits.

pub mod account;
pub mod analytics;
pub mod cart;
pub mod catalog;
pub mod checkin;
pub mod checkout;
pub mod community;
pub mod payment;
pub mod promo;
pub mod recommend;

#[cfg(test)]
pub(crate) mod fixtures;
