//! Example domains built on `EventGuard`.
//!
//! - [`shopping_cart`]: open a cart, add and remove product items, confirm.
//! - [`cash_register`]: place a register, run shifts, book transactions.
//! - [`transport`]: how an HTTP layer would map requests and outcomes.

#![forbid(unsafe_code)]

pub mod cash_register;
pub mod shopping_cart;
pub mod transport;
