//! Sales order domain module.
//!
//! The storefront order as the shipping sync sees it: state, customer, delivery
//! address, parcel lines and the append-only status history. Pure domain logic
//! (no IO, no HTTP, no storage).

pub mod order;

pub use order::{
    Customer, NewSalesOrder, OrderLine, OrderState, SalesOrder, SalesOrderId, ShippingAddress,
    StatusHistoryComment,
};
