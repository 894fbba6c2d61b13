//! Catalog domain module (event-sourced).
//!
//! This crate contains the product-side state the inventory engine reads and
//! writes back: visibility, purchasability, and the per-product low-stock
//! settings. Pure domain logic — no IO, no HTTP, no storage.

pub mod product;

pub use product::{
    BuyButtonDisabled, BuyButtonEnabled, CreateProduct, LowStockAction, Product, ProductCommand,
    ProductCreated, ProductEvent, ProductId, ProductPublished, ProductUnpublished, SetBuyButtonDisabled,
    SetPublished, StockSettings, StockSettingsUpdated, UpdateStockSettings,
};
