pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod services;
pub mod store;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{Decimal, InstrumentName, Side, UserId};
pub use error::AppError;
pub use services::{EngineError, Exchange, ExchangeSettings};
pub use store::{FlushPolicy, MemoryPersistence, Persistence, Store, StoreError};
