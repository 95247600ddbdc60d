pub mod config;
pub mod decode;
pub mod error;
pub mod fetch;
pub mod geo;
pub mod ledger;
pub mod operator;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod reference;
pub mod stats;
pub mod transport;
pub mod vehicle;
