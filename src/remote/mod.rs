//! Typed adapters for every remote system this process talks to: the
//! HRIS, the ATS, the resource planner, the warehouse, and the engagement
//! platform's SFTP drop.

mod charthop;
mod runn;
mod sftp;
mod teamtailor;
mod transport;
mod warehouse;

pub use charthop::ChartHopClient;
pub use runn::RunnClient;
pub use sftp::upload_csv;
pub use teamtailor::TeamtailorClient;
pub use transport::{bearer_headers, Transport};
pub use warehouse::WarehouseClient;
