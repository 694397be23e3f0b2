pub mod gateway;
pub mod period_loader;
pub mod persistence_queue;

pub use gateway::{BackendGateway, DateRange, GatewayError, HttpGateway};
pub use period_loader::{LoadError, PeriodLoader};
pub use persistence_queue::{PersistKey, PersistenceQueue};
