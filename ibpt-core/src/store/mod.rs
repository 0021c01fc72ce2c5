mod clock;
mod factory;
mod memory;
mod rate_store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use factory::{MemoryStoreFactory, StoreConfig, StoreFactory, StoreRegistry};
pub use memory::MemoryStore;
pub use rate_store::{RateStore, StoreError};

