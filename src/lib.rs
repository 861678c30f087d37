pub mod addr;
pub mod dns;
pub mod nodes;

pub use addr::{Address, AddressError, NetworkType};
pub use dns::{DnsServer, SeedHandler};
pub use nodes::{Node, NodeManager};
