pub mod messages;
pub mod routing_table;
pub mod sequence;

pub use messages::*;
pub use routing_table::*;
pub use sequence::SequenceLedger;
