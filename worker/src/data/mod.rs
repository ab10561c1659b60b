pub mod record;
pub mod shard;

pub use record::{Sample, parse_record};
pub use shard::{Joints, ShardState};
