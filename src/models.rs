pub mod quotes;
pub mod remote;
pub mod sync;
