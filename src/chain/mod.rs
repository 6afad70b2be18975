//! On-chain observation: datum decoding, the chain-sync follower, and
//! the mempool observer (spec §4.3, §4.4).

pub mod datum;
pub mod follower;
pub mod mempool;

pub use follower::ChainFollower;
pub use mempool::MempoolObserver;
