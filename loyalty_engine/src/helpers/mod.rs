mod phone_hash;
mod state_merge;

pub use phone_hash::hash_phone;
pub use state_merge::{merge_states, MergeError};
