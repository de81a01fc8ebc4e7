//! Domain models for backed-up accounts and records

mod key;
mod object;
mod sync_state;
mod user;

pub use key::{Key, KeyCategory, KeySet};
pub use object::RemoteObject;
pub use sync_state::SyncState;
pub use user::User;
