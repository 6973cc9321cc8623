//! Room registry
//!
//! The registry owns every live room. Routers look rooms up by id, lock the
//! individual room, and mutate it; they never hold a reference to a room
//! across messages, only its id.
//!
//! # Architecture
//!
//! ```text
//!                        Arc<RoomRegistry>
//!                 ┌──────────────────────────────┐
//!                 │ rooms: RwLock<HashMap<Id,    │
//!                 │   Arc<Mutex<Room {           │
//!                 │     offerer, answerer,       │
//!                 │     descriptions,            │
//!                 │     candidate buffers,       │
//!                 │   }>>                        │
//!                 │ >                            │
//!                 └──────────────┬───────────────┘
//!                                │
//!         ┌──────────────────────┼──────────────────────┐
//!         ▼                      ▼                      ▼
//!   [Router #1]            [Router #2]           [cleanup task]
//!   offer → create_room    answer → get_room     pending rooms past
//!   disconnect → delete    candidate → get_room  timeout → removed
//! ```
//!
//! # Room ids
//!
//! Ids are short random integers (six digits by default) so they can be read
//! out or pasted by hand. Uniqueness among live rooms is enforced on insert:
//! a colliding draw is retried, and creation fails with
//! [`RegistryError::Exhausted`] when the id space is full.

pub mod config;
pub mod entry;
pub mod error;
pub mod id;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{PeerRole, RegistryStats, Room, RoomState};
pub use error::RegistryError;
pub use id::{ConnectionId, RoomId};
pub use store::{RoomHandle, RoomRegistry};
