mod schema;
mod sqlite_store;
mod trait_def;

pub use schema::VERSIONED_SCHEMAS;
pub use sqlite_store::SqliteStore;
pub use trait_def::{
    AuthTokenStore, FullStore, HandleTakenError, ListeningProfileStore, MatchStore,
    MatchWriteError, MessageStore, UserStore,
};
