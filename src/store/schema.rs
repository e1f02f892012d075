//! SQLite schema of the matchmaking database.
//!
//! Timestamps are unix seconds, except `message.created` which is unix
//! milliseconds so that messages sent within the same second keep their order.

use anyhow::Result;
use rusqlite::Connection;

use crate::sqlite_column;
use crate::sqlite_persistence::{
    ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};

const USER_FOREIGN_KEY: ForeignKey = ForeignKey {
    foreign_table: "user",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

/// V 0
pub(super) const USER_TABLE_V_0: Table = Table {
    name: "user",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("handle", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("display_name", &SqlType::Text, non_null = true),
        sqlite_column!("avatar_url", &SqlType::Text),
        sqlite_column!(
            "bio",
            &SqlType::Text,
            non_null = true,
            default_value = Some("''")
        ),
        sqlite_column!("spotify_id", &SqlType::Text),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_profile_sync", &SqlType::Integer),
    ],
    indices: &[("idx_user_handle", "handle")],
    unique_constraints: &[],
};

pub(super) const AUTH_TOKEN_TABLE_V_0: Table = Table {
    name: "auth_token",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FOREIGN_KEY)
        ),
        sqlite_column!("value", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_used", &SqlType::Integer),
    ],
    indices: &[("idx_auth_token_value", "value")],
    unique_constraints: &[],
};

/// List columns hold JSON arrays.
pub(super) const LISTENING_PROFILE_TABLE_V_0: Table = Table {
    name: "listening_profile",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            is_primary_key = true,
            foreign_key = Some(&USER_FOREIGN_KEY)
        ),
        sqlite_column!("top_artists", &SqlType::Text, non_null = true),
        sqlite_column!("top_genres", &SqlType::Text, non_null = true),
        sqlite_column!("top_tracks", &SqlType::Text, non_null = true),
        sqlite_column!("playlists", &SqlType::Text, non_null = true),
        sqlite_column!("danceability", &SqlType::Real, non_null = true),
        sqlite_column!("energy", &SqlType::Real, non_null = true),
        sqlite_column!("valence", &SqlType::Real, non_null = true),
        sqlite_column!("acousticness", &SqlType::Real, non_null = true),
        sqlite_column!("instrumentalness", &SqlType::Real, non_null = true),
        sqlite_column!(
            "updated",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[],
    unique_constraints: &[],
};

pub(super) const USER_MATCH_TABLE_V_0: Table = Table {
    name: "user_match",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FOREIGN_KEY)
        ),
        sqlite_column!(
            "matched_user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FOREIGN_KEY)
        ),
        sqlite_column!("compatibility_score", &SqlType::Integer, non_null = true),
        sqlite_column!("compatibility_details", &SqlType::Text, non_null = true),
        sqlite_column!(
            "status",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'pending'")
        ),
        sqlite_column!("user_action", &SqlType::Text),
        sqlite_column!("matched_user_action", &SqlType::Text),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    indices: &[("idx_user_match_matched_user_id", "matched_user_id")],
    unique_constraints: &[&["user_id", "matched_user_id"]],
};

pub(super) const MESSAGE_TABLE_V_0: Table = Table {
    name: "message",
    columns: &[
        sqlite_column!("id", &SqlType::Text, is_primary_key = true),
        sqlite_column!("pair_low", &SqlType::Integer, non_null = true),
        sqlite_column!("pair_high", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "sender_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FOREIGN_KEY)
        ),
        sqlite_column!("content", &SqlType::Text, non_null = true),
        sqlite_column!("created", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "read",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    indices: &[("idx_message_pair", "pair_low, pair_high")],
    unique_constraints: &[],
};

/// V 1
pub(super) const USER_MATCH_TABLE_V_1: Table = Table {
    name: "user_match",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FOREIGN_KEY)
        ),
        sqlite_column!(
            "matched_user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FOREIGN_KEY)
        ),
        sqlite_column!("compatibility_score", &SqlType::Integer, non_null = true),
        sqlite_column!("compatibility_details", &SqlType::Text, non_null = true),
        sqlite_column!(
            "status",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'pending'")
        ),
        sqlite_column!("user_action", &SqlType::Text),
        sqlite_column!("matched_user_action", &SqlType::Text),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        // Optimistic concurrency token, bumped on every write of the row.
        sqlite_column!(
            "version",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
    ],
    indices: &[("idx_user_match_matched_user_id", "matched_user_id")],
    unique_constraints: &[&["user_id", "matched_user_id"]],
};

fn add_match_version_column(conn: &Connection) -> Result<()> {
    conn.execute(
        "ALTER TABLE user_match ADD COLUMN version INTEGER NOT NULL DEFAULT 0",
        [],
    )?;
    Ok(())
}

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[
            USER_TABLE_V_0,
            AUTH_TOKEN_TABLE_V_0,
            LISTENING_PROFILE_TABLE_V_0,
            USER_MATCH_TABLE_V_0,
            MESSAGE_TABLE_V_0,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 1,
        tables: &[
            USER_TABLE_V_0,
            AUTH_TOKEN_TABLE_V_0,
            LISTENING_PROFILE_TABLE_V_0,
            USER_MATCH_TABLE_V_1,
            MESSAGE_TABLE_V_0,
        ],
        migration: Some(add_match_version_column),
    },
];
