use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use anyhow::{bail, Context, Result};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use super::schema::VERSIONED_SCHEMAS;
use super::trait_def::{
    AuthTokenStore, HandleTakenError, ListeningProfileStore, MatchStore, MatchWriteError,
    MessageStore, UserStore,
};
use crate::compatibility::CompatibilityDetails;
use crate::conversation::{Message, PairKey};
use crate::matching::{MatchRecord, MatchStatus, NewMatch, Resolution, SwipeAction};
use crate::profile::{AudioFeatures, ListeningProfile};
use crate::sqlite_persistence::{BASE_DB_VERSION, DEFAULT_TIMESTAMP};
use crate::user::{AuthToken, AuthTokenValue, NewUser, UserAccount};

const MATCH_COLUMNS: &str = "id, user_id, matched_user_id, compatibility_score, \
     compatibility_details, status, user_action, matched_user_action, created, updated, version";

const USER_COLUMNS: &str =
    "id, handle, display_name, avatar_url, bio, spotify_id, created, last_profile_sync";

fn system_time_from_secs(value: i64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(value.max(0) as u64)
}

fn system_time_from_millis(value: i64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_millis(value.max(0) as u64)
}

fn millis_from_system_time(time: SystemTime) -> i64 {
    time.duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn conversion_error<E>(index: usize, err: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
{
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, err.into())
}

fn parse_column<T>(row: &Row, index: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = anyhow::Error>,
{
    let raw: String = row.get(index)?;
    raw.parse::<T>().map_err(|err| conversion_error(index, err))
}

fn parse_optional_column<T>(row: &Row, index: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = anyhow::Error>,
{
    match row.get::<usize, Option<String>>(index)? {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|err| conversion_error(index, err)),
        None => Ok(None),
    }
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row, index: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(index)?;
    serde_json::from_str(&raw).map_err(|err| conversion_error(index, err))
}

fn match_from_row(row: &Row) -> rusqlite::Result<MatchRecord> {
    let details: CompatibilityDetails = json_column(row, 4)?;
    Ok(MatchRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        matched_user_id: row.get(2)?,
        compatibility_score: row.get(3)?,
        compatibility_details: details,
        status: parse_column(row, 5)?,
        user_action: parse_optional_column(row, 6)?,
        matched_user_action: parse_optional_column(row, 7)?,
        created: system_time_from_secs(row.get(8)?),
        updated: system_time_from_secs(row.get(9)?),
        version: row.get(10)?,
    })
}

fn user_from_row(row: &Row) -> rusqlite::Result<UserAccount> {
    Ok(UserAccount {
        id: row.get(0)?,
        handle: row.get(1)?,
        display_name: row.get(2)?,
        avatar_url: row.get(3)?,
        bio: row.get(4)?,
        spotify_id: row.get(5)?,
        created: system_time_from_secs(row.get(6)?),
        last_profile_sync: row
            .get::<usize, Option<i64>>(7)?
            .map(system_time_from_secs),
    })
}

fn message_from_row(row: &Row) -> rusqlite::Result<Message> {
    let raw_id: String = row.get(0)?;
    Ok(Message {
        id: Uuid::parse_str(&raw_id).map_err(|err| conversion_error(0, err))?,
        sender_id: row.get(1)?,
        content: row.get(2)?,
        created: system_time_from_millis(row.get(3)?),
        read: row.get::<usize, i64>(4)? != 0,
    })
}

fn query_match(
    conn: &Connection,
    user_id: usize,
    matched_user_id: usize,
) -> rusqlite::Result<Option<MatchRecord>> {
    conn.query_row(
        &format!(
            "SELECT {} FROM user_match WHERE user_id = ?1 AND matched_user_id = ?2",
            MATCH_COLUMNS
        ),
        params![user_id, matched_user_id],
        match_from_row,
    )
    .optional()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

/// Sets `status = matched` on the record if it was not modified since it was read.
fn promote_record(conn: &Connection, record: &MatchRecord) -> Result<(), MatchWriteError> {
    let updated = conn.execute(
        &format!(
            "UPDATE user_match SET status = ?1, version = version + 1, updated = {} \
             WHERE id = ?2 AND version = ?3",
            DEFAULT_TIMESTAMP
        ),
        params![MatchStatus::Matched.as_str(), record.id, record.version],
    )?;
    if updated == 0 {
        return Err(MatchWriteError::Conflict);
    }
    Ok(())
}

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let conn = if db_path.as_ref().exists() {
            Connection::open_with_flags(
                &db_path,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                    | rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?
        } else {
            let conn = Connection::open(&db_path)?;
            VERSIONED_SCHEMAS
                .last()
                .context("No schema defined")?
                .create(&conn)?;
            info!(
                "Created new database at {}",
                db_path.as_ref().to_string_lossy()
            );
            conn
        };
        conn.execute("PRAGMA foreign_keys = ON;", [])?;

        let db_version = conn
            .query_row("PRAGMA user_version;", [], |row| row.get::<usize, i64>(0))
            .context("Failed to read database version")?
            - BASE_DB_VERSION as i64;

        if db_version < 0 {
            bail!(
                "Database version {} is too old, does not contain base db version {}",
                db_version,
                BASE_DB_VERSION
            );
        }
        let version = db_version as usize;

        if version >= VERSIONED_SCHEMAS.len() {
            bail!("Database version {} is too new", version);
        }
        VERSIONED_SCHEMAS
            .get(version)
            .context("Failed to get schema")?
            .validate(&conn)?;

        Self::migrate_if_needed(&conn, version)?;

        Ok(SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate_if_needed(conn: &Connection, version: usize) -> Result<()> {
        let mut latest_from = version;
        for schema in VERSIONED_SCHEMAS.iter().skip(version + 1) {
            if let Some(migration_fn) = schema.migration {
                info!(
                    "Migrating db from version {} to {}",
                    latest_from, schema.version
                );
                migration_fn(conn)?;
                latest_from = schema.version;
            }
        }
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + latest_from),
            [],
        )?;
        Ok(())
    }
}

impl AuthTokenStore for SqliteStore {
    fn get_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let conn = self.conn.lock().unwrap();
        let token = conn
            .query_row(
                "SELECT user_id, value, created, last_used FROM auth_token WHERE value = ?1",
                params![value.0],
                |row| {
                    Ok(AuthToken {
                        user_id: row.get(0)?,
                        value: AuthTokenValue(row.get(1)?),
                        created: system_time_from_secs(row.get(2)?),
                        last_used: row
                            .get::<usize, Option<i64>>(3)?
                            .map(system_time_from_secs),
                    })
                },
            )
            .optional()?;
        Ok(token)
    }

    fn add_auth_token(&self, token: &AuthToken) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO auth_token (value, user_id) VALUES (?1, ?2)",
            params![token.value.0, token.user_id],
        )
        .with_context(|| format!("Failed to add auth token for user {}", token.user_id))?;
        Ok(())
    }

    fn delete_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let Some(token) = self.get_auth_token(value)? else {
            return Ok(None);
        };
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM auth_token WHERE value = ?1", params![value.0])?;
        Ok(Some(token))
    }

    fn touch_auth_token(&self, value: &AuthTokenValue) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "UPDATE auth_token SET last_used = {} WHERE value = ?1",
                DEFAULT_TIMESTAMP
            ),
            params![value.0],
        )?;
        Ok(())
    }
}

impl UserStore for SqliteStore {
    fn create_user(&self, new_user: &NewUser) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let display_name = new_user
            .display_name
            .as_deref()
            .unwrap_or(new_user.handle.as_str());
        let inserted = conn.execute(
            "INSERT INTO user (handle, display_name, avatar_url, bio) VALUES (?1, ?2, ?3, ?4)",
            params![
                new_user.handle,
                display_name,
                new_user.avatar_url,
                new_user.bio
            ],
        );
        match inserted {
            Ok(_) => Ok(conn.last_insert_rowid() as usize),
            Err(err) if is_unique_violation(&err) => {
                Err(HandleTakenError(new_user.handle.clone()).into())
            }
            Err(err) => {
                Err(err).with_context(|| format!("Failed to create user {}", new_user.handle))
            }
        }
    }

    fn get_user(&self, user_id: usize) -> Result<Option<UserAccount>> {
        let conn = self.conn.lock().unwrap();
        let user = conn
            .query_row(
                &format!("SELECT {} FROM user WHERE id = ?1", USER_COLUMNS),
                params![user_id],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    fn get_user_id(&self, handle: &str) -> Result<Option<usize>> {
        let conn = self.conn.lock().unwrap();
        let id = conn
            .query_row(
                "SELECT id FROM user WHERE handle = ?1",
                params![handle],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn update_source_account(
        &self,
        user_id: usize,
        spotify_id: &str,
        display_name: &str,
        avatar_url: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE user SET spotify_id = ?1, display_name = ?2, \
             avatar_url = COALESCE(?3, avatar_url) WHERE id = ?4",
            params![spotify_id, display_name, avatar_url, user_id],
        )?;
        if updated == 0 {
            bail!("User {} not found", user_id);
        }
        Ok(())
    }
}

impl ListeningProfileStore for SqliteStore {
    fn save_listening_profile(&self, user_id: usize, profile: &ListeningProfile) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let features = &profile.audio_features;
        tx.execute(
            &format!(
                "INSERT OR REPLACE INTO listening_profile (user_id, top_artists, top_genres, \
                 top_tracks, playlists, danceability, energy, valence, acousticness, \
                 instrumentalness, updated) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, {})",
                DEFAULT_TIMESTAMP
            ),
            params![
                user_id,
                serde_json::to_string(&profile.top_artists)?,
                serde_json::to_string(&profile.top_genres)?,
                serde_json::to_string(&profile.top_tracks)?,
                serde_json::to_string(&profile.playlists)?,
                features.danceability,
                features.energy,
                features.valence,
                features.acousticness,
                features.instrumentalness,
            ],
        )
        .with_context(|| format!("Failed to save listening profile of user {}", user_id))?;
        tx.execute(
            &format!(
                "UPDATE user SET last_profile_sync = {} WHERE id = ?1",
                DEFAULT_TIMESTAMP
            ),
            params![user_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn get_listening_profile(&self, user_id: usize) -> Result<Option<ListeningProfile>> {
        let conn = self.conn.lock().unwrap();
        let profile = conn
            .query_row(
                "SELECT top_artists, top_genres, top_tracks, playlists, danceability, energy, \
                 valence, acousticness, instrumentalness \
                 FROM listening_profile WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(ListeningProfile {
                        top_artists: json_column(row, 0)?,
                        top_genres: json_column(row, 1)?,
                        top_tracks: json_column(row, 2)?,
                        playlists: json_column(row, 3)?,
                        audio_features: AudioFeatures {
                            danceability: row.get(4)?,
                            energy: row.get(5)?,
                            valence: row.get(6)?,
                            acousticness: row.get(7)?,
                            instrumentalness: row.get(8)?,
                        },
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }
}

impl MatchStore for SqliteStore {
    fn next_candidate_id(&self, user_id: usize) -> Result<Option<usize>> {
        let conn = self.conn.lock().unwrap();
        let candidate = conn
            .query_row(
                "SELECT user_id FROM listening_profile \
                 WHERE user_id != ?1 \
                 AND user_id NOT IN (SELECT matched_user_id FROM user_match WHERE user_id = ?1) \
                 ORDER BY user_id ASC LIMIT 1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(candidate)
    }

    fn insert_match(&self, new_match: &NewMatch) -> Result<MatchRecord, MatchWriteError> {
        let conn = self.conn.lock().unwrap();
        let details = serde_json::to_string(&new_match.score.details)
            .map_err(|err| MatchWriteError::Storage(err.into()))?;

        // The reverse record may already carry a decision about us.
        let inserted = conn.execute(
            "INSERT INTO user_match (user_id, matched_user_id, compatibility_score, \
             compatibility_details, status, matched_user_action) \
             VALUES (?1, ?2, ?3, ?4, ?5, \
             (SELECT user_action FROM user_match WHERE user_id = ?2 AND matched_user_id = ?1))",
            params![
                new_match.user_id,
                new_match.matched_user_id,
                new_match.score.total,
                details,
                MatchStatus::Pending.as_str(),
            ],
        );
        if let Err(err) = inserted {
            if is_unique_violation(&err) {
                return Err(MatchWriteError::DuplicatePair {
                    user_id: new_match.user_id,
                    matched_user_id: new_match.matched_user_id,
                });
            }
            return Err(err.into());
        }

        let record = query_match(&conn, new_match.user_id, new_match.matched_user_id)?
            .context("Inserted match record not found")?;
        Ok(record)
    }

    fn get_match(&self, user_id: usize, matched_user_id: usize) -> Result<Option<MatchRecord>> {
        let conn = self.conn.lock().unwrap();
        Ok(query_match(&conn, user_id, matched_user_id)?)
    }

    fn set_user_action(
        &self,
        record: &MatchRecord,
        action: SwipeAction,
        status: MatchStatus,
    ) -> Result<MatchRecord, MatchWriteError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let updated = tx.execute(
            &format!(
                "UPDATE user_match SET user_action = ?1, status = ?2, version = version + 1, \
                 updated = {} WHERE id = ?3 AND version = ?4",
                DEFAULT_TIMESTAMP
            ),
            params![action.as_str(), status.as_str(), record.id, record.version],
        )?;
        if updated == 0 {
            debug!(
                "Match {} changed since version {}, not recording {}",
                record.id, record.version, action
            );
            return Err(MatchWriteError::Conflict);
        }

        // Mirror only, the reverse record's own decision and version are untouched.
        tx.execute(
            "UPDATE user_match SET matched_user_action = ?1 \
             WHERE user_id = ?2 AND matched_user_id = ?3",
            params![action.as_str(), record.matched_user_id, record.user_id],
        )?;

        let refreshed = query_match(&tx, record.user_id, record.matched_user_id)?
            .context("Updated match record not found")?;
        tx.commit()?;
        Ok(refreshed)
    }

    fn promote_if_mutual(
        &self,
        user_id: usize,
        matched_user_id: usize,
    ) -> Result<Resolution, MatchWriteError> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let forward = query_match(&tx, user_id, matched_user_id)?;
        let reverse = query_match(&tx, matched_user_id, user_id)?;
        let (Some(forward), Some(reverse)) = (forward, reverse) else {
            return Ok(Resolution::NotMutual);
        };

        if forward.status == MatchStatus::Matched && reverse.status == MatchStatus::Matched {
            return Ok(Resolution::AlreadyMatched);
        }
        let liked = Some(SwipeAction::Like);
        if forward.user_action != liked || reverse.user_action != liked {
            return Ok(Resolution::NotMutual);
        }

        for record in [&forward, &reverse] {
            if record.status != MatchStatus::Matched {
                // Dropping `tx` on error rolls back the other update.
                promote_record(&tx, record)?;
            }
        }
        tx.commit()?;
        Ok(Resolution::Promoted)
    }

    fn list_matches(&self, user_id: usize, status: MatchStatus) -> Result<Vec<MatchRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM user_match WHERE user_id = ?1 AND status = ?2 \
             ORDER BY updated DESC, id DESC",
            MATCH_COLUMNS
        ))?;
        let records = stmt
            .query_map(params![user_id, status.as_str()], match_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }
}

impl MessageStore for SqliteStore {
    fn insert_message(&self, pair: PairKey, message: &Message) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO message (id, pair_low, pair_high, sender_id, content, created, read) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                message.id.to_string(),
                pair.low(),
                pair.high(),
                message.sender_id,
                message.content,
                millis_from_system_time(message.created),
                message.read as i64,
            ],
        )
        .with_context(|| format!("Failed to insert message {}", message.id))?;
        Ok(())
    }

    fn mark_read(&self, pair: PairKey, reader_id: usize) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE message SET read = 1 \
             WHERE pair_low = ?1 AND pair_high = ?2 AND sender_id != ?3 AND read = 0",
            params![pair.low(), pair.high(), reader_id],
        )?;
        Ok(updated)
    }

    fn list_messages(&self, pair: PairKey) -> Result<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, sender_id, content, created, read FROM message \
             WHERE pair_low = ?1 AND pair_high = ?2 ORDER BY created ASC, rowid ASC",
        )?;
        let messages = stmt
            .query_map(params![pair.low(), pair.high()], message_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(messages)
    }
}
