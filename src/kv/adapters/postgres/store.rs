//! `PostgreSQL` implementation of the key-value port.

use super::{
    models::{KvFieldRow, NewKvFieldRow},
    schema::kv_records,
};
use crate::config::PostgresConfig;
use crate::kv::{
    domain::{FieldExpectations, FieldMap, KeyPattern},
    ports::{KeyValueStore, KeyValueStoreError, KeyValueStoreResult, expectations_hold},
};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::Error as DieselError;
use diesel::upsert::excluded;
use secrecy::ExposeSecret;

/// `PostgreSQL` connection pool type used by the key-value adapter.
pub type KvPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed key-value store.
#[derive(Debug, Clone)]
pub struct PostgresKeyValueStore {
    pool: KvPgPool,
}

impl PostgresKeyValueStore {
    /// Creates a store from an existing connection pool.
    #[must_use]
    pub const fn new(pool: KvPgPool) -> Self {
        Self { pool }
    }

    /// Builds a connection pool from `config` and wraps it.
    ///
    /// # Errors
    ///
    /// Returns [`KeyValueStoreError::Persistence`] when the configuration has
    /// no usable connection URL or the pool cannot be built.
    pub fn connect(config: &PostgresConfig) -> KeyValueStoreResult<Self> {
        let url = config
            .connection_url()
            .map_err(KeyValueStoreError::persistence)?;
        let manager = ConnectionManager::<PgConnection>::new(url.expose_secret());
        let pool = Pool::builder()
            .max_size(config.pool_max_size)
            .connection_timeout(config.connect_timeout)
            .build(manager)
            .map_err(KeyValueStoreError::persistence)?;
        Ok(Self::new(pool))
    }

    fn with_connection<T, F>(&self, f: F) -> KeyValueStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, DieselError>,
    {
        let mut connection = self.pool.get().map_err(KeyValueStoreError::persistence)?;
        f(&mut connection).map_err(KeyValueStoreError::persistence)
    }

    /// Runs `f` in a transaction holding the advisory lock for `key`.
    fn with_locked_key<T, F>(&self, key: &str, f: F) -> KeyValueStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> Result<T, DieselError>,
    {
        self.with_connection(|connection| {
            connection.transaction::<T, DieselError, _>(|tx| {
                lock_key(tx, key)?;
                f(tx)
            })
        })
    }
}

impl KeyValueStore for PostgresKeyValueStore {
    fn set_fields(&self, key: &str, fields: &FieldMap) -> KeyValueStoreResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        self.with_locked_key(key, |tx| upsert_fields(tx, key, fields).map(|_| ()))
    }

    fn get_all_fields(&self, key: &str) -> KeyValueStoreResult<FieldMap> {
        self.with_connection(|connection| load_fields(connection, key))
    }

    fn get_field(&self, key: &str, field: &str) -> KeyValueStoreResult<Option<String>> {
        self.with_connection(|connection| {
            kv_records::table
                .filter(kv_records::record_key.eq(key))
                .filter(kv_records::field.eq(field))
                .select(kv_records::value)
                .first::<String>(connection)
                .optional()
        })
    }

    fn list_keys(&self, pattern: &KeyPattern) -> KeyValueStoreResult<Vec<String>> {
        let prefix = pattern.literal_prefix();
        let keys = self.with_connection(|connection| {
            if pattern.is_exact() {
                kv_records::table
                    .filter(kv_records::record_key.eq(prefix.as_str()))
                    .select(kv_records::record_key)
                    .distinct()
                    .load::<String>(connection)
            } else {
                kv_records::table
                    .filter(kv_records::record_key.like(format!("{}%", escape_like(&prefix))))
                    .select(kv_records::record_key)
                    .distinct()
                    .load::<String>(connection)
            }
        })?;
        Ok(keys.into_iter().filter(|key| pattern.matches(key)).collect())
    }

    fn delete(&self, key: &str) -> KeyValueStoreResult<bool> {
        self.with_locked_key(key, |tx| {
            diesel::delete(kv_records::table.filter(kv_records::record_key.eq(key)))
                .execute(tx)
                .map(|removed| removed > 0)
        })
    }

    fn set_fields_if_absent(&self, key: &str, fields: &FieldMap) -> KeyValueStoreResult<bool> {
        self.with_locked_key(key, |tx| {
            if record_exists(tx, key)? {
                return Ok(false);
            }
            upsert_fields(tx, key, fields)?;
            Ok(true)
        })
    }

    fn compare_and_set_fields(
        &self,
        key: &str,
        expected: &FieldExpectations,
        updates: &FieldMap,
    ) -> KeyValueStoreResult<bool> {
        self.with_locked_key(key, |tx| {
            let current = load_fields(tx, key)?;
            if current.is_empty() || !expectations_hold(&current, expected) {
                return Ok(false);
            }
            upsert_fields(tx, key, updates)?;
            Ok(true)
        })
    }
}

/// Serializes writers of one key for the rest of the transaction.
fn lock_key(connection: &mut PgConnection, key: &str) -> Result<(), DieselError> {
    diesel::sql_query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind::<diesel::sql_types::Text, _>(key)
        .execute(connection)
        .map(|_| ())
}

fn record_exists(connection: &mut PgConnection, key: &str) -> Result<bool, DieselError> {
    diesel::select(diesel::dsl::exists(
        kv_records::table.filter(kv_records::record_key.eq(key)),
    ))
    .get_result::<bool>(connection)
}

fn load_fields(connection: &mut PgConnection, key: &str) -> Result<FieldMap, DieselError> {
    let rows = kv_records::table
        .filter(kv_records::record_key.eq(key))
        .select(KvFieldRow::as_select())
        .load::<KvFieldRow>(connection)?;
    Ok(rows.into_iter().map(|row| (row.field, row.value)).collect())
}

fn upsert_fields(
    connection: &mut PgConnection,
    key: &str,
    fields: &FieldMap,
) -> Result<usize, DieselError> {
    if fields.is_empty() {
        return Ok(0);
    }
    let rows: Vec<NewKvFieldRow<'_>> = fields
        .iter()
        .map(|(field, value)| NewKvFieldRow {
            record_key: key,
            field,
            value,
        })
        .collect();

    diesel::insert_into(kv_records::table)
        .values(&rows)
        .on_conflict((kv_records::record_key, kv_records::field))
        .do_update()
        .set(kv_records::value.eq(excluded(kv_records::value)))
        .execute(connection)
}

/// Escapes `LIKE` metacharacters using the default backslash escape.
fn escape_like(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for ch in literal.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
