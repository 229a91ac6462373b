//! redb table definitions for the object store.

use redb::TableDefinition;

/// Object bytes keyed by `{bucket}/{key}`.
pub const OBJECTS: TableDefinition<&str, &[u8]> = TableDefinition::new("objects");
