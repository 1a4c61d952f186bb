//! redb table definitions for the observation log.

use redb::TableDefinition;

/// Observation records keyed by append sequence number (starting at 1).
pub const OBSERVATIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("observations");
