//! Error types for connection lookups.

use std::sync::Arc;

use thiserror::Error;

use crate::container::ProvisionError;
use crate::database::DatabaseError;

/// Errors a lookup strategy can raise instead of answering.
///
/// "No answer" is not an error: strategies return `Ok(None)` for queries
/// they do not handle.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The database server for the application could not be provisioned.
    #[error("Failed to provision database server for '{identity}': {source}")]
    Provision {
        /// Application identity.
        identity: String,
        /// Shared with every caller that waited on the same attempt.
        #[source]
        source: Arc<ProvisionError>,
    },

    /// Creating the database on the server failed.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// A strategy failed for its own reasons.
    #[error("Lookup '{lookup}' failed: {reason}")]
    Failed {
        /// Strategy name.
        lookup: String,
        /// Reason for failure.
        reason: String,
    },
}
