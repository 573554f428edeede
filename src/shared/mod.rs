// Shared kernel used by every bounded context under `modules`

pub mod application; // Shared application layer patterns
pub mod errors; // Shared error types
pub mod infrastructure; // Shared infrastructure (database)
pub mod utils; // Logging
pub mod validation; // Rule chains for incoming records

pub use infrastructure::database::Database;
