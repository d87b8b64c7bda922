//! Database ID type definition.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;

/// The ID the store assigns to an expense when it is inserted.
pub type ExpenseId = DatabaseId;
