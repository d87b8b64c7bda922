use std::{fmt::Display, str::FromStr};

use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::Error;

/// What an expense was for.
///
/// Expenses are always filed under one of this fixed set of categories.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Category {
    /// Wages and other payments to staff.
    Staff,
    /// Transport and accommodation.
    Travel,
    /// Meals and groceries.
    #[default]
    Food,
    /// Power, water, phone and internet bills.
    Utility,
}

impl Category {
    /// Every category, in the order they are offered to the user.
    pub const ALL: [Category; 4] = [
        Category::Staff,
        Category::Travel,
        Category::Food,
        Category::Utility,
    ];

    /// The name of the category as it is stored and exported.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Staff => "Staff",
            Category::Travel => "Travel",
            Category::Food => "Food",
            Category::Utility => "Utility",
        }
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidCategory(s.to_owned()))
    }
}

impl ToSql for Category {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Category {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error: Error| FromSqlError::Other(Box::new(error)))
    }
}

#[cfg(test)]
mod tests {
    use crate::Error;

    use super::Category;

    #[test]
    fn parses_names_case_insensitively() {
        assert_eq!("Food".parse::<Category>(), Ok(Category::Food));
        assert_eq!("travel".parse::<Category>(), Ok(Category::Travel));
        assert_eq!(" UTILITY ".parse::<Category>(), Ok(Category::Utility));
    }

    #[test]
    fn rejects_unknown_names() {
        assert_eq!(
            "Rent".parse::<Category>(),
            Err(Error::InvalidCategory("Rent".to_owned()))
        );
    }

    #[test]
    fn display_matches_stored_name() {
        for category in Category::ALL {
            assert_eq!(category.to_string(), category.as_str());
            assert_eq!(category.as_str().parse::<Category>(), Ok(category));
        }
    }
}
