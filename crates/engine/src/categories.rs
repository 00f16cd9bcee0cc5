//! Expense categories.
//!
//! The set is fixed: categories drive reporting and the advisory
//! classification, so free-form strings are not accepted.
use serde::{Deserialize, Serialize};

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Travel,
    Meals,
    OfficeSupplies,
    Software,
    Equipment,
    Marketing,
    Utilities,
    Other,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Travel => "travel",
            Self::Meals => "meals",
            Self::OfficeSupplies => "office_supplies",
            Self::Software => "software",
            Self::Equipment => "equipment",
            Self::Marketing => "marketing",
            Self::Utilities => "utilities",
            Self::Other => "other",
        }
    }

    /// All categories, in reporting order.
    pub const ALL: [Category; 8] = [
        Self::Travel,
        Self::Meals,
        Self::OfficeSupplies,
        Self::Software,
        Self::Equipment,
        Self::Marketing,
        Self::Utilities,
        Self::Other,
    ];
}

impl TryFrom<&str> for Category {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "travel" => Ok(Self::Travel),
            "meals" => Ok(Self::Meals),
            "office_supplies" => Ok(Self::OfficeSupplies),
            "software" => Ok(Self::Software),
            "equipment" => Ok(Self::Equipment),
            "marketing" => Ok(Self::Marketing),
            "utilities" => Ok(Self::Utilities),
            "other" => Ok(Self::Other),
            other => Err(EngineError::InvalidInput(format!(
                "invalid category: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_every_category() {
        for category in Category::ALL {
            assert_eq!(Category::try_from(category.as_str()).unwrap(), category);
        }
    }

    #[test]
    fn rejects_unknown_category() {
        assert!(Category::try_from("snacks").is_err());
    }
}
