use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Display type of a scalar field as reported by the remote store.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ScalarKind {
    Id,
    String,
    Textarea,
    Email,
    Phone,
    Url,
    Picklist,
    Multipicklist,
    Combobox,
    Reference,
    Boolean,
    Int,
    Double,
    Currency,
    Percent,
    Date,
    Datetime,
    Time,
}

impl ScalarKind {
    pub fn is_string_like(&self) -> bool {
        matches!(
            self,
            ScalarKind::Id
                | ScalarKind::String
                | ScalarKind::Textarea
                | ScalarKind::Email
                | ScalarKind::Phone
                | ScalarKind::Url
                | ScalarKind::Picklist
                | ScalarKind::Combobox
                | ScalarKind::Reference
        )
    }

    pub fn is_multi_value(&self) -> bool {
        matches!(self, ScalarKind::Multipicklist)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            ScalarKind::Int | ScalarKind::Double | ScalarKind::Currency | ScalarKind::Percent
        )
    }

    pub fn is_temporal(&self) -> bool {
        matches!(self, ScalarKind::Date | ScalarKind::Datetime | ScalarKind::Time)
    }
}
