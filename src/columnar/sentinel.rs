use serde::{Deserialize, Serialize};

use crate::marshal::MarshalValue;

/// Per-backend policy for cells the `UNION ALL` header trick can turn into junk blobs.
///
/// Some engines hand back a logically empty cell as a blob whose first byte is zero;
/// `ZeroLeadingBlobAsEmpty` maps those to `""`. It is applied cell by cell in `step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullSentinel {
    #[default]
    ZeroLeadingBlobAsEmpty,
    Passthrough,
}

impl NullSentinel {
    pub fn resolve(self, value: MarshalValue) -> MarshalValue {
        match self {
            NullSentinel::Passthrough => value,
            NullSentinel::ZeroLeadingBlobAsEmpty => resolve(value),
        }
    }
}

/// A blob starting with a zero byte becomes empty text; everything else is unchanged.
pub fn resolve(value: MarshalValue) -> MarshalValue {
    match value {
        MarshalValue::Bytes(b) if b.first() == Some(&0) => MarshalValue::Text(String::new()),
        other => other,
    }
}
