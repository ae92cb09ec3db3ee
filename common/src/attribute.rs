use serde::{Deserialize, Serialize};

/// One key/value attribute attached to a transfer, e.g. an XRP
/// `DestinationTag` or a Tezos/Hedera `Memo`.
///
/// Attributes are plain values: the original hand-rolled reference count
/// served shared ownership between a transfer and a validator, which clones
/// cover here. Attribute sets on a transfer are always replaced wholesale,
/// never patched.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TransferAttribute {
    key: String,
    value: Option<String>,
    required: bool,
}

impl TransferAttribute {
    pub fn new(
        key: impl Into<String>,
        value: Option<String>,
        required: bool,
    ) -> Self {
        Self {
            key: key.into(),
            value,
            required,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub fn set_value(&mut self, value: Option<String>) {
        self.value = value;
    }
}

/// What a wallet knows about one attribute key for a given target address.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AttributeSpec {
    pub key: &'static str,
    pub required: bool,
}

/// Why a proposed transfer attribute failed validation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum AttributeValidationError {
    #[error("A required attribute was not provided")]
    RequiredButNotProvided,
    #[error("The attribute value has the wrong type")]
    MismatchedType,
    #[error("The attribute is inconsistent with the transfer")]
    RelationshipInconsistency,
}
