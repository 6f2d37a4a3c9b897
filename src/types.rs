use crate::ProviderKind;

/// Text produced by one successful relay call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub provider: ProviderKind,
    pub model: String,
}
