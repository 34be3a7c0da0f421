use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Wrapper for recipient data (phones, addresses) that must not leak through
/// `tracing` output. `Debug` and `Display` print a fixed mask; serialization
/// still writes the real value because the document renderer needs it.
#[derive(Clone, PartialEq, Eq, Default, Deserialize)]
pub struct Masked<T>(pub T);

impl<T> fmt::Debug for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T> fmt::Display for Masked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "********")
    }
}

impl<T: Serialize> Serialize for Masked<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<T> Masked<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    pub fn expose(&self) -> &T {
        &self.0
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> From<T> for Masked<T> {
    fn from(value: T) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masked_hides_value_in_logs() {
        let phone = Masked::new("3001234567".to_string());
        assert_eq!(format!("{:?}", phone), "********");
        assert_eq!(format!("{}", phone), "********");
        assert_eq!(phone.expose(), "3001234567");
    }

    #[test]
    fn test_masked_serializes_real_value() {
        let phone = Masked::new("3001234567".to_string());
        let json = serde_json::to_string(&phone).unwrap();
        assert_eq!(json, "\"3001234567\"");
    }
}
