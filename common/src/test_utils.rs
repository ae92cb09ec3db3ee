//! Small helpers shared by tests across the workspace.
//! Enabled with the `test-utils` feature; never compiled into production
//! builds.

pub mod roundtrip {
    use std::fmt::Debug;

    use proptest::arbitrary::{any, Arbitrary};
    use proptest::{prop_assert_eq, proptest};
    use serde::de::DeserializeOwned;
    use serde::Serialize;

    /// Assert that `T` round-trips through its [`serde_json::Value`]
    /// representation, and that the serialized form is stable across one
    /// round-trip (semi-canonical).
    pub fn json_value_roundtrip_proptest<T>()
    where
        T: Arbitrary + PartialEq + Serialize + DeserializeOwned + Debug,
    {
        proptest!(|(value1 in any::<T>())| {
            let json1 = serde_json::to_value(&value1).unwrap();
            let value2: T = serde_json::from_value(json1.clone()).unwrap();
            let json2 = serde_json::to_value(&value2).unwrap();
            prop_assert_eq!(&value1, &value2);
            prop_assert_eq!(&json1, &json2);
        });
    }

    /// Non-proptest variant for a handful of hand-picked values.
    pub fn json_roundtrip_ok<T>(value: &T)
    where
        T: PartialEq + Serialize + DeserializeOwned + Debug,
    {
        let json = serde_json::to_value(value).unwrap();
        let back: T = serde_json::from_value(json).unwrap();
        assert_eq!(&back, value);
    }
}
