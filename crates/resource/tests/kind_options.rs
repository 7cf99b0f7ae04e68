//! `KindOptions` as loaded from configuration.

#![cfg(feature = "serde")]

use warden_resource::KindOptions;

#[test]
fn missing_fields_take_defaults() {
    let options: KindOptions = serde_json::from_str(r#"{ "disposal_method": "shutdown" }"#).unwrap();
    assert_eq!(options.acquisition_method, "open");
    assert_eq!(options.disposal_method, "shutdown");

    let empty: KindOptions = serde_json::from_str("{}").unwrap();
    assert_eq!(empty, KindOptions::default());
}
