use super::*;

#[test]
fn name_defaults_when_owner_missing_or_blank() {
    assert_eq!(launch_name(None), DEFAULT_LAUNCH_NAME);
    assert_eq!(launch_name(Some("   ")), DEFAULT_LAUNCH_NAME);
}

#[test]
fn name_is_trimmed_and_capped() {
    assert_eq!(launch_name(Some("  Amy ")), "Amy");
    let long = "n".repeat(40);
    assert_eq!(launch_name(Some(&long)).chars().count(), MAX_LAUNCH_NAME);
}

#[test]
fn request_describes_the_placement() {
    let request = LaunchRequest::for_placement(1, 5, 7, Some("Amy"), "AAAA".into());
    assert_eq!(request.symbol, "SOLPLACE");
    assert_eq!(request.description, "Pixel at (5,7) on board 1");
    assert_eq!(request.image_type, "image/png");
}

#[test]
fn request_serializes_with_camel_case_fields() {
    let request = LaunchRequest::for_placement(2, 0, 1, None, "AAAA".into());
    let value = serde_json::to_value(&request).expect("json");
    assert_eq!(value["imageBase64"], "AAAA");
    assert_eq!(value["imageType"], "image/png");
    assert_eq!(value["boardId"], 2);
    assert_eq!(value["name"], "r/place dot");
}
