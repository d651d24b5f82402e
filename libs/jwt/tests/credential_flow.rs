//! Issue-then-verify flows over the public API

use common::NOT_VALUE_EXPIRE;
use jwt::{JwtError, create_token, get_id, get_timeout, parse_token};
use serde_json::{Map, Value};

const SECRET: &str = "flow-secret";

#[test]
fn test_login_parse_and_timeout() {
    let mut extra = Map::new();
    extra.insert("1".to_string(), Value::from("v1"));

    let token = create_token("user", "1", "device", 22, Some(&extra), SECRET).unwrap();

    let claims = parse_token(&token, "user", SECRET, true).unwrap();
    assert_eq!(claims.login_id(), Some("1"));
    assert_eq!(claims.extra_data(), Some(&Value::Object(extra)));
    assert_eq!(get_id(&token, "user", SECRET).unwrap(), "1");

    assert!(parse_token(&token, "user", "wrong-secret", true).is_err());

    let timeout = get_timeout(&token, "user", SECRET).unwrap();
    assert!((21..=22).contains(&timeout), "timeout was {}", timeout);
}

#[test]
fn test_tokens_are_scoped_by_login_type() {
    let token = create_token("user", "1", "device", 60, None, SECRET).unwrap();
    assert!(matches!(
        get_id(&token, "device", SECRET),
        Err(JwtError::LoginTypeMismatch { .. })
    ));
    assert!(matches!(
        get_timeout(&token, "device", SECRET),
        Err(JwtError::LoginTypeMismatch { .. })
    ));
}

#[test]
fn test_expired_token_reports_not_value_expire() {
    let token = create_token("user", "1", "device", 0, None, SECRET).unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    assert_eq!(get_timeout(&token, "user", SECRET).unwrap(), NOT_VALUE_EXPIRE);
    assert!(matches!(get_id(&token, "user", SECRET), Err(JwtError::Expired)));
}
