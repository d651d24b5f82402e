//! Stateless HS256 credentials
//!
//! A token carries everything needed to authenticate a request: login type,
//! login id, device, an absolute expiry in milliseconds (`eff`), a random
//! nonce and optional extra data. Nothing is stored server side.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use common::{NEVER_EXPIRE, NOT_VALUE_EXPIRE};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{JwtError, JwtResult};

pub const LOGIN_TYPE: &str = "loginType";
pub const LOGIN_ID: &str = "loginId";
pub const DEVICE: &str = "device";
pub const EFF: &str = "eff";
pub const RANDOM: &str = "random";
pub const EXTRA_DATA: &str = "extraData";

const ALGORITHM: Algorithm = Algorithm::HS256;
const ALGORITHM_NAME: &str = "HS256";

/// Verified claim set of a token
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TokenClaims(Map<String, Value>);

impl TokenClaims {
    pub fn login_type(&self) -> Option<&str> {
        self.0.get(LOGIN_TYPE).and_then(Value::as_str)
    }

    pub fn login_id(&self) -> Option<&str> {
        self.0.get(LOGIN_ID).and_then(Value::as_str)
    }

    pub fn device(&self) -> Option<&str> {
        self.0.get(DEVICE).and_then(Value::as_str)
    }

    /// Absolute expiry in milliseconds, or a value at or below [`NEVER_EXPIRE`]
    pub fn eff(&self) -> Option<i64> {
        let eff = self.0.get(EFF)?;
        eff.as_i64().or_else(|| eff.as_f64().map(|f| f as i64))
    }

    pub fn random(&self) -> Option<&str> {
        self.0.get(RANDOM).and_then(Value::as_str)
    }

    pub fn extra_data(&self) -> Option<&Value> {
        self.0.get(EXTRA_DATA)
    }

    pub fn get_claim(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// 32 hex characters from 16 bytes of OS randomness
fn random_nonce() -> JwtResult<String> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| JwtError::Nonce(e.to_string()))?;
    Ok(bytes.iter().map(|b| format!("{:02x}", b)).collect())
}

/// Sign a new token
///
/// A timeout above [`NEVER_EXPIRE`] expires `timeout` seconds from now; at
/// or below it the token never expires. A timeout whose expiry does not fit
/// in milliseconds fails with [`JwtError::InvalidTimeout`].
pub fn create_token(
    login_type: &str,
    login_id: &str,
    device: &str,
    timeout: i64,
    extra_data: Option<&Map<String, Value>>,
    secret_key: &str,
) -> JwtResult<String> {
    if secret_key.is_empty() {
        return Err(JwtError::MissingSecret);
    }

    let eff = if timeout > NEVER_EXPIRE {
        timeout
            .checked_mul(1000)
            .and_then(|ms| now_millis().checked_add(ms))
            .ok_or(JwtError::InvalidTimeout(timeout))?
    } else {
        timeout
    };

    let mut claims = Map::new();
    claims.insert(LOGIN_TYPE.to_string(), Value::from(login_type));
    claims.insert(LOGIN_ID.to_string(), Value::from(login_id));
    claims.insert(DEVICE.to_string(), Value::from(device));
    claims.insert(EFF.to_string(), Value::from(eff));
    claims.insert(RANDOM.to_string(), Value::from(random_nonce()?));
    if let Some(extra_data) = extra_data {
        claims.insert(EXTRA_DATA.to_string(), Value::Object(extra_data.clone()));
    }

    let token = encode(
        &Header::new(ALGORITHM),
        &claims,
        &EncodingKey::from_secret(secret_key.as_bytes()),
    )?;
    Ok(token)
}

/// Check the secret, the algorithm and the signature
fn verify(token: &str, secret_key: &str) -> JwtResult<TokenClaims> {
    if secret_key.is_empty() {
        return Err(JwtError::MissingSecret);
    }
    if token.is_empty() {
        return Err(JwtError::EmptyToken);
    }

    let alg = header_algorithm(token)?;
    if alg != ALGORITHM_NAME {
        return Err(JwtError::AlgorithmMismatch(alg));
    }

    // Expiry lives in the custom `eff` claim
    let mut validation = Validation::new(ALGORITHM);
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = decode::<Map<String, Value>>(
        token,
        &DecodingKey::from_secret(secret_key.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::InvalidSignature => JwtError::InvalidSignature,
        ErrorKind::InvalidAlgorithm => JwtError::AlgorithmMismatch(alg.clone()),
        _ => JwtError::Malformed(e.to_string()),
    })?;
    Ok(TokenClaims(data.claims))
}

/// `alg` as written in the header, including names the signer never issues
fn header_algorithm(token: &str) -> JwtResult<String> {
    let segment = token.split('.').next().unwrap_or_default();
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| JwtError::Malformed(format!("header: {}", e)))?;
    let header: Value =
        serde_json::from_slice(&bytes).map_err(|e| JwtError::Malformed(format!("header: {}", e)))?;
    header
        .get("alg")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| JwtError::Malformed("header has no alg".to_string()))
}

fn check_login_type(claims: &TokenClaims, login_type: &str) -> JwtResult<()> {
    match claims.login_type() {
        Some(found) if found == login_type => Ok(()),
        found => Err(JwtError::LoginTypeMismatch {
            expected: login_type.to_string(),
            found: found.unwrap_or_default().to_string(),
        }),
    }
}

/// Verify a token and return its claims
///
/// With `check_timeout`, an elapsed `eff` fails with [`JwtError::Expired`];
/// never-expiring tokens always pass.
pub fn parse_token(
    token: &str,
    login_type: &str,
    secret_key: &str,
    check_timeout: bool,
) -> JwtResult<TokenClaims> {
    let claims = verify(token, secret_key)?;
    check_login_type(&claims, login_type)?;

    if check_timeout {
        let eff = claims.eff().ok_or(JwtError::InvalidClaim(EFF))?;
        if eff > NEVER_EXPIRE && eff < now_millis() {
            return Err(JwtError::Expired);
        }
    }
    Ok(claims)
}

pub fn get_id(token: &str, login_type: &str, secret_key: &str) -> JwtResult<String> {
    let claims = parse_token(token, login_type, secret_key, true)?;
    claims
        .login_id()
        .map(str::to_string)
        .ok_or(JwtError::InvalidClaim(LOGIN_ID))
}

/// Value stored under `key` in the extra data, `None` when absent
pub fn get_extra_data(
    token: &str,
    login_type: &str,
    secret_key: &str,
    key: &str,
) -> JwtResult<Option<Value>> {
    let claims = parse_token(token, login_type, secret_key, true)?;
    match claims.extra_data() {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(map.get(key).cloned()),
        Some(_) => Err(JwtError::InvalidClaim(EXTRA_DATA)),
    }
}

/// Remaining seconds, [`NEVER_EXPIRE`] or [`NOT_VALUE_EXPIRE`]
///
/// Elapsed tokens are not an error here.
pub fn get_timeout(token: &str, login_type: &str, secret_key: &str) -> JwtResult<i64> {
    let claims = parse_token(token, login_type, secret_key, false)?;
    let eff = claims.eff().ok_or(JwtError::InvalidClaim(EFF))?;
    Ok(remaining_seconds(eff, now_millis()))
}

fn remaining_seconds(eff: i64, now: i64) -> i64 {
    if eff <= NEVER_EXPIRE {
        NEVER_EXPIRE
    } else if eff < now {
        NOT_VALUE_EXPIRE
    } else {
        (eff - now) / 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const SECRET: &str = "test-secret";

    fn extra() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("1".to_string(), Value::from("v1"));
        map
    }

    #[test]
    fn test_create_and_parse() {
        let token = create_token("user", "1", "device", 22, Some(&extra()), SECRET).unwrap();
        let claims = parse_token(&token, "user", SECRET, true).unwrap();
        assert_eq!(claims.login_id(), Some("1"));
        assert_eq!(claims.device(), Some("device"));
        assert_eq!(claims.extra_data(), Some(&Value::Object(extra())));
        assert_eq!(claims.random().map(str::len), Some(32));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = create_token("user", "1", "device", 22, None, SECRET).unwrap();
        assert!(matches!(
            parse_token(&token, "user", "other-secret", true),
            Err(JwtError::InvalidSignature)
        ));
    }

    #[test]
    fn test_login_type_mismatch() {
        let token = create_token("user", "1", "device", 22, None, SECRET).unwrap();
        match parse_token(&token, "device", SECRET, true) {
            Err(JwtError::LoginTypeMismatch { expected, found }) => {
                assert_eq!(expected, "device");
                assert_eq!(found, "user");
            }
            other => panic!("expected login type mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_inputs() {
        assert!(matches!(
            parse_token("", "user", SECRET, true),
            Err(JwtError::EmptyToken)
        ));
        assert!(matches!(
            parse_token("a.b.c", "user", "", true),
            Err(JwtError::MissingSecret)
        ));
        assert!(matches!(
            create_token("user", "1", "d", 10, None, ""),
            Err(JwtError::MissingSecret)
        ));
        assert!(matches!(
            parse_token("garbage", "user", SECRET, true),
            Err(JwtError::Malformed(_))
        ));
    }

    #[test]
    fn test_algorithm_mismatch() {
        let mut claims = Map::new();
        claims.insert(LOGIN_TYPE.to_string(), Value::from("user"));
        claims.insert(EFF.to_string(), Value::from(NEVER_EXPIRE));
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        assert!(matches!(
            parse_token(&token, "user", SECRET, true),
            Err(JwtError::AlgorithmMismatch(_))
        ));
    }

    #[test]
    fn test_unsigned_token_is_algorithm_mismatch() {
        let signed = create_token("user", "1", "device", 60, None, SECRET).unwrap();
        let claims = signed.split('.').nth(1).unwrap();
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
        let unsigned = format!("{}.{}.", header, claims);

        match parse_token(&unsigned, "user", SECRET, true) {
            Err(JwtError::AlgorithmMismatch(alg)) => assert_eq!(alg, "none"),
            other => panic!("expected algorithm mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_header_without_alg_is_malformed() {
        let header = URL_SAFE_NO_PAD.encode(r#"{"typ":"JWT"}"#);
        assert!(matches!(
            parse_token(&format!("{}.e30.", header), "user", SECRET, true),
            Err(JwtError::Malformed(_))
        ));
    }

    #[test]
    fn test_out_of_range_timeout() {
        for timeout in [i64::MAX / 10, i64::MAX / 1000, i64::MAX] {
            match create_token("user", "1", "device", timeout, None, SECRET) {
                Err(JwtError::InvalidTimeout(t)) => assert_eq!(t, timeout),
                other => panic!("expected invalid timeout, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_never_expire() {
        let token = create_token("user", "1", "device", NEVER_EXPIRE, None, SECRET).unwrap();
        assert_eq!(get_timeout(&token, "user", SECRET).unwrap(), NEVER_EXPIRE);
        assert!(parse_token(&token, "user", SECRET, true).is_ok());
    }

    #[test]
    fn test_elapsed_token() {
        let token = create_token("user", "1", "device", 0, None, SECRET).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(get_timeout(&token, "user", SECRET).unwrap(), NOT_VALUE_EXPIRE);
        assert!(matches!(
            parse_token(&token, "user", SECRET, true),
            Err(JwtError::Expired)
        ));
        assert!(parse_token(&token, "user", SECRET, false).is_ok());
    }

    #[test]
    fn test_nonce_differs_per_token() {
        let tokens: HashSet<String> = (0..20)
            .map(|_| create_token("user", "1", "device", 60, None, SECRET).unwrap())
            .collect();
        assert_eq!(tokens.len(), 20);
    }

    #[test]
    fn test_extra_data_lookup() {
        let token = create_token("user", "1", "device", 60, Some(&extra()), SECRET).unwrap();
        assert_eq!(
            get_extra_data(&token, "user", SECRET, "1").unwrap(),
            Some(Value::from("v1"))
        );
        assert_eq!(get_extra_data(&token, "user", SECRET, "2").unwrap(), None);

        let bare = create_token("user", "1", "device", 60, None, SECRET).unwrap();
        assert_eq!(get_extra_data(&bare, "user", SECRET, "1").unwrap(), None);
    }

    #[test]
    fn test_remaining_seconds() {
        assert_eq!(remaining_seconds(-1, 1_000), NEVER_EXPIRE);
        assert_eq!(remaining_seconds(-5, 1_000), NEVER_EXPIRE);
        assert_eq!(remaining_seconds(999, 1_000), NOT_VALUE_EXPIRE);
        assert_eq!(remaining_seconds(23_999, 2_000), 21);
    }
}
