use chrono::{TimeZone, Utc};
use mini_wallfer::{
    models::User,
    token::{Claims, ClaimedUser, TokenCodec, TokenError},
};

const SECRET: &str = "token-test-secret";

fn sample_user() -> User {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
    User {
        id: 7,
        username: "phantom".to_string(),
        password: "$2b$04$not-a-real-hash".to_string(),
        first_name: Some("Phantom".to_string()),
        last_name: Some("Assassin".to_string()),
        age: Some(24),
        created_at: at,
        updated_at: at,
    }
}

fn far_future_claims(user: ClaimedUser) -> Claims {
    let now = Utc::now().timestamp() as usize;
    Claims {
        user,
        iat: now,
        exp: now + 3600,
    }
}

#[test]
fn test_decode_inverts_encode() {
    let codec = TokenCodec::new(SECRET, 3600);
    let claims = far_future_claims(ClaimedUser::from(&sample_user()));

    let token = codec.encode(&claims).unwrap();

    assert_eq!(codec.decode(&token).unwrap(), claims);
}

#[test]
fn test_decode_inverts_encode_with_empty_profile() {
    let codec = TokenCodec::new(SECRET, 3600);
    let mut user = sample_user();
    user.first_name = None;
    user.last_name = None;
    user.age = None;
    // Sub-second precision must survive the round trip.
    user.updated_at = Utc.timestamp_opt(1_714_566_600, 123_456_000).unwrap();
    let claims = far_future_claims(ClaimedUser::from(&user));

    let token = codec.encode(&claims).unwrap();

    assert_eq!(codec.decode(&token).unwrap(), claims);
}

#[test]
fn test_issue_embeds_projection_and_ttl() {
    let codec = TokenCodec::new(SECRET, 600);
    let user = sample_user();

    let claims = codec.decode(&codec.issue(&user).unwrap()).unwrap();

    assert!(claims.user.matches(&user));
    assert_eq!(claims.exp - claims.iat, 600);
}

#[test]
fn test_token_does_not_carry_password_hash() {
    let codec = TokenCodec::new(SECRET, 600);
    let user = sample_user();
    let token = codec.issue(&user).unwrap();

    let payload = serde_json::to_value(codec.decode(&token).unwrap()).unwrap();
    assert!(payload.get("password").is_none());
    assert_eq!(payload["sub"], 7);
    assert_eq!(payload["username"], "phantom");
}

#[test]
fn test_rotated_secret_rejects_old_tokens() {
    let token = TokenCodec::new(SECRET, 600).issue(&sample_user()).unwrap();

    let result = TokenCodec::new("rotated-secret", 600).decode(&token);

    assert!(matches!(result, Err(TokenError::InvalidToken(_))));
}

#[test]
fn test_malformed_token_is_invalid() {
    let codec = TokenCodec::new(SECRET, 600);

    for token in ["", "abc", "a.b.c", "eyJhbGciOiJIUzI1NiJ9.e30.sig"] {
        assert!(
            matches!(codec.decode(token), Err(TokenError::InvalidToken(_))),
            "{token:?} should not decode"
        );
    }
}

#[test]
fn test_claim_mismatch_on_any_field_change() {
    let user = sample_user();
    let claimed = ClaimedUser::from(&user);

    let mut renamed = user.clone();
    renamed.username = "saw".to_string();
    let mut aged = user.clone();
    aged.age = Some(25);
    let mut touched = user.clone();
    touched.updated_at = user.updated_at + chrono::Duration::microseconds(1);
    let mut other_id = user.clone();
    other_id.id = 8;

    assert!(claimed.matches(&user));
    for changed in [renamed, aged, touched, other_id] {
        assert!(!claimed.matches(&changed));
    }
}

#[test]
fn test_password_only_change_is_not_visible_without_timestamp() {
    // The projection excludes the hash; invalidation on password change relies on updated_at.
    let user = sample_user();
    let mut rehashed = user.clone();
    rehashed.password = "$2b$04$another".to_string();

    assert!(ClaimedUser::from(&user).matches(&rehashed));
}

#[test]
fn test_oversized_lifetime_is_an_error() {
    let codec = TokenCodec::new(SECRET, u64::MAX);

    let result = codec.issue(&sample_user());

    assert!(matches!(result, Err(TokenError::TtlOverflow(u64::MAX))));
}
