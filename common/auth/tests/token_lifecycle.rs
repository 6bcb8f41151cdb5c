use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use common_auth::{
    AuthError, AuthenticatedUser, AuthnNotes, CredentialProvider, EffectiveConfig, ProviderChain, ScopedConfig,
    SignatureAlgorithm, TokenIssuer, TokenRejection, TokenVerifier, Verdict,
};

const NOW: i64 = 1_700_000_000;
const SECRET: &[u8] = b"0123456789abcdef0123456789abcdef";

fn scopes() -> (ScopedConfig, ScopedConfig) {
    let mut server = ScopedConfig::server();
    server
        .set_signature_algorithm(SignatureAlgorithm::Hs256)
        .set_signature_secret(SECRET);
    (server, ScopedConfig::directory())
}

fn effective(directory: impl FnOnce(&mut ScopedConfig)) -> EffectiveConfig {
    let (server, mut dir) = scopes();
    directory(&mut dir);
    EffectiveConfig::from_scopes(&server, &dir)
}

fn rejection(result: Result<AuthenticatedUser, AuthError>) -> TokenRejection {
    match result {
        Err(AuthError::Token(rejection)) => rejection,
        other => panic!("expected a token rejection, got {other:?}"),
    }
}

#[test]
fn issued_token_round_trips() {
    let config = effective(|dir| {
        dir.set_issuer("x").set_exp_delay(60).set_nbf_delay(0);
    });

    let token = TokenIssuer::new()
        .issue_at("alice", &config, NOW)
        .expect("issued");
    let identity = TokenVerifier::new()
        .verify_at(&token, &config, NOW)
        .expect("verified");

    assert_eq!(identity.user, "alice");
    assert_eq!(identity.claims.issuer.as_deref(), Some("x"));
    assert_eq!(identity.claims.expires_at, Some(NOW + 60));

    let again = TokenVerifier::new()
        .verify_at(&token, &config, NOW)
        .expect("verified twice");
    assert_eq!(again, identity);
}

fn keyed(algorithm: SignatureAlgorithm, secret_len: usize) -> EffectiveConfig {
    let mut server = ScopedConfig::server();
    server
        .set_signature_algorithm(algorithm)
        .set_signature_secret(vec![b'k'; secret_len]);
    EffectiveConfig::from_scopes(&server, &ScopedConfig::directory())
}

#[test]
fn every_hmac_algorithm_round_trips_with_its_own_key_length() {
    let table = [
        (SignatureAlgorithm::Hs256, 32, "HS256"),
        (SignatureAlgorithm::Hs384, 48, "HS384"),
        (SignatureAlgorithm::Hs512, 64, "HS512"),
    ];

    for (algorithm, secret_len, tag) in table {
        let config = keyed(algorithm, secret_len);
        let token = TokenIssuer::new()
            .issue_at("alice", &config, NOW)
            .expect("issued");

        let header = token.split('.').next().expect("header segment");
        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header).expect("base64 header"))
                .expect("json header");
        assert_eq!(header["alg"], tag);

        let identity = TokenVerifier::new()
            .verify_at(&token, &config, NOW)
            .expect("verified");
        assert_eq!(identity.user, "alice", "{tag}");
    }
}

#[test]
fn hs384_refuses_a_32_byte_secret_on_both_paths() {
    let short = keyed(SignatureAlgorithm::Hs384, 32);
    let expect_length_error = |err: AuthError| match &err {
        AuthError::KeyLength {
            algorithm,
            expected,
            actual,
        } => {
            assert_eq!(*algorithm, SignatureAlgorithm::Hs384);
            assert_eq!(*expected, 48);
            assert_eq!(*actual, 32);
            assert_eq!(
                err.to_string(),
                "the secret length must be 48 with HS384 (current length is 32)"
            );
        }
        other => panic!("expected a key length error, got {other:?}"),
    };

    expect_length_error(TokenIssuer::new().issue_at("alice", &short, NOW).unwrap_err());

    let token = TokenIssuer::new()
        .issue_at("alice", &keyed(SignatureAlgorithm::Hs384, 48), NOW)
        .expect("issued");
    expect_length_error(TokenVerifier::new().verify_at(&token, &short, NOW).unwrap_err());
}

#[test]
fn expiry_boundary_honours_leeway() {
    let issuing = effective(|dir| {
        dir.set_exp_delay(60);
    });
    let token = TokenIssuer::new()
        .issue_at("alice", &issuing, NOW - 61)
        .expect("issued");

    let strict = effective(|dir| {
        dir.set_leeway(0);
    });
    assert_eq!(
        rejection(TokenVerifier::new().verify_at(&token, &strict, NOW)),
        TokenRejection::Expired
    );

    let lenient = effective(|dir| {
        dir.set_leeway(2);
    });
    assert!(TokenVerifier::new().verify_at(&token, &lenient, NOW).is_ok());
}

#[test]
fn not_before_boundary_honours_leeway() {
    let token = TokenIssuer::new()
        .issue_at("alice", &effective(|_| {}), NOW + 10)
        .expect("issued");

    let strict = effective(|_| {});
    assert_eq!(
        rejection(TokenVerifier::new().verify_at(&token, &strict, NOW)),
        TokenRejection::NotYetValid
    );

    let lenient = effective(|dir| {
        dir.set_leeway(15);
    });
    assert!(TokenVerifier::new().verify_at(&token, &lenient, NOW).is_ok());
}

#[test]
fn none_algorithm_is_always_rejected() {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        format!(r#"{{"user":"mallory","iat":"{NOW}","exp":"{}"}}"#, NOW + 60).as_bytes(),
    );
    let config = effective(|_| {});

    for token in [
        format!("{header}.{payload}."),
        format!("{header}.{payload}.c2lnbmF0dXJl"),
    ] {
        let rejected = rejection(TokenVerifier::new().verify_at(&token, &config, NOW));
        assert_eq!(rejected, TokenRejection::NoneAlgorithm);
        assert_eq!(rejected.description(), "Token is malformed");
    }
}

#[test]
fn issuer_mismatch_rejects_but_absence_does_not() {
    let token_b = TokenIssuer::new()
        .issue_at("alice", &effective(|dir| {
            dir.set_issuer("B");
        }), NOW)
        .expect("issued");
    let token_without_iss = TokenIssuer::new()
        .issue_at("alice", &effective(|_| {}), NOW)
        .expect("issued");

    let expects_a = effective(|dir| {
        dir.set_issuer("A");
    });
    assert_eq!(
        rejection(TokenVerifier::new().verify_at(&token_b, &expects_a, NOW)),
        TokenRejection::IssuerMismatch
    );
    assert!(TokenVerifier::new()
        .verify_at(&token_without_iss, &expects_a, NOW)
        .is_ok());
}

#[test]
fn token_without_expiration_fails_verification() {
    let token = TokenIssuer::new()
        .issue_at("alice", &effective(|dir| {
            dir.set_exp_delay(-1);
        }), NOW)
        .expect("issued");

    assert_eq!(
        rejection(TokenVerifier::new().verify_at(&token, &effective(|_| {}), NOW)),
        TokenRejection::ExpirationMissing
    );
}

#[test]
fn server_scope_fills_unset_directory_values() {
    let (mut server, mut dir) = scopes();
    server.set_audience("svc").set_exp_delay(10);
    dir.set_audience("loc");

    let config = EffectiveConfig::from_scopes(&server, &dir);
    assert_eq!(config.audience.as_deref(), Some("loc"));
    assert_eq!(config.exp_delay, Some(10));
    assert_eq!(config.signature_algorithm, Some(SignatureAlgorithm::Hs256));
}

struct Fixed(&'static str, Verdict);

#[async_trait]
impl CredentialProvider for Fixed {
    fn name(&self) -> &str {
        self.0
    }

    async fn check_password(&self, _user: &str, _password: &str) -> Verdict {
        self.1
    }
}

#[tokio::test]
async fn login_falls_back_to_the_next_provider() {
    let chain = ProviderChain::new(vec![
        Arc::new(Fixed("p1", Verdict::UserNotFound)) as Arc<dyn CredentialProvider>,
        Arc::new(Fixed("p2", Verdict::Granted)),
    ]);
    let mut notes = AuthnNotes::new();
    chain
        .authenticate("alice", "pw", &mut notes)
        .await
        .expect("second provider grants");

    let config = effective(|_| {});
    let token = TokenIssuer::new().issue("alice", &config).expect("issued");
    let identity = TokenVerifier::new().verify(&token, &config).expect("verified");
    assert_eq!(identity.user, "alice");
}

#[tokio::test]
async fn denial_stops_the_chain() {
    let chain = ProviderChain::new(vec![
        Arc::new(Fixed("p1", Verdict::Denied)) as Arc<dyn CredentialProvider>,
        Arc::new(Fixed("p2", Verdict::Granted)),
    ]);
    let mut notes = AuthnNotes::new();
    let err = chain
        .authenticate("alice", "pw", &mut notes)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::Denied));
    assert_eq!(err.status(), axum::http::StatusCode::UNAUTHORIZED);
}
