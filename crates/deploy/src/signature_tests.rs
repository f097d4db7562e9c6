use proptest::prelude::*;

use super::*;

const FOX: &[u8] = b"The quick brown fox jumps over the lazy dog";

#[test]
fn known_sha1_vector_verifies() {
    assert!(verify(
        "sha1=de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d9",
        FOX,
        "key"
    ));
}

#[test]
fn known_sha256_vector_verifies() {
    assert!(verify(
        "sha256=f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8",
        FOX,
        "key"
    ));
}

#[test]
fn github_documented_example_verifies() {
    assert!(verify(
        "sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17",
        b"Hello, World!",
        "It's a Secret to Everybody",
    ));
}

#[test]
fn sign_produces_header_format() {
    let header = sign(SignatureAlgorithm::Sha1, FOX, "key").unwrap();
    assert_eq!(header, "sha1=de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d9");
}

#[test]
fn wrong_secret_fails() {
    let header = sign(SignatureAlgorithm::Sha1, FOX, "key").unwrap();
    assert!(!verify(&header, FOX, "other key"));
}

#[test]
fn uppercase_digest_is_not_accepted() {
    assert!(!verify(
        "sha1=DE7C9B85B8B78AA6BC8A7A36F70A90701C9DB4D9",
        FOX,
        "key"
    ));
}

#[test]
fn malformed_headers_are_invalid() {
    assert!(!verify("", FOX, "key"));
    assert!(!verify("de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d9", FOX, "key"));
    assert!(!verify("sha1", FOX, "key"));
    assert!(!verify("sha1=", FOX, "key"));
    assert!(!verify("md4=de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d9", FOX, "key"));
    assert!(!verify("SHA1=de7c9b85b8b78aa6bc8a7a36f70a90701c9db4d9", FOX, "key"));
}

#[test]
fn latin1_secrets_are_supported_and_wider_ones_rejected() {
    let header = sign(SignatureAlgorithm::Sha256, FOX, "clé").unwrap();
    assert!(verify(&header, FOX, "clé"));
    assert!(sign(SignatureAlgorithm::Sha256, FOX, "鍵").is_none());
    assert!(!verify(&header, FOX, "鍵"));
}

#[test]
fn algorithm_names_round_trip() {
    for algorithm in [
        SignatureAlgorithm::Sha1,
        SignatureAlgorithm::Sha224,
        SignatureAlgorithm::Sha256,
        SignatureAlgorithm::Sha384,
        SignatureAlgorithm::Sha512,
    ] {
        assert_eq!(SignatureAlgorithm::from_name(algorithm.name()), Some(algorithm));
    }
    assert_eq!(SignatureAlgorithm::from_name("md5"), None);
}

fn algorithm() -> impl Strategy<Value = SignatureAlgorithm> {
    prop_oneof![
        Just(SignatureAlgorithm::Sha1),
        Just(SignatureAlgorithm::Sha256),
        Just(SignatureAlgorithm::Sha512),
    ]
}

proptest! {
    #[test]
    fn signed_bodies_verify(
        algorithm in algorithm(),
        body in proptest::collection::vec(any::<u8>(), 0..512),
        secret in "[ -~]{0,40}",
    ) {
        let header = sign(algorithm, &body, &secret).unwrap();
        prop_assert!(verify(&header, &body, &secret));
    }

    #[test]
    fn altered_bodies_do_not_verify(
        algorithm in algorithm(),
        body in proptest::collection::vec(any::<u8>(), 0..512),
        other in proptest::collection::vec(any::<u8>(), 0..512),
        secret in "[ -~]{1,40}",
    ) {
        prop_assume!(body != other);
        let header = sign(algorithm, &body, &secret).unwrap();
        prop_assert!(!verify(&header, &other, &secret));
    }

    #[test]
    fn arbitrary_headers_never_panic(header in ".{0,80}", body in proptest::collection::vec(any::<u8>(), 0..64)) {
        let _ = verify(&header, &body, "secret");
    }
}
