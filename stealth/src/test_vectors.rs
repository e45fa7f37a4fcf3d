//! Stealth protocol test vectors
//!
//! Fixed inputs with expected outputs computed independently from the
//! hash/curve definitions. Any change here breaks compatibility with keys
//! already derived and payments already announced.

#[cfg(test)]
#[allow(non_snake_case)] // Crypto notation uses B, V, R, P
mod stealth_test_vectors {
    use curve25519_dalek::{edwards::CompressedEdwardsY, scalar::Scalar};
    use solana_sdk::{pubkey::Pubkey, signer::Signer};

    use crate::crypto::stealth::derive_with_ephemeral;
    use crate::crypto::{
        claim_message, compute_view_tag, destination_hash, recover_one_time_key, DeriveOptions, StealthKeyPair,
    };
    use crate::error::StealthError;

    fn hex32(s: &str) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(&hex::decode(s).unwrap());
        out
    }

    /// Signature bytes 0x01..=0x40
    fn vector_signature() -> [u8; 64] {
        let mut sig = [0u8; 64];
        for (i, b) in sig.iter_mut().enumerate() {
            *b = i as u8 + 1;
        }
        sig
    }

    const SPEND_SECRET: &str = "a7d6d428ea2506fe0dfe1bde28d18064df2ff22a1d46a76a9523869a324ecc02";
    const VIEW_SECRET: &str = "b9040446f4aa90ed31ad00a2d9ebf7537efe54247288228d5395125038888c0b";
    const SPEND_PUB: &str = "dbb5a91358f592ce79c77ea701bfc85eb391ebe5d691b10010afe23c4c6e3739";
    const VIEW_PUB: &str = "78307597e834729ac1ef9fe5cf827afa6365d92c7f42bbfba17282e450a68ea4";

    /// Ephemeral scalar r = 7
    const EPHEMERAL_PUB: &str = "b862409fb5c4c4123df2abf7462b88f041ad36dd6864ce872fd5472be363c5b1";
    const VIEW_TAG: u8 = 151;
    const STEALTH_PUB: &str = "07eb94cdc661342e922282d84127d735ce632efcae7664b8053be85a711b13ca";
    const ONE_TIME_SECRET: &str = "4fe949fa100d664bcdfd14cf165c98055eb96e9582fd20fe6dd13aac7184200e";

    /// Test Vector 1: signature → spend/view keys
    #[test]
    fn test_vector_1_key_derivation() {
        let keys = StealthKeyPair::from_signature(&vector_signature(), DeriveOptions::default()).unwrap();

        let (spend_secret, view_secret) = keys.export_secrets();
        assert_eq!(hex::encode(spend_secret), SPEND_SECRET);
        assert_eq!(hex::encode(view_secret), VIEW_SECRET);
        assert_eq!(hex::encode(keys.spend_pubkey), SPEND_PUB);
        assert_eq!(hex::encode(keys.view_pubkey), VIEW_PUB);

        // Same signature, same keys
        let again = StealthKeyPair::from_signature(&vector_signature(), DeriveOptions::default()).unwrap();
        assert_eq!(again.export_secrets(), keys.export_secrets());
    }

    /// Test Vector 2: fixed ephemeral scalar → R, view tag, P
    #[test]
    fn test_vector_2_stealth_address() {
        let B = CompressedEdwardsY(hex32(SPEND_PUB)).decompress().unwrap();
        let V = CompressedEdwardsY(hex32(VIEW_PUB)).decompress().unwrap();

        let address = derive_with_ephemeral(&Scalar::from(7u64), &B, &hex32(SPEND_PUB), &V);

        assert_eq!(hex::encode(address.ephemeral_pubkey), EPHEMERAL_PUB);
        assert_eq!(address.view_tag, VIEW_TAG);
        assert_eq!(hex::encode(address.stealth_pubkey), STEALTH_PUB);
    }

    /// Test Vector 3: recipient recovers the one-time spending scalar b + h
    #[test]
    fn test_vector_3_one_time_key() {
        let keys = StealthKeyPair::from_secrets(&hex32(SPEND_SECRET), &hex32(VIEW_SECRET));

        let one_time = recover_one_time_key(&keys, &hex32(EPHEMERAL_PUB), &hex32(STEALTH_PUB)).unwrap();
        assert_eq!(hex::encode(one_time.spending_scalar().to_bytes()), ONE_TIME_SECRET);

        let signer = one_time.create_signer().unwrap();
        assert_eq!(signer.pubkey(), Pubkey::new_from_array(hex32(STEALTH_PUB)));
    }

    /// Test Vector 4: view tag and destination hash primitives
    #[test]
    fn test_vector_4_hash_primitives() {
        assert_eq!(compute_view_tag(&[0u8; 32]), 53);

        let destination = Pubkey::new_from_array([1u8; 32]);
        assert_eq!(
            hex::encode(destination_hash(&destination)),
            "72cd6e8422c407fb6d098690f1130b7ded7ec2f7f5e1d30bd9d521f015363793"
        );

        let vault = Pubkey::new_from_array([2u8; 32]);
        let message = claim_message(&vault, &[3u8; 32]);
        assert_eq!(&message[..17], b"waveswap_claim_v1");
        assert_eq!(&message[17..49], &[2u8; 32]);
        assert_eq!(&message[49..], &[3u8; 32]);
    }

    /// Test Vector 5: signatures that cannot seed keys
    #[test]
    fn test_vector_5_rejected_signatures() {
        let zero = StealthKeyPair::from_signature(&[0u8; 64], DeriveOptions::default());
        assert!(matches!(zero, Err(StealthError::Derivation(_))));

        let short = StealthKeyPair::from_signature(&[1u8; 63], DeriveOptions::default());
        assert!(matches!(short, Err(StealthError::Derivation(_))));
    }

    /// Test Vector 6: the KEM pair is a pure function of the signature
    #[test]
    fn test_vector_6_hybrid_determinism() {
        let options = DeriveOptions { with_hybrid: true };
        let a = StealthKeyPair::from_signature(&vector_signature(), options).unwrap();
        let b = StealthKeyPair::from_signature(&vector_signature(), options).unwrap();

        let (ka, kb) = (a.hybrid().unwrap(), b.hybrid().unwrap());
        assert_eq!(ka.public_key(), kb.public_key());
        assert_eq!(ka.secret_key(), kb.secret_key());
        // Spend/view keys do not depend on whether the KEM pair was requested
        assert_eq!(hex::encode(a.spend_pubkey), SPEND_PUB);
    }
}
