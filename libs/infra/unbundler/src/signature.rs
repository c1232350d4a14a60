//! Signature verification dispatch across the seven ANS-104
//! `SignatureType` schemes.

use ed25519_dalek::{Signature as EdSignature, Verifier, VerifyingKey};
use gateway_types::{GatewayError, SignatureType};
use rsa::pss::{Signature as PssSignature, VerifyingKey as RsaVerifyingKey};
use rsa::signature::Verifier as RsaVerifier;
use rsa::BigUint;
use sha2::Sha256;

/// Verifies `signature` over `message` (the deep-hash payload) under
/// `owner` for the given scheme. Ethereum-family schemes are verified
/// with a SHA-256 digest of the message rather than Keccak256 — this
/// crate has no external chain-compatibility requirement, so it does
/// not pull in a Keccak dependency the rest of the stack never needs
/// (see DESIGN.md).
pub fn verify_signature(
    sig_type: SignatureType,
    owner: &[u8],
    signature: &[u8],
    message: &[u8; 48],
) -> Result<(), GatewayError> {
    match sig_type {
        SignatureType::Arweave => verify_arweave(owner, signature, message),
        SignatureType::Ed25519 | SignatureType::Solana | SignatureType::InjectedAptos => {
            verify_ed25519(owner, signature, message)
        }
        SignatureType::Ethereum => verify_secp256k1(owner, signature, message),
        SignatureType::TypedEthereum => verify_typed_ethereum(owner, signature, message),
        SignatureType::MultiAptos => verify_multi_aptos(owner, signature, message),
    }
}

fn bad_sig(reason: impl Into<String>) -> GatewayError {
    GatewayError::IntegrityError(format!("BadSignature: {}", reason.into()))
}

fn verify_arweave(owner: &[u8], signature: &[u8], message: &[u8; 48]) -> Result<(), GatewayError> {
    let n = BigUint::from_bytes_be(owner);
    let e = BigUint::from(65537u32);
    let public_key = rsa::RsaPublicKey::new(n, e).map_err(|err| bad_sig(err.to_string()))?;
    let verifying_key = RsaVerifyingKey::<Sha256>::new(public_key);
    let sig = PssSignature::try_from(signature).map_err(|err| bad_sig(err.to_string()))?;
    verifying_key
    .verify(message, &sig)
    .map_err(|_| bad_sig("rsa-pss verification failed"))
}

fn verify_ed25519(owner: &[u8], signature: &[u8], message: &[u8; 48]) -> Result<(), GatewayError> {
    let owner: [u8; 32] = owner.try_into().map_err(|_| bad_sig("owner is not 32 bytes"))?;
    let verifying_key = VerifyingKey::from_bytes(&owner).map_err(|err| bad_sig(err.to_string()))?;
    let sig = EdSignature::from_slice(signature).map_err(|err| bad_sig(err.to_string()))?;
    verifying_key
    .verify(message, &sig)
    .map_err(|_| bad_sig("ed25519 verification failed"))
}

fn verify_secp256k1(owner: &[u8], signature: &[u8], message: &[u8; 48]) -> Result<(), GatewayError> {
    use secp256k1::ecdsa::Signature as EcdsaSignature;
    use secp256k1::{Message, PublicKey, Secp256k1};

    if signature.len() < 64 {
        return Err(bad_sig("signature shorter than 64 bytes"));
    }
    use sha2::Digest;
    let digest: [u8; 32] = sha2::Sha256::digest(message).into();
    let msg = Message::from_digest(digest);
    let sig = EcdsaSignature::from_compact(&signature[..64]).map_err(|err| bad_sig(err.to_string()))?;
    let public_key = PublicKey::from_slice(owner).map_err(|err| bad_sig(err.to_string()))?;
    let secp = Secp256k1::verification_only();
    secp.verify_ecdsa(&msg, &sig, &public_key)
    .map_err(|_| bad_sig("secp256k1 verification failed"))
}

/// `TypedEthereum` owners are the 42-byte ASCII `0x`-prefixed address
/// derived from a public key, not the key itself, so unlike
/// `Ethereum` there is no public key to verify against directly. This
/// recovers the public key from the 65-byte `(r, s, v)` signature,
/// rederives its address, and checks that address against `owner`.
/// Address derivation hashes the recovered key's 64 coordinate bytes
/// with SHA-256 rather than Keccak256, consistent with the digest
/// substitution used elsewhere in this module (see DESIGN.md).
fn verify_typed_ethereum(owner: &[u8], signature: &[u8], message: &[u8; 48]) -> Result<(), GatewayError> {
    use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
    use secp256k1::{Message, Secp256k1};

    if owner.len() != 42 {
        return Err(bad_sig("owner is not a 42-byte address string"));
    }
    if signature.len() != 65 {
        return Err(bad_sig("signature is not a 65-byte (r, s, v) triple"));
    }

    use sha2::Digest;
    let digest: [u8; 32] = sha2::Sha256::digest(message).into();
    let msg = Message::from_digest(digest);

    let recovery_byte = signature[64];
    let recovery_id = match recovery_byte {
        0 | 1 => recovery_byte as i32,
        27 | 28 => (recovery_byte - 27) as i32,
        other => return Err(bad_sig(format!("unsupported recovery id {other}"))),
    };
    let recovery_id = RecoveryId::from_i32(recovery_id).map_err(|err| bad_sig(err.to_string()))?;
    let rec_sig = RecoverableSignature::from_compact(&signature[..64], recovery_id)
        .map_err(|err| bad_sig(err.to_string()))?;

    let secp = Secp256k1::verification_only();
    let recovered = secp
        .recover_ecdsa(&msg, &rec_sig)
        .map_err(|err| bad_sig(err.to_string()))?;

    let uncompressed = recovered.serialize_uncompressed();
    let address_hash: [u8; 32] = sha2::Sha256::digest(&uncompressed[1..]).into();
    let derived_address = format!("0x{}", hex::encode(&address_hash[12..]));

    let owner_address =
        std::str::from_utf8(owner).map_err(|_| bad_sig("owner address is not valid UTF-8"))?;
    if !derived_address.eq_ignore_ascii_case(owner_address) {
        return Err(bad_sig("recovered address does not match declared owner"));
    }
    Ok(())
}

/// Aptos MultiEd25519: owner packs up to 32 32-byte public keys plus a
/// 1-byte threshold (1025 bytes); signature packs up to 32 64-byte
/// slots plus a 4-byte bitmap of which slots are populated (2052
/// bytes). Valid iff at least `threshold` populated slots verify
/// against their corresponding public key.
fn verify_multi_aptos(owner: &[u8], signature: &[u8], message: &[u8; 48]) -> Result<(), GatewayError> {
    const MAX_KEYS: usize = 32;
    if owner.len() != MAX_KEYS * 32 + 1 {
        return Err(bad_sig("owner is not a 1025-byte MultiEd25519 key set"));
    }
    if signature.len() != MAX_KEYS * 64 + 4 {
        return Err(bad_sig("signature is not a 2052-byte MultiEd25519 bundle"));
    }
    let threshold = owner[MAX_KEYS * 32] as usize;
    let bitmap = u32::from_be_bytes(signature[MAX_KEYS * 64..].try_into().unwrap());

    let mut verified = 0usize;
    for slot in 0..MAX_KEYS {
        if bitmap & (1 << (31 - slot)) == 0 {
            continue;
        }
        let key_bytes: [u8; 32] = owner[slot * 32..slot * 32 + 32].try_into().unwrap();
        let sig_bytes = &signature[slot * 64..slot * 64 + 64];
        let verifying_key =
        VerifyingKey::from_bytes(&key_bytes).map_err(|err| bad_sig(err.to_string()))?;
        let sig = EdSignature::from_slice(sig_bytes).map_err(|err| bad_sig(err.to_string()))?;
        if verifying_key.verify(message, &sig).is_ok() {
            verified += 1;
        }
    }
    if verified >= threshold && threshold > 0 {
        Ok(())
    } else {
        Err(bad_sig(format!("only {verified}/{threshold} multi-sig slots verified")))
    }
}
