//! Key handling and signatures.
//!
//! Three schemes back the script engine and wallet surfaces:
//! - secp256k1 ECDSA (the default for `OP_CHECKSIG`), 64-byte compact
//!   signatures over a 32-byte message hash;
//! - P-256 ECDSA with the same calling convention;
//! - BIP-340 Schnorr on secp256k1, with the taproot key tweak
//!   `Q = P + H(tag || ser(P))·G` for witness-v1 style outputs.
//!
//! Public keys travel as SEC1 bytes (compressed 33 or uncompressed 65);
//! the 20-byte script payload is `hash160(compressed pubkey)`. Secret key
//! material is zeroized on drop by the underlying key types, and every raw
//! secret byte buffer handed out is wrapped in [`Zeroizing`].

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::elliptic_curve::ops::Reduce;
use k256::elliptic_curve::point::AffineCoordinates;
use k256::{ProjectivePoint, Scalar};
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::hash::{hash160, hash256, Hash256};

/// Compact ECDSA/Schnorr signature length.
pub const SIGNATURE_LEN: usize = 64;

/// Tag for the taproot key tweak hash.
const TAPROOT_TWEAK_TAG: &[u8] = b"TapTweak";

// ---------------------------------------------------------------------------
// secp256k1 ECDSA
// ---------------------------------------------------------------------------

/// A secp256k1 keypair for ECDSA signing.
pub struct Keypair {
    signing: k256::ecdsa::SigningKey,
}

impl Keypair {
    /// Generate a random keypair from the OS RNG.
    pub fn generate() -> Self {
        Self { signing: k256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng) }
    }

    /// Rebuild a keypair from 32 secret bytes.
    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let signing = k256::ecdsa::SigningKey::from_slice(bytes)
            .map_err(|_| CryptoError::InvalidSecretKey)?;
        Ok(Self { signing })
    }

    /// Raw secret bytes, zeroized when the wrapper drops.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        let mut out = Zeroizing::new([0u8; 32]);
        out.copy_from_slice(&self.signing.to_bytes());
        out
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey { verifying: *self.signing.verifying_key() }
    }

    /// Sign a 32-byte message hash, returning a 64-byte compact signature.
    pub fn sign(&self, msg_hash: &Hash256) -> [u8; SIGNATURE_LEN] {
        let sig: k256::ecdsa::Signature = self
            .signing
            .sign_prehash(msg_hash.as_bytes())
            .expect("prehash signing over a 32-byte digest cannot fail");
        sig.to_bytes().into()
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair").field("public_key", &self.public_key()).finish_non_exhaustive()
    }
}

/// A secp256k1 public key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    verifying: k256::ecdsa::VerifyingKey,
}

impl PublicKey {
    /// Parse SEC1 bytes (compressed 33 or uncompressed 65).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let verifying = k256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { verifying })
    }

    /// Compressed SEC1 serialization: the form pushed in scripts.
    pub fn to_bytes(&self) -> [u8; 33] {
        let point = self.verifying.to_encoded_point(true);
        point.as_bytes().try_into().expect("compressed SEC1 point is 33 bytes")
    }

    /// Uncompressed SEC1 serialization.
    pub fn to_uncompressed_bytes(&self) -> [u8; 65] {
        let point = self.verifying.to_encoded_point(false);
        point.as_bytes().try_into().expect("uncompressed SEC1 point is 65 bytes")
    }

    /// The 20-byte script payload: `hash160(compressed pubkey)`.
    pub fn pubkey_hash(&self) -> [u8; 20] {
        hash160(&self.to_bytes())
    }

    /// Verify a 64-byte compact signature over a 32-byte message hash.
    pub fn verify(&self, msg_hash: &Hash256, sig: &[u8]) -> Result<(), CryptoError> {
        let sig = k256::ecdsa::Signature::from_slice(sig)
            .map_err(|_| CryptoError::InvalidSignature)?;
        self.verifying
            .verify_prehash(msg_hash.as_bytes(), &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_bytes()))
    }
}

/// Verify a secp256k1 ECDSA signature from raw parts.
pub fn verify_ecdsa(
    pubkey_bytes: &[u8],
    msg_hash: &Hash256,
    sig: &[u8],
) -> Result<(), CryptoError> {
    PublicKey::from_bytes(pubkey_bytes)?.verify(msg_hash, sig)
}

// ---------------------------------------------------------------------------
// P-256 ECDSA
// ---------------------------------------------------------------------------

/// A P-256 keypair with the same calling convention as [`Keypair`].
pub struct P256Keypair {
    signing: p256::ecdsa::SigningKey,
}

impl P256Keypair {
    pub fn generate() -> Self {
        Self { signing: p256::ecdsa::SigningKey::random(&mut rand::rngs::OsRng) }
    }

    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let signing = p256::ecdsa::SigningKey::from_slice(bytes)
            .map_err(|_| CryptoError::InvalidSecretKey)?;
        Ok(Self { signing })
    }

    pub fn secret_bytes(&self) -> Zeroizing<[u8; 32]> {
        let mut out = Zeroizing::new([0u8; 32]);
        out.copy_from_slice(&self.signing.to_bytes());
        out
    }

    pub fn public_key(&self) -> P256PublicKey {
        P256PublicKey { verifying: *self.signing.verifying_key() }
    }

    pub fn sign(&self, msg_hash: &Hash256) -> [u8; SIGNATURE_LEN] {
        let sig: p256::ecdsa::Signature = self
            .signing
            .sign_prehash(msg_hash.as_bytes())
            .expect("prehash signing over a 32-byte digest cannot fail");
        sig.to_bytes().into()
    }
}

impl fmt::Debug for P256Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("P256Keypair").finish_non_exhaustive()
    }
}

/// A P-256 public key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct P256PublicKey {
    verifying: p256::ecdsa::VerifyingKey,
}

impl P256PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let verifying = p256::ecdsa::VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { verifying })
    }

    pub fn to_bytes(&self) -> [u8; 33] {
        let point = self.verifying.to_encoded_point(true);
        point.as_bytes().try_into().expect("compressed SEC1 point is 33 bytes")
    }

    pub fn verify(&self, msg_hash: &Hash256, sig: &[u8]) -> Result<(), CryptoError> {
        let sig = p256::ecdsa::Signature::from_slice(sig)
            .map_err(|_| CryptoError::InvalidSignature)?;
        self.verifying
            .verify_prehash(msg_hash.as_bytes(), &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for P256PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P256PublicKey({})", hex::encode(self.to_bytes()))
    }
}

// ---------------------------------------------------------------------------
// BIP-340 Schnorr and the taproot tweak
// ---------------------------------------------------------------------------

/// A secp256k1 keypair for BIP-340 Schnorr signing.
pub struct SchnorrKeypair {
    signing: k256::schnorr::SigningKey,
}

impl SchnorrKeypair {
    pub fn generate() -> Self {
        Self { signing: k256::schnorr::SigningKey::random(&mut rand::rngs::OsRng) }
    }

    pub fn from_secret_bytes(bytes: &[u8; 32]) -> Result<Self, CryptoError> {
        let signing = k256::schnorr::SigningKey::from_bytes(bytes)
            .map_err(|_| CryptoError::InvalidSecretKey)?;
        Ok(Self { signing })
    }

    /// The x-only public key (32 bytes).
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes().into()
    }

    /// Sign a message (BIP-340 hashes internally).
    pub fn sign(&self, msg: &[u8]) -> [u8; SIGNATURE_LEN] {
        use k256::schnorr::signature::Signer;
        let sig: k256::schnorr::Signature = self.signing.sign(msg);
        sig.to_bytes().into()
    }

    /// Derive the taproot-tweaked keypair for this key.
    pub fn taproot_tweaked(&self) -> Result<SchnorrKeypair, CryptoError> {
        // The schnorr signing key is already normalized to the even-y parity
        // of its x-only public key.
        let d: Scalar = **self.signing.as_nonzero_scalar();
        let xonly = self.public_key_bytes();
        let t = taproot_tweak_scalar(&xonly);
        let tweaked = d + t;
        let tweaked_bytes = Zeroizing::new(tweaked.to_bytes());
        let signing = k256::schnorr::SigningKey::from_bytes(tweaked_bytes.as_slice())
            .map_err(|_| CryptoError::InvalidTweak)?;
        Ok(SchnorrKeypair { signing })
    }
}

impl fmt::Debug for SchnorrKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchnorrKeypair")
            .field("public_key", &hex::encode(self.public_key_bytes()))
            .finish_non_exhaustive()
    }
}

/// Verify a BIP-340 Schnorr signature against an x-only public key.
pub fn verify_schnorr(
    xonly_pubkey: &[u8],
    msg: &[u8],
    sig: &[u8],
) -> Result<(), CryptoError> {
    use k256::schnorr::signature::Verifier;
    let key = k256::schnorr::VerifyingKey::from_bytes(xonly_pubkey)
        .map_err(|_| CryptoError::InvalidPublicKey)?;
    let sig =
        k256::schnorr::Signature::try_from(sig).map_err(|_| CryptoError::InvalidSignature)?;
    key.verify(msg, &sig).map_err(|_| CryptoError::VerificationFailed)
}

/// BIP-340 tagged hash: `SHA256(SHA256(tag) || SHA256(tag) || data)`.
fn tagged_hash(tag: &[u8], data: &[u8]) -> [u8; 32] {
    let tag_hash = Sha256::digest(tag);
    let mut hasher = Sha256::new();
    hasher.update(tag_hash);
    hasher.update(tag_hash);
    hasher.update(data);
    hasher.finalize().into()
}

/// The taproot tweak scalar `H(tag || ser(P))` reduced into the group order.
fn taproot_tweak_scalar(xonly_pubkey: &[u8; 32]) -> Scalar {
    let digest = tagged_hash(TAPROOT_TWEAK_TAG, xonly_pubkey);
    <Scalar as Reduce<k256::U256>>::reduce(k256::U256::from_be_slice(&digest))
}

/// Compute the taproot output key `x(P + H(tag || ser(P))·G)` from an
/// x-only internal key.
pub fn taproot_tweak_pubkey(xonly_pubkey: &[u8; 32]) -> Result<[u8; 32], CryptoError> {
    // lift_x: decode as the even-y point.
    let mut sec1 = [0u8; 33];
    sec1[0] = 0x02;
    sec1[1..].copy_from_slice(xonly_pubkey);
    let internal =
        k256::PublicKey::from_sec1_bytes(&sec1).map_err(|_| CryptoError::InvalidPublicKey)?;

    let t = taproot_tweak_scalar(xonly_pubkey);
    let output = ProjectivePoint::from(*internal.as_affine()) + ProjectivePoint::GENERATOR * t;
    if output == ProjectivePoint::IDENTITY {
        return Err(CryptoError::InvalidTweak);
    }
    Ok(output.to_affine().x().into())
}

/// Whether `output_key` is the taproot tweak of `internal_key`.
pub fn verify_taproot_tweak(
    internal_key: &[u8; 32],
    output_key: &[u8; 32],
) -> Result<bool, CryptoError> {
    Ok(taproot_tweak_pubkey(internal_key)? == *output_key)
}

// ---------------------------------------------------------------------------
// Addresses
// ---------------------------------------------------------------------------

/// Derive the wallet account address for a public key: the 20
/// least-significant bytes of `hash256(uncompressed pubkey)`.
pub fn derive_address(pubkey: &PublicKey) -> [u8; 20] {
    let digest = hash256(&pubkey.to_uncompressed_bytes());
    digest.as_bytes()[12..32].try_into().expect("hash has 32 bytes")
}
