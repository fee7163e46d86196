//! Ed25519 key material for token signing: seeds, PKCS#8 and SPKI encodings.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::{
    rand::{SecureRandom, SystemRandom},
    signature::{Ed25519KeyPair, KeyPair},
};

pub const SEED_LEN: usize = 32;

// PKCS#8 v1 PrivateKeyInfo for id-Ed25519 (1.3.101.112), followed by the seed.
const PKCS8_PREFIX: [u8; 16] = [
    0x30, 0x2e, 0x02, 0x01, 0x00, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x04, 0x22, 0x04, 0x20,
];
// SubjectPublicKeyInfo for id-Ed25519, followed by the public key.
const SPKI_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

pub fn generate_seed() -> anyhow::Result<[u8; SEED_LEN]> {
    let mut seed = [0u8; SEED_LEN];
    SystemRandom::new()
        .fill(&mut seed)
        .map_err(|_| anyhow::anyhow!("system random source unavailable"))?;
    Ok(seed)
}

pub fn decode_seed(hex_seed: &str) -> anyhow::Result<[u8; SEED_LEN]> {
    let bytes = hex::decode(hex_seed.trim())?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow::anyhow!("seed must be {} bytes, got {}", SEED_LEN, b.len()))
}

pub fn ed25519_pkcs8_der(seed: &[u8; SEED_LEN]) -> Vec<u8> {
    let mut der = Vec::with_capacity(PKCS8_PREFIX.len() + SEED_LEN);
    der.extend_from_slice(&PKCS8_PREFIX);
    der.extend_from_slice(seed);
    der
}

pub fn ed25519_public_key(seed: &[u8; SEED_LEN]) -> anyhow::Result<Vec<u8>> {
    let pair = Ed25519KeyPair::from_seed_unchecked(seed)
        .map_err(|e| anyhow::anyhow!("invalid ed25519 seed: {}", e))?;
    Ok(pair.public_key().as_ref().to_vec())
}

pub fn ed25519_spki_der(public_key: &[u8]) -> Vec<u8> {
    let mut der = Vec::with_capacity(SPKI_PREFIX.len() + public_key.len());
    der.extend_from_slice(&SPKI_PREFIX);
    der.extend_from_slice(public_key);
    der
}

pub fn pem_encode(label: &str, der: &[u8]) -> String {
    let body = STANDARD.encode(der);
    let mut pem = format!("-----BEGIN {}-----\n", label);
    for line in body.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str(&format!("-----END {}-----\n", label));
    pem
}

/// Returns `(private_pem, public_pem)` for the given seed.
pub fn ed25519_pem_pair(seed: &[u8; SEED_LEN]) -> anyhow::Result<(String, String)> {
    let private = pem_encode("PRIVATE KEY", &ed25519_pkcs8_der(seed));
    let public = pem_encode("PUBLIC KEY", &ed25519_spki_der(&ed25519_public_key(seed)?));
    Ok((private, public))
}
