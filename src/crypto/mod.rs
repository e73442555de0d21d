use std::fmt;

use log::debug;
use num_bigint::BigUint;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::elliptic_curve::Field;
use p256::{ProjectivePoint, Scalar};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use rayon::prelude::*;
use thiserror::Error;

use crate::config::CurveId;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("curve arithmetic out of range: {0}")]
    Range(String),
    #[error("record {record} encodes to {bits} bits, wider than the {width}-bit value slot")]
    Encoding {
        record: usize,
        bits: u64,
        width: usize,
    },
}

/// One encrypted record: the ephemeral point `C1 = k·G` and the masked value
/// `C2 = (k·Q).x XOR m`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherTuple {
    pub c1x: BigUint,
    pub c1y: BigUint,
    pub c2: BigUint,
}

impl CipherTuple {
    /// The three values in bitstream order.
    pub fn values(&self) -> [&BigUint; 3] {
        [&self.c1x, &self.c1y, &self.c2]
    }
}

/// An ephemeral EC key pair. Never persisted.
///
/// Only the public point is kept: the private scalar plays no part in
/// encryption and is dropped once `Q = d·G` is computed.
pub struct KeyPair {
    curve: CurveId,
    public: ProjectivePoint,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("curve", &self.curve)
            .field("public", &self.public.to_affine())
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Draw a private scalar uniformly from `[0, n)` using the OS CSPRNG.
    pub fn generate(curve: CurveId) -> Result<Self, CryptoError> {
        Self::generate_with_rng(curve, &mut OsRng)
    }

    pub fn generate_with_rng<R: RngCore + CryptoRng>(
        curve: CurveId,
        rng: &mut R,
    ) -> Result<Self, CryptoError> {
        match curve {
            CurveId::Secp256r1 => {
                let secret = Scalar::random(&mut *rng);
                if bool::from(secret.is_zero()) {
                    return Err(CryptoError::Range(
                        "private scalar is zero, public point would be the identity".into(),
                    ));
                }
                let public = ProjectivePoint::GENERATOR * secret;
                Ok(Self { curve, public })
            }
        }
    }

    pub fn curve(&self) -> CurveId {
        self.curve
    }

    pub fn public_point(&self) -> ProjectivePoint {
        self.public
    }

    /// Affine coordinates of the public point.
    pub fn public_coordinates(&self) -> Result<(BigUint, BigUint), CryptoError> {
        affine_coordinates(&self.public)
    }
}

/// Encrypts textual records against a fixed public point.
pub struct RecordEncryptor {
    curve: CurveId,
    public: ProjectivePoint,
    bit_width: usize,
}

impl RecordEncryptor {
    /// `bit_width` is the slot each ciphertext value occupies in the bitstream;
    /// records whose integer encoding does not fit are rejected.
    pub fn new(keys: &KeyPair, bit_width: usize) -> Self {
        Self {
            curve: keys.curve,
            public: keys.public,
            bit_width,
        }
    }

    pub fn bit_width(&self) -> usize {
        self.bit_width
    }

    pub fn curve(&self) -> CurveId {
        self.curve
    }

    /// Encrypt one record with a fresh ephemeral scalar from the OS CSPRNG.
    pub fn encrypt(&self, index: usize, record: &str) -> Result<CipherTuple, CryptoError> {
        self.encrypt_with_rng(index, record, &mut OsRng)
    }

    pub fn encrypt_with_rng<R: RngCore + CryptoRng>(
        &self,
        index: usize,
        record: &str,
        rng: &mut R,
    ) -> Result<CipherTuple, CryptoError> {
        let message = encode_record(record);
        let bits = message.bits();
        if bits > self.bit_width as u64 {
            return Err(CryptoError::Encoding {
                record: index,
                bits,
                width: self.bit_width,
            });
        }

        let k = match self.curve {
            CurveId::Secp256r1 => Scalar::random(&mut *rng),
        };
        let c1 = ProjectivePoint::GENERATOR * k;
        let shared = self.public * k;

        let (c1x, c1y) = affine_coordinates(&c1)?;
        let (shared_x, _) = affine_coordinates(&shared)?;
        let c2 = &shared_x ^ &message;

        debug!("encrypted record {} ({} message bits)", index, bits);
        Ok(CipherTuple { c1x, c1y, c2 })
    }

    /// Encrypt every record, preserving input order. The first failing record
    /// aborts the whole batch.
    pub fn encrypt_all<S: AsRef<str> + Sync>(
        &self,
        records: &[S],
    ) -> Result<Vec<CipherTuple>, CryptoError> {
        records
            .par_iter()
            .enumerate()
            .map(|(i, r)| self.encrypt(i, r.as_ref()))
            .collect()
    }
}

/// Big-endian integer value of the record's UTF-8 bytes.
pub fn encode_record(record: &str) -> BigUint {
    BigUint::from_bytes_be(record.as_bytes())
}

fn affine_coordinates(point: &ProjectivePoint) -> Result<(BigUint, BigUint), CryptoError> {
    let encoded = point.to_affine().to_encoded_point(false);
    match (encoded.x(), encoded.y()) {
        (Some(x), Some(y)) => Ok((
            BigUint::from_bytes_be(x.as_slice()),
            BigUint::from_bytes_be(y.as_slice()),
        )),
        _ => Err(CryptoError::Range(
            "point at infinity has no affine coordinates".into(),
        )),
    }
}
