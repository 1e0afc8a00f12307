use rand::{
    distributions::{Distribution, Standard},
    Rng,
};
use zeroize::{Zeroize, Zeroizing};

/// Generate random bytes that are cryptographically secure
pub fn generate_random_bytes<T>() -> Zeroizing<T>
where
    Standard: Distribution<T>,
    T: Zeroize,
{
    Zeroizing::new(rand::thread_rng().gen::<T>())
}

/// Serde adapter for fixed width byte strings stored as lowercase hex.
///
/// Deserialization accepts either case but insists on exactly `2 * N` hex characters.
pub(crate) mod hex_array {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        if text.len() != N * 2 {
            return Err(D::Error::custom(format!(
                "expected {} hex characters, got {}",
                N * 2,
                text.len()
            )));
        }

        let mut out = [0u8; N];
        hex::decode_to_slice(&text, &mut out).map_err(D::Error::custom)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_bytes_differ_between_calls() {
        let a = generate_random_bytes::<[u8; 32]>();
        let b = generate_random_bytes::<[u8; 32]>();
        assert_ne!(*a, *b);
    }
}
