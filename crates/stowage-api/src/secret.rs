use rand::Rng;

/// Length of generated token secrets and of the fallback signing secret.
pub const SECRET_LEN: usize = 40;

const ALPHANUMERIC: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Random lowercase-alphanumeric secret from the thread-local CSPRNG.
pub fn generate_secret(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| ALPHANUMERIC[rng.random_range(0..ALPHANUMERIC.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_have_requested_length_and_charset() {
        let secret = generate_secret(SECRET_LEN);
        assert_eq!(secret.len(), SECRET_LEN);
        assert!(
            secret
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        );
    }

    #[test]
    fn secrets_are_not_repeated() {
        // Not a randomness test, just a guard against a constant output.
        let a = generate_secret(SECRET_LEN);
        let b = generate_secret(SECRET_LEN);
        assert_ne!(a, b);
    }
}
