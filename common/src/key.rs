use secrecy::{ExposeSecret, Secret};

/// An opaque signing key handle.
///
/// The curve math lives in the external signing collaborator; the core only
/// needs to know whether a key carries its secret half (signing and
/// sweeping require one) and to hand the bytes across that seam without
/// copying them into logs or debug output.
pub struct SigningKey {
    public: Vec<u8>,
    secret: Option<Secret<Vec<u8>>>,
}

impl SigningKey {
    pub fn new_public(public: Vec<u8>) -> Self {
        Self {
            public,
            secret: None,
        }
    }

    pub fn new_with_secret(public: Vec<u8>, secret: Vec<u8>) -> Self {
        Self {
            public,
            secret: Some(Secret::new(secret)),
        }
    }

    pub fn public_bytes(&self) -> &[u8] {
        &self.public
    }

    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Expose the secret bytes to the signing collaborator.
    pub fn expose_secret(&self) -> Option<&[u8]> {
        self.secret.as_ref().map(|s| s.expose_secret().as_slice())
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("public", &self.public.len())
            .field("has_secret", &self.has_secret())
            .finish()
    }
}
