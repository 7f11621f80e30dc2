use serde::{Deserialize, Serialize};

use stockwell_core::{DomainError, UserId};

/// A guest email in canonical form: trimmed and lowercased.
///
/// One-time-use checks compare guest identities by this form, so
/// `" A@X.com "` and `"a@x.com"` are the same customer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalEmail(String);

impl CanonicalEmail {
    pub fn new(raw: &str) -> Result<Self, DomainError> {
        let canonical = raw.trim().to_lowercase();
        // Not a full RFC parse; the storefront's forms did that already.
        // This guards against data that can't possibly be an address.
        let valid = canonical
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid {
            return Err(DomainError::validation(format!("malformed email: {raw}")));
        }
        Ok(Self(canonical))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for CanonicalEmail {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who is checking out: a registered user or a guest identified by email.
///
/// Guests resolve to a (possibly freshly created) placeholder user row before
/// an order is cut; the canonical email travels with the order so usage
/// checks can still catch a returning guest under a different generated row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CheckoutIdentity {
    Registered { user_id: UserId },
    Guest { email: CanonicalEmail },
}

impl CheckoutIdentity {
    pub fn guest(raw_email: &str) -> Result<Self, DomainError> {
        Ok(Self::Guest {
            email: CanonicalEmail::new(raw_email)?,
        })
    }

    pub fn guest_email(&self) -> Option<&CanonicalEmail> {
        match self {
            CheckoutIdentity::Guest { email } => Some(email),
            CheckoutIdentity::Registered { .. } => None,
        }
    }
}
