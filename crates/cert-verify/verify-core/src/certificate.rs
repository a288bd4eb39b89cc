//! Typed view over a certificate document.
//!
//! Certificates arrive as open JSON documents. [`Certificate::from_value`]
//! checks the fields verification depends on up front, so validators never
//! have to look up a key that may not be there. The raw document is kept
//! untouched; the signing payload is always derived from a copy.

use serde_json::{
    Map,
    Value,
};

pub const VERIFICATION: &str = "verification";
pub const TYPE: &str = "type";
pub const CREATOR: &str = "creator";
pub const EXPIRES: &str = "expires";
pub const SIGNATURE: &str = "signature";
pub const SIGNATURE_VALUE: &str = "signatureValue";

pub const HOSTED: &str = "hosted";
pub const SIGNED_BADGE: &str = "signed-badge";
/// Open Badges spelling of [`SIGNED_BADGE`].
pub const SIGNED_BADGE_ALIAS: &str = "SignedBadge";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CertificateError {
    #[error("certificate must be a JSON object")]
    NotAnObject,
    #[error("certificate is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("certificate field `{field}` must be {expected}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
    },
}

/// Strategy selected by the first entry of `verification.type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationKind {
    Hosted,
    SignedBadge,
    Unsupported(String),
}

impl VerificationKind {
    fn parse(value: &str) -> Self {
        match value {
            HOSTED => Self::Hosted,
            SIGNED_BADGE | SIGNED_BADGE_ALIAS => Self::SignedBadge,
            other => Self::Unsupported(other.to_string()),
        }
    }
}

/// Fields needed to re-verify an embedded signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureBlock {
    pub signature_value: String,
    pub creator: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Certificate {
    document: Map<String, Value>,
    kind: VerificationKind,
    expires: Option<String>,
    signature: Option<SignatureBlock>,
}

impl Certificate {
    /// Validates a raw document and builds the typed view.
    ///
    /// Signed badges must carry `signature.signatureValue` and
    /// `verification.creator`; other kinds only need `verification.type`.
    pub fn from_value(value: Value) -> Result<Self, CertificateError> {
        let Value::Object(document) = value else {
            return Err(CertificateError::NotAnObject);
        };

        let verification = match document.get(VERIFICATION) {
            Some(Value::Object(verification)) => verification,
            Some(_) => {
                return Err(CertificateError::InvalidField {
                    field: VERIFICATION,
                    expected: "an object",
                });
            }
            None => return Err(CertificateError::MissingField(VERIFICATION)),
        };

        let kind = match verification.get(TYPE) {
            Some(Value::Array(types)) => {
                match types.first() {
                    Some(Value::String(first)) => VerificationKind::parse(first),
                    _ => {
                        return Err(CertificateError::InvalidField {
                            field: "verification.type",
                            expected: "a non-empty list of strings",
                        });
                    }
                }
            }
            Some(_) => {
                return Err(CertificateError::InvalidField {
                    field: "verification.type",
                    expected: "a non-empty list of strings",
                });
            }
            None => return Err(CertificateError::MissingField("verification.type")),
        };

        let expires = match document.get(EXPIRES) {
            None | Some(Value::Null) => None,
            Some(Value::String(expires)) => Some(expires.clone()),
            Some(_) => {
                return Err(CertificateError::InvalidField {
                    field: EXPIRES,
                    expected: "a timestamp string",
                });
            }
        };

        let signature = if kind == VerificationKind::SignedBadge {
            let signature_value = document
                .get(SIGNATURE)
                .and_then(|signature| signature.get(SIGNATURE_VALUE))
                .and_then(Value::as_str)
                .ok_or(CertificateError::MissingField("signature.signatureValue"))?;
            let creator = verification
                .get(CREATOR)
                .and_then(Value::as_str)
                .ok_or(CertificateError::MissingField("verification.creator"))?;
            Some(SignatureBlock {
                signature_value: signature_value.to_string(),
                creator: creator.to_string(),
            })
        } else {
            None
        };

        Ok(Self {
            document,
            kind,
            expires,
            signature,
        })
    }

    pub fn kind(&self) -> &VerificationKind {
        &self.kind
    }

    pub fn expires(&self) -> Option<&str> {
        self.expires.as_deref()
    }

    /// Present only for signed badges.
    pub fn signature(&self) -> Option<&SignatureBlock> {
        self.signature.as_ref()
    }

    pub fn document(&self) -> &Map<String, Value> {
        &self.document
    }

    /// Compact JSON of the document without its `signature` block, with
    /// object keys sorted at every level.
    pub fn canonical_payload(&self) -> String {
        let mut unsigned = self.document.clone();
        unsigned.remove(SIGNATURE);
        canonicalize_value(Value::Object(unsigned)).to_string()
    }
}

fn canonicalize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));

            let mut canonical = Map::with_capacity(entries.len());
            for (key, nested) in entries {
                canonical.insert(key, canonicalize_value(nested));
            }
            Value::Object(canonical)
        }
        Value::Array(values) => Value::Array(values.into_iter().map(canonicalize_value).collect()),
        other => other,
    }
}
