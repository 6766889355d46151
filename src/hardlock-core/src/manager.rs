//! The public license facade.
//!
//! [`LicenseManager`] composes the MAC signer, the token codec, and the
//! fingerprint builder into load/validate/generate/feature-query operations.
//!
//! Validation checks run strictly in order (structural, cryptographic,
//! temporal, binding) and each check runs only if all earlier checks
//! passed. A bad MAC on a wildcard-bound token is therefore still invalid.
//!
//! A manager is not internally synchronized: the license state it holds is
//! caller-owned territory, and concurrent `load_and_validate` calls on one
//! manager are a caller mistake. The fingerprint *builder* it consults is
//! shared-resource and safe to share across managers.

use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use tracing::{info, warn};

use hardlock_hwid::{FingerprintBuilder, HwidConfig};
use hardlock_mac::MacSigner;

use crate::error::{FailureKind, LicenseError};
use crate::token::{LicenseToken, SCHEMA_VERSION, WILDCARD_HARDWARE};

/// A decoded license, fully owned by the caller.
///
/// On success every field mirrors the token. On a lenient-mode failure
/// `valid` is `false`, `failure` names the kind, and the token fields hold
/// whatever was parsed (or defaults when the token did not parse at all).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseInfo {
    /// Whether the token passed every check.
    pub valid: bool,
    /// Subject identifier.
    pub user_id: String,
    /// License identifier.
    pub license_id: String,
    /// Fingerprint the token is bound to, or `*`.
    pub hardware_hash: String,
    /// Granted capability tags, in issuance order.
    pub features: Vec<String>,
    /// Issuance time.
    pub issued_at: DateTime<Utc>,
    /// Inclusive validity horizon.
    pub expiry: DateTime<Utc>,
    /// Schema version.
    pub version: u32,
    /// Failure classification when `valid` is `false`.
    pub failure: Option<FailureKind>,
}

impl LicenseInfo {
    fn from_token(token: &LicenseToken, failure: Option<FailureKind>) -> Self {
        Self {
            valid: failure.is_none(),
            user_id: token.user_id.clone(),
            license_id: token.license_id.clone(),
            hardware_hash: token.hardware_hash.clone(),
            features: token.features.clone(),
            issued_at: token.issued_at,
            expiry: token.expiry,
            version: token.version,
            failure,
        }
    }

    fn rejected(kind: FailureKind) -> Self {
        Self {
            valid: false,
            user_id: String::new(),
            license_id: String::new(),
            hardware_hash: String::new(),
            features: Vec::new(),
            issued_at: DateTime::UNIX_EPOCH,
            expiry: DateTime::UNIX_EPOCH,
            version: 0,
            failure: Some(kind),
        }
    }

    /// Whether this license is valid and grants `name`.
    #[must_use]
    pub fn has_feature(&self, name: &str) -> bool {
        self.valid && self.features.iter().any(|feature| feature == name)
    }
}

/// Unsigned license fields handed to [`LicenseManager::generate`].
#[derive(Debug, Clone)]
pub struct LicenseDraft {
    /// Subject identifier. Must be non-empty.
    pub user_id: String,
    /// Caller-chosen unique id. Must be non-empty.
    pub license_id: String,
    /// Fingerprint to bind to; empty defaults to the `*` wildcard.
    pub hardware_hash: String,
    /// Capability tags to grant, order preserved.
    pub features: Vec<String>,
    /// Issuance time; `None` means now.
    pub issued_at: Option<DateTime<Utc>>,
    /// Inclusive validity horizon. Must not precede `issued_at`.
    pub expiry: DateTime<Utc>,
    /// Schema version; `None` means the current version.
    pub version: Option<u32>,
}

/// Issues and validates offline license tokens.
pub struct LicenseManager {
    signer: MacSigner,
    builder: Arc<FingerprintBuilder>,
    strict: bool,
    current: Option<LicenseInfo>,
}

impl LicenseManager {
    /// Create a manager with default hardware configuration.
    ///
    /// The secret may be any byte string; it is held only by the manager's
    /// signer and wiped on drop. Validation starts in lenient mode.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self::with_config(secret, HwidConfig::default())
    }

    /// Create a manager with a custom hardware configuration.
    #[must_use]
    pub fn with_config(secret: &[u8], config: HwidConfig) -> Self {
        Self::with_builder(secret, Arc::new(FingerprintBuilder::new(config)))
    }

    /// Create a manager backed by a shared fingerprint builder.
    ///
    /// Processes validating many licenses should share one builder so the
    /// hardware probes run once per cache TTL, not once per manager.
    #[must_use]
    pub fn with_builder(secret: &[u8], builder: Arc<FingerprintBuilder>) -> Self {
        Self {
            signer: MacSigner::new(secret),
            builder,
            strict: false,
            current: None,
        }
    }

    /// The fingerprint builder backing this manager.
    #[must_use]
    pub fn builder(&self) -> &Arc<FingerprintBuilder> {
        &self.builder
    }

    /// Parse and validate a license token, replacing the held state.
    ///
    /// Checks run in order: structural, cryptographic, temporal, binding;
    /// each only if all earlier checks passed. In strict mode the first
    /// failure is returned as an error; in lenient mode the returned info
    /// carries `valid = false` and the failure kind.
    ///
    /// # Errors
    ///
    /// In strict mode, the first failing check as a [`LicenseError`];
    /// lenient mode always returns `Ok`.
    pub fn load_and_validate(&mut self, token_bytes: &[u8]) -> Result<LicenseInfo, LicenseError> {
        let token = match LicenseToken::parse(token_bytes) {
            Ok(token) => token,
            Err(err) => return self.conclude_failure(None, err.into()),
        };
        if let Err(err) = self.check_token(&token) {
            return self.conclude_failure(Some(&token), err);
        }

        let info = LicenseInfo::from_token(&token, None);
        info!(
            license_id = %info.license_id,
            user_id = %info.user_id,
            features = info.features.len(),
            "license validated"
        );
        self.current = Some(info.clone());
        Ok(info)
    }

    /// Whether the most recently loaded valid license grants `name`.
    ///
    /// # Errors
    ///
    /// [`LicenseError::NotInitialized`] in strict mode when no valid
    /// license is loaded; lenient mode returns `Ok(false)`.
    pub fn has_feature(&self, name: &str) -> Result<bool, LicenseError> {
        match self.current_valid() {
            Some(info) => Ok(info.has_feature(name)),
            None if self.strict => Err(LicenseError::NotInitialized),
            None => Ok(false),
        }
    }

    /// Require that the loaded license grants `name`.
    ///
    /// # Errors
    ///
    /// [`LicenseError::NotInitialized`] when no valid license is loaded,
    /// [`LicenseError::MissingFeature`] when the feature is absent.
    pub fn require_feature(&self, name: &str) -> Result<(), LicenseError> {
        let Some(info) = self.current_valid() else {
            return Err(LicenseError::NotInitialized);
        };
        if info.has_feature(name) {
            Ok(())
        } else {
            Err(LicenseError::MissingFeature {
                feature: name.to_string(),
            })
        }
    }

    /// Serialize and sign a license token from `draft`.
    ///
    /// Omitted fields get defaults: `issued_at` is now, `version` is the
    /// current schema version, an empty `hardware_hash` becomes the `*`
    /// wildcard.
    ///
    /// # Errors
    ///
    /// [`LicenseError::Structural`] for empty identifiers or features, an
    /// unknown version, or `expiry` preceding `issued_at`;
    /// [`LicenseError::Cryptographic`] if signing fails.
    pub fn generate(&self, draft: LicenseDraft) -> Result<Vec<u8>, LicenseError> {
        let issued_at = draft
            .issued_at
            .unwrap_or_else(Utc::now)
            .trunc_subsecs(0);
        let expiry = draft.expiry.trunc_subsecs(0);
        let version = draft.version.unwrap_or(SCHEMA_VERSION);

        if draft.user_id.is_empty() {
            return Err(LicenseError::structural("user_id must not be empty"));
        }
        if draft.license_id.is_empty() {
            return Err(LicenseError::structural("license_id must not be empty"));
        }
        if draft.features.iter().any(String::is_empty) {
            return Err(LicenseError::structural("feature entries must not be empty"));
        }
        if version != SCHEMA_VERSION {
            return Err(LicenseError::structural(format!(
                "unsupported schema version {version}"
            )));
        }
        if expiry < issued_at {
            return Err(LicenseError::structural("expiry precedes issued_at"));
        }

        let hardware_hash = if draft.hardware_hash.is_empty() {
            WILDCARD_HARDWARE.to_string()
        } else {
            draft.hardware_hash
        };

        let mut token = LicenseToken {
            user_id: draft.user_id,
            license_id: draft.license_id,
            hardware_hash,
            features: draft.features,
            issued_at,
            expiry,
            version,
            mac: String::new(),
        };
        token.sign_with(&self.signer);

        info!(
            license_id = %token.license_id,
            user_id = %token.user_id,
            expiry = %token.expiry,
            "license generated"
        );
        Ok(token.to_bytes())
    }

    /// The current machine fingerprint.
    ///
    /// # Errors
    ///
    /// [`LicenseError::HardwareProbe`] when detection fails outright.
    pub fn current_hardware_id(&self) -> Result<String, LicenseError> {
        self.builder.fingerprint().map_err(Into::into)
    }

    /// Replace the hardware configuration.
    ///
    /// Invalidates the builder's cache; the next validation re-probes. Note
    /// that this reconfigures the *shared* builder when one was passed in.
    pub fn set_hardware_config(&mut self, config: HwidConfig) {
        self.builder.reconfigure(config);
    }

    /// Switch between strict (raising) and lenient (result-value) modes.
    pub fn set_strict_validation(&mut self, strict: bool) {
        self.strict = strict;
    }

    /// The most recently loaded license, valid or not.
    #[must_use]
    pub fn current_license(&self) -> Option<&LicenseInfo> {
        self.current.as_ref()
    }

    /// Run the post-structural checks: cryptographic, temporal, binding.
    fn check_token(&self, token: &LicenseToken) -> Result<(), LicenseError> {
        // Cryptographic: MAC over the re-canonicalized bytes, never over the
        // input text.
        if !token.verify_with(&self.signer) {
            return Err(LicenseError::InvalidSignature);
        }

        // Temporal: expiry is inclusive.
        let now = Utc::now();
        if now > token.expiry {
            return Err(LicenseError::Expired {
                expiry: token.expiry,
            });
        }

        // Binding: wildcard short-circuits, but only after the MAC held.
        if token.hardware_hash != WILDCARD_HARDWARE {
            let fingerprint = self.builder.fingerprint()?;
            if token.hardware_hash != fingerprint {
                return Err(LicenseError::hardware_mismatch(
                    &token.hardware_hash,
                    &fingerprint,
                ));
            }
        }

        Ok(())
    }

    /// Record a failed validation and shape it for the active mode.
    fn conclude_failure(
        &mut self,
        token: Option<&LicenseToken>,
        err: LicenseError,
    ) -> Result<LicenseInfo, LicenseError> {
        let kind = err.kind();
        warn!(kind = %kind, error = %err, "license validation failed");
        let info = match token {
            Some(token) => LicenseInfo::from_token(token, Some(kind)),
            None => LicenseInfo::rejected(kind),
        };
        self.current = Some(info.clone());
        if self.strict {
            Err(err)
        } else {
            Ok(info)
        }
    }

    fn current_valid(&self) -> Option<&LicenseInfo> {
        self.current.as_ref().filter(|info| info.valid)
    }
}
