use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_PROMPT: &str = "Please verify your identity";
pub const UNLOCK_PROMPT: &str = "Authenticate to unlock the app";

const NOT_AVAILABLE: &str = "Biometric authentication is not available";
const CANCELLED: &str = "Authentication was cancelled";
const CANCEL_MARKERS: [&str; 3] = ["User canceled", "User cancelled", "UserCancel"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BiometricError {
    Sensor(String),
    Prompt(String),
}

impl fmt::Display for BiometricError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BiometricError::Sensor(msg) | BiometricError::Prompt(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for BiometricError {}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BiometricAvailability {
    pub available: bool,
    pub biometry_type: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiometricAuthResult {
    pub success: bool,
    pub error: Option<String>,
}

impl BiometricAuthResult {
    const fn succeeded() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Platform biometric capability (fingerprint, face, ...).
#[async_trait]
pub trait BiometricAuthenticator: Send + Sync {
    async fn sensor(&self) -> Result<BiometricAvailability, BiometricError>;

    /// Shows the system prompt. `Ok(false)` means the user failed the check.
    async fn simple_prompt(&self, message: &str) -> Result<bool, BiometricError>;
}

/// Turns the raw capability into plain answers: every error becomes an
/// unsuccessful result, never a failure of the caller.
#[derive(Clone)]
pub struct BiometricAuthService {
    authenticator: Arc<dyn BiometricAuthenticator>,
}

impl BiometricAuthService {
    pub fn new(authenticator: Arc<dyn BiometricAuthenticator>) -> Self {
        Self { authenticator }
    }

    pub async fn availability(&self) -> BiometricAvailability {
        match self.authenticator.sensor().await {
            Ok(availability) => availability,
            Err(e) => {
                warn!("Biometric availability check failed: {}", e);
                BiometricAvailability {
                    available: false,
                    biometry_type: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub async fn is_available(&self) -> bool {
        self.availability().await.available
    }

    pub async fn authenticate(&self, message: &str) -> BiometricAuthResult {
        match self.authenticator.sensor().await {
            Ok(availability) if availability.available => {}
            Ok(_) => return BiometricAuthResult::failed(NOT_AVAILABLE),
            Err(e) => return BiometricAuthResult::failed(e.to_string()),
        }

        match self.authenticator.simple_prompt(message).await {
            Ok(true) => {
                debug!("Biometric authentication succeeded");
                BiometricAuthResult::succeeded()
            }
            Ok(false) => BiometricAuthResult {
                success: false,
                error: None,
            },
            Err(e) => {
                let message = e.to_string();
                if CANCEL_MARKERS.iter().any(|marker| message.contains(marker)) {
                    BiometricAuthResult::failed(CANCELLED)
                } else {
                    warn!("Biometric authentication failed: {}", message);
                    BiometricAuthResult::failed(message)
                }
            }
        }
    }

    pub async fn authenticate_default(&self) -> BiometricAuthResult {
        self.authenticate(DEFAULT_PROMPT).await
    }
}

impl fmt::Debug for BiometricAuthService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BiometricAuthService").finish_non_exhaustive()
    }
}

/// Scripted authenticator for hosts without a sensor, e.g. the desktop CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulatedBiometrics {
    Unavailable,
    Accept,
    Deny,
    Cancel,
}

impl FromStr for SimulatedBiometrics {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unavailable" | "none" | "off" => Ok(SimulatedBiometrics::Unavailable),
            "accept" | "available" | "ok" => Ok(SimulatedBiometrics::Accept),
            "deny" | "fail" => Ok(SimulatedBiometrics::Deny),
            "cancel" => Ok(SimulatedBiometrics::Cancel),
            other => Err(format!("unknown biometrics mode: {other}")),
        }
    }
}

#[async_trait]
impl BiometricAuthenticator for SimulatedBiometrics {
    async fn sensor(&self) -> Result<BiometricAvailability, BiometricError> {
        let available = !matches!(self, SimulatedBiometrics::Unavailable);
        Ok(BiometricAvailability {
            available,
            biometry_type: available.then(|| "Simulated".to_string()),
            error: None,
        })
    }

    async fn simple_prompt(&self, message: &str) -> Result<bool, BiometricError> {
        debug!("Simulated biometric prompt: {}", message);
        match self {
            SimulatedBiometrics::Accept => Ok(true),
            SimulatedBiometrics::Deny => Ok(false),
            SimulatedBiometrics::Cancel => Err(BiometricError::Prompt("User canceled the operation".to_string())),
            SimulatedBiometrics::Unavailable => Err(BiometricError::Sensor(NOT_AVAILABLE.to_string())),
        }
    }
}
