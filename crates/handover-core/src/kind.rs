//! Well-known handover names.
//!
//! The set is a cross-runtime wire contract: every binding that talks this
//! protocol uses the exact same strings. Add a name here only together with
//! the other bindings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A well-known handover event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HandoverKind {
    ProvideAccessToken,
    ProvideAnonymousAccessToken,
    ReceiveAnalyticsEvent,
    ReceiveDebugLog,
    ReceiveError,
    Exit,
    StartFaq,
    StartOnboarding,
    StartFundPortfolio,
    StartAddMoney,
    StartAuthorization,
    StartTransactionSigning,
}

impl HandoverKind {
    /// Every kind, in wire-contract order.
    pub const ALL: [HandoverKind; 12] = [
        HandoverKind::ProvideAccessToken,
        HandoverKind::ProvideAnonymousAccessToken,
        HandoverKind::ReceiveAnalyticsEvent,
        HandoverKind::ReceiveDebugLog,
        HandoverKind::ReceiveError,
        HandoverKind::Exit,
        HandoverKind::StartFaq,
        HandoverKind::StartOnboarding,
        HandoverKind::StartFundPortfolio,
        HandoverKind::StartAddMoney,
        HandoverKind::StartAuthorization,
        HandoverKind::StartTransactionSigning,
    ];

    /// The event name on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            HandoverKind::ProvideAccessToken => "provideAccessToken",
            HandoverKind::ProvideAnonymousAccessToken => "provideAnonymousAccessToken",
            HandoverKind::ReceiveAnalyticsEvent => "receiveAnalyticsEvent",
            HandoverKind::ReceiveDebugLog => "receiveDebugLog",
            HandoverKind::ReceiveError => "receiveError",
            HandoverKind::Exit => "exit",
            HandoverKind::StartFaq => "startFaq",
            HandoverKind::StartOnboarding => "startOnboarding",
            HandoverKind::StartFundPortfolio => "startFundPortfolio",
            HandoverKind::StartAddMoney => "startAddMoney",
            HandoverKind::StartAuthorization => "startAuthorization",
            HandoverKind::StartTransactionSigning => "startTransactionSigning",
        }
    }
}

impl fmt::Display for HandoverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HandoverKind {
    type Err = HandoverKindParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HandoverKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| HandoverKindParseError(s.to_string()))
    }
}

impl TryFrom<String> for HandoverKind {
    type Error = HandoverKindParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<HandoverKind> for String {
    fn from(kind: HandoverKind) -> Self {
        kind.as_str().to_string()
    }
}

/// Error parsing a handover name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown handover: {0}")]
pub struct HandoverKindParseError(pub String);
