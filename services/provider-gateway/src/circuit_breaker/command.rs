//! Outbound provider operations guarded by circuit breakers.

use crate::tenant::ServiceKind;

/// One guarded provider operation.
///
/// The command name is part of the breaker name and of the config lookup
/// key, so two commands against the same provider never share a breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderCommand {
    /// Generate the login/consent URL.
    AisGetLoginInfo,
    /// Exchange the consent callback for access means.
    AisCreateAccessMeans,
    /// Refresh stored access means.
    AisRefreshAccessMeans,
    /// Fetch accounts and transactions.
    AisFetchData,
    /// Fetch the account list only.
    AisGetAccounts,
    /// Notify the provider that a user site was deleted.
    AisNotifyUserSiteDelete,
    /// Initiate a SEPA payment.
    PisSepaInitiatePayment,
    /// Submit a SEPA payment.
    PisSepaSubmitPayment,
    /// Poll a SEPA payment's status.
    PisSepaGetPaymentStatus,
    /// Initiate a UK domestic single payment.
    PisUkDomesticInitiateSinglePayment,
    /// Submit a UK domestic payment.
    PisUkDomesticSubmitPayment,
    /// Poll a UK domestic payment's status.
    PisUkDomesticGetPaymentStatus,
}

impl ProviderCommand {
    /// The service this command belongs to.
    #[must_use]
    pub fn service_kind(self) -> ServiceKind {
        match self {
            Self::AisGetLoginInfo
            | Self::AisCreateAccessMeans
            | Self::AisRefreshAccessMeans
            | Self::AisFetchData
            | Self::AisGetAccounts
            | Self::AisNotifyUserSiteDelete => ServiceKind::Ais,
            Self::PisSepaInitiatePayment
            | Self::PisSepaSubmitPayment
            | Self::PisSepaGetPaymentStatus
            | Self::PisUkDomesticInitiateSinglePayment
            | Self::PisUkDomesticSubmitPayment
            | Self::PisUkDomesticGetPaymentStatus => ServiceKind::Pis,
        }
    }

    /// The command name used in breaker names and config keys.
    #[must_use]
    pub fn command_name(self) -> &'static str {
        match self {
            Self::AisGetLoginInfo => "getLoginInfo",
            Self::AisCreateAccessMeans => "createNewAccessMeans",
            Self::AisRefreshAccessMeans => "refreshAccessMeans",
            Self::AisFetchData => "fetchData",
            Self::AisGetAccounts => "getAccounts",
            Self::AisNotifyUserSiteDelete => "notifyUserSiteDelete",
            Self::PisSepaInitiatePayment => "initiateSepaPayment",
            Self::PisSepaSubmitPayment => "submitSepaPayment",
            Self::PisSepaGetPaymentStatus => "getSepaPaymentStatus",
            Self::PisUkDomesticInitiateSinglePayment => "initiateUkDomesticSinglePayment",
            Self::PisUkDomesticSubmitPayment => "submitUkDomesticPayment",
            Self::PisUkDomesticGetPaymentStatus => "getUkDomesticPaymentStatus",
        }
    }
}

impl std::fmt::Display for ProviderCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command_name())
    }
}
