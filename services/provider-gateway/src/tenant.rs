//! Tenant identity and call-scoping types.
//!
//! A tenant is either an individual client or a client group. Individually
//! (PSD2) licensed clients own their authentication means towards a
//! provider; unlicensed clients piggy-back on their group's means, which is
//! why several scoping rules below dispatch on the license flag.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of the tenant on whose behalf an outbound call is made.
///
/// Immutable; supplied per call by the authentication-means layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TenantIdentity {
    /// An individual client within a client group.
    Client {
        /// The client id.
        client_id: Uuid,
        /// The group the client belongs to.
        client_group_id: Uuid,
        /// Whether the client holds its own PSD2 license. Unlicensed
        /// clients reuse the group's authentication means.
        psd2_licensed: bool,
    },
    /// A whole client group acting as one tenant.
    ClientGroup {
        /// The client group id.
        client_group_id: Uuid,
    },
}

impl TenantIdentity {
    /// Creates an individual-client identity.
    #[must_use]
    pub fn client(client_id: Uuid, client_group_id: Uuid, psd2_licensed: bool) -> Self {
        Self::Client {
            client_id,
            client_group_id,
            psd2_licensed,
        }
    }

    /// Creates a client-group identity.
    #[must_use]
    pub fn client_group(client_group_id: Uuid) -> Self {
        Self::ClientGroup { client_group_id }
    }

    /// The group this tenant belongs to.
    #[must_use]
    pub fn client_group_id(&self) -> Uuid {
        match self {
            Self::Client {
                client_group_id, ..
            }
            | Self::ClientGroup { client_group_id } => *client_group_id,
        }
    }

    /// Whether the tenant holds its own PSD2 license.
    #[must_use]
    pub fn is_psd2_licensed(&self) -> bool {
        match self {
            Self::Client { psd2_licensed, .. } => *psd2_licensed,
            Self::ClientGroup { .. } => false,
        }
    }

    /// The id along which circuit breakers are shared.
    ///
    /// PSD2-licensed clients have their own authentication means and get
    /// their own breaker; everyone else shares fate (and rate limits) with
    /// the rest of their group.
    #[must_use]
    pub fn grouping_id(&self) -> Uuid {
        match self {
            Self::Client {
                client_id,
                client_group_id,
                psd2_licensed,
            } => {
                if *psd2_licensed {
                    *client_id
                } else {
                    *client_group_id
                }
            }
            Self::ClientGroup { client_group_id } => *client_group_id,
        }
    }

    /// The id under which this tenant's client managers are cached.
    #[must_use]
    pub fn cache_tenant_id(&self) -> Uuid {
        match self {
            Self::Client { client_id, .. } => *client_id,
            Self::ClientGroup { client_group_id } => *client_group_id,
        }
    }

    /// Log-friendly subject of this tenant.
    #[must_use]
    pub fn subject(&self) -> String {
        match self {
            Self::Client { client_id, .. } => format!("client:{client_id}"),
            Self::ClientGroup { client_group_id } => format!("group:{client_group_id}"),
        }
    }
}

/// Kind of banking service a call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceKind {
    /// Account information services.
    Ais,
    /// Payment initiation services.
    Pis,
}

impl ServiceKind {
    /// Upper-case wire/metric name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ais => "AIS",
            Self::Pis => "PIS",
        }
    }
}

/// The flow an outbound client serves.
///
/// Data-fetch traffic is much higher volume than authorization-flow
/// traffic; the two get separate client managers so one cannot starve the
/// other's connection pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallFlow {
    /// Fetching account/transaction data.
    DataFetch,
    /// Authorization flows (consent, token exchange). Redirects here are
    /// inspected, not followed.
    Authorization,
}

impl CallFlow {
    /// Whether this is the data-fetch flow.
    #[must_use]
    pub fn is_data_fetch(self) -> bool {
        matches!(self, Self::DataFetch)
    }

    /// Log-friendly name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DataFetch => "data_fetch",
            Self::Authorization => "authorization",
        }
    }
}

/// Version of a provider integration. Distinct versions never share
/// clients or pools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderVersion(pub u32);

impl std::fmt::Display for ProviderVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}
