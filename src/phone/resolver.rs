//! Caller id resolution across native and trunk numbers.

use std::sync::Arc;
use tracing::{debug, info};

use crate::api::ApiError;
use crate::models::CallerIdCandidate;
use crate::phone::{DialError, NumberDirectory};

/// Which number the call goes out as, and who owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCallerId {
    pub caller_id_number: String,
    pub is_external_trunk_call: bool,
    pub trunk_id: Option<String>,
}

impl ResolvedCallerId {
    fn native(phone_number: String) -> Self {
        Self {
            caller_id_number: phone_number,
            is_external_trunk_call: false,
            trunk_id: None,
        }
    }
}

pub struct NumberResolver {
    directory: Arc<dyn NumberDirectory>,
}

pub(crate) fn lookup_failed(err: ApiError) -> DialError {
    DialError::EstablishmentFailed(format!("Number lookup failed: {}", err))
}

impl NumberResolver {
    pub fn new(directory: Arc<dyn NumberDirectory>) -> Self {
        Self { directory }
    }

    /// Verify `candidate` is one of the user's active numbers, native numbers
    /// first. Without a candidate, the most recently purchased native number
    /// is used.
    pub async fn resolve(&self, candidate: Option<&str>) -> Result<ResolvedCallerId, DialError> {
        let Some(phone_number) = candidate.filter(|n| !n.trim().is_empty()) else {
            let numbers = self.directory.active_native_numbers().await.map_err(lookup_failed)?;
            let latest = numbers.into_iter().next().ok_or(DialError::NoActiveNumber)?;
            debug!("Defaulting caller id to {}", latest.phone_number);
            return Ok(ResolvedCallerId::native(latest.phone_number));
        };

        if let Some(native) = self
            .directory
            .find_native_number(phone_number)
            .await
            .map_err(lookup_failed)?
        {
            return Ok(ResolvedCallerId::native(native.phone_number));
        }

        if let Some(trunk_number) = self
            .directory
            .find_trunk_number(phone_number)
            .await
            .map_err(lookup_failed)?
        {
            info!(
                "Caller id {} belongs to external trunk {}",
                trunk_number.phone_number, trunk_number.trunk.id
            );
            return Ok(ResolvedCallerId {
                caller_id_number: trunk_number.phone_number,
                is_external_trunk_call: true,
                trunk_id: Some(trunk_number.trunk.id),
            });
        }

        Err(DialError::NumberNotFound(phone_number.to_string()))
    }

    /// Every number the user can call from: native numbers, then numbers on
    /// active trunks.
    pub async fn candidates(&self) -> Result<Vec<CallerIdCandidate>, DialError> {
        let native = self.directory.active_native_numbers().await.map_err(lookup_failed)?;
        let trunk = self.directory.active_trunk_numbers().await.map_err(lookup_failed)?;

        Ok(native
            .iter()
            .map(|n| CallerIdCandidate::native(&n.phone_number))
            .chain(trunk.iter().map(|t| t.to_candidate()))
            .collect())
    }
}
