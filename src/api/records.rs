//! PostgREST lookups: caller id numbers, the user profile, saved transfer
//! targets and call records.

use async_trait::async_trait;

use crate::api::{ApiError, SupabaseClient};
use crate::models::{
    CallHistoryEntry, CallRecord, CallRecordStatus, ServiceNumber, TransferTarget, TrunkNumber,
    UserProfile,
};
use crate::phone::{CallRecordSource, NumberDirectory};

const SERVICE_NUMBER_COLUMNS: &str = "phone_number,purchased_at";
const TRUNK_NUMBER_COLUMNS: &str = "phone_number,friendly_name,external_sip_trunks!inner(id,name,is_active)";
const PROFILE_COLUMNS: &str =
    "name,phone_number,sip_username,sip_password,sip_realm,sip_ws_server,credits_balance";
const TRANSFER_TARGET_COLUMNS: &str = "id,label,phone_number";
const CALL_HISTORY_COLUMNS: &str = "caller_number,contact_phone,direction,started_at";

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

impl SupabaseClient {
    fn native_number_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("select", SERVICE_NUMBER_COLUMNS.to_string()),
            ("user_id", eq(self.user_id())),
            ("is_active", eq("true")),
            ("order", "purchased_at.desc".to_string()),
        ]
    }

    fn trunk_number_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("select", TRUNK_NUMBER_COLUMNS.to_string()),
            ("user_id", eq(self.user_id())),
            ("is_active", eq("true")),
            ("external_sip_trunks.is_active", eq("true")),
            ("order", "created_at.desc".to_string()),
        ]
    }
}

#[async_trait]
impl NumberDirectory for SupabaseClient {
    async fn active_native_numbers(&self) -> Result<Vec<ServiceNumber>, ApiError> {
        self.select("service_numbers", &self.native_number_query()).await
    }

    async fn find_native_number(&self, phone_number: &str) -> Result<Option<ServiceNumber>, ApiError> {
        let mut query = self.native_number_query();
        query.push(("phone_number", eq(phone_number)));
        query.push(("limit", "1".to_string()));

        let rows: Vec<ServiceNumber> = self.select("service_numbers", &query).await?;
        Ok(rows.into_iter().next())
    }

    async fn active_trunk_numbers(&self) -> Result<Vec<TrunkNumber>, ApiError> {
        self.select("external_sip_numbers", &self.trunk_number_query()).await
    }

    async fn find_trunk_number(&self, phone_number: &str) -> Result<Option<TrunkNumber>, ApiError> {
        let mut query = self.trunk_number_query();
        query.push(("phone_number", eq(phone_number)));
        query.push(("limit", "1".to_string()));

        let rows: Vec<TrunkNumber> = self.select("external_sip_numbers", &query).await?;
        Ok(rows.into_iter().next())
    }

    async fn user_profile(&self) -> Result<UserProfile, ApiError> {
        let query = [
            ("select", PROFILE_COLUMNS.to_string()),
            ("id", eq(self.user_id())),
            ("limit", "1".to_string()),
        ];

        let rows: Vec<UserProfile> = self.select("users", &query).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound(format!("user {}", self.user_id())))
    }

    async fn transfer_targets(&self) -> Result<Vec<TransferTarget>, ApiError> {
        let query = [
            ("select", TRANSFER_TARGET_COLUMNS.to_string()),
            ("user_id", eq(self.user_id())),
            ("order", "is_default.desc".to_string()),
        ];
        self.select("transfer_numbers", &query).await
    }

    async fn recent_calls(&self, limit: usize) -> Result<Vec<CallHistoryEntry>, ApiError> {
        let query = [
            ("select", CALL_HISTORY_COLUMNS.to_string()),
            ("user_id", eq(self.user_id())),
            ("order", "started_at.desc".to_string()),
            ("limit", limit.to_string()),
        ];
        self.select("call_records", &query).await
    }
}

#[async_trait]
impl CallRecordSource for SupabaseClient {
    async fn fetch_status(&self, call_record_id: &str) -> Result<Option<CallRecordStatus>, ApiError> {
        let query = [
            ("select", "id,status".to_string()),
            ("id", eq(call_record_id)),
            ("limit", "1".to_string()),
        ];

        let rows: Vec<CallRecord> = self.select("call_records", &query).await?;
        Ok(rows.into_iter().next().map(|record| record.status))
    }
}
