//! Edge function calls for server-side call control.

use async_trait::async_trait;
use serde::Deserialize;

use crate::api::{ApiError, SupabaseClient};
use crate::models::{
    BridgedCallRequest, CallbackCallRequest, InitiatedCall, SipTransferRequest,
    TerminateCallRequest, TransferCallRequest,
};
use crate::phone::CallBackend;

const INITIATE_BRIDGED_CALL: &str = "initiate-bridged-call";
const INITIATE_CALLBACK_CALL: &str = "initiate-callback-call";
const TERMINATE_CALL: &str = "terminate-call";
const TRANSFER_CALL: &str = "transfer-call";
const SIP_TRANSFER_CALL: &str = "sip-transfer-call";

/// Acknowledgement body of the control functions. `sip-transfer-call` can
/// answer 200 with an `error` field, so it is checked even on success.
#[derive(Debug, Default, Deserialize)]
struct FunctionAck {
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl FunctionAck {
    fn into_result(self) -> Result<(), ApiError> {
        match self.error {
            None | Some(serde_json::Value::Null) => Ok(()),
            Some(serde_json::Value::String(message)) => Err(ApiError::Function {
                status: 200,
                code: None,
                message,
            }),
            Some(other) => Err(ApiError::Function {
                status: 200,
                code: other.get("code").and_then(|c| c.as_str()).map(String::from),
                message: other
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("Unknown error")
                    .to_string(),
            }),
        }
    }
}

#[async_trait]
impl CallBackend for SupabaseClient {
    async fn initiate_bridged_call(&self, request: &BridgedCallRequest) -> Result<InitiatedCall, ApiError> {
        let call: InitiatedCall = self.invoke(INITIATE_BRIDGED_CALL, request).await?;
        tracing::info!("Bridged call initiated: {}", call.call_sid);
        Ok(call)
    }

    async fn initiate_callback_call(&self, request: &CallbackCallRequest) -> Result<InitiatedCall, ApiError> {
        let call: InitiatedCall = self.invoke(INITIATE_CALLBACK_CALL, request).await?;
        tracing::info!("Callback call initiated: {}", call.call_sid);
        Ok(call)
    }

    async fn terminate_call(&self, call_sid: &str) -> Result<(), ApiError> {
        let request = TerminateCallRequest {
            call_sid: call_sid.to_string(),
        };
        let ack: FunctionAck = self.invoke(TERMINATE_CALL, &request).await?;
        ack.into_result()
    }

    async fn transfer_call(&self, request: &TransferCallRequest) -> Result<(), ApiError> {
        let ack: FunctionAck = self.invoke(TRANSFER_CALL, request).await?;
        ack.into_result()
    }

    async fn sip_transfer_call(&self, request: &SipTransferRequest) -> Result<(), ApiError> {
        let ack: FunctionAck = self.invoke(SIP_TRANSFER_CALL, request).await?;
        ack.into_result()
    }
}
