use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::router::{Channel, Delivery, Dispatched};

#[derive(Deserialize, Default)]
pub struct DispatchBody {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// A method-channel style call: `{"method": "sendSMS", "arguments": {...}}`.
#[derive(Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: DispatchBody,
}

#[derive(Serialize)]
pub struct DispatchResponse {
    pub success: bool,
    pub dispatch_id: Uuid,
    pub channel: Channel,
    pub recipient: String,
    pub delivery: Delivery,
    pub parts: usize,
}

impl From<Dispatched> for DispatchResponse {
    fn from(d: Dispatched) -> Self {
        Self {
            success: true,
            dispatch_id: d.dispatch_id,
            channel: d.channel,
            recipient: d.recipient,
            delivery: d.delivery,
            parts: d.parts,
        }
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub country_code: String,
    pub sms_direct: bool,
}
