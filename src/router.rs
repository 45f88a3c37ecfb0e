//! Channel selection and hand-off.
//!
//! A dispatch is a single linear decision: pick the recipient, normalize it
//! for the chosen transport, fill in the message, hand it to the transport.
//! Success means the hand-off happened. Nothing here confirms delivery.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use log::{error, info, warn};
use serde::Serialize;
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::error::{DispatchError, TransportError};
use crate::phone::{normalize_for_sms, normalize_for_whatsapp};
use crate::segment::divide_message;
use crate::transport::{
    CommandLauncher, CommandPermission, CommandSmsSender, LinkLauncher, NoSmsSender,
    SmsPermission, SmsSender,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Sms,
    WhatsApp,
}

impl FromStr for Channel {
    type Err = DispatchError;

    /// Accepts the short channel names as well as the method names used by
    /// the mobile client (`sendSMS`, `sendWhatsApp`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sendSMS" => return Ok(Channel::Sms),
            "sendWhatsApp" => return Ok(Channel::WhatsApp),
            _ => {}
        }
        match s.to_ascii_lowercase().as_str() {
            "sms" => Ok(Channel::Sms),
            "whatsapp" => Ok(Channel::WhatsApp),
            _ => Err(DispatchError::NotImplemented(s.to_string())),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Sms => write!(f, "sms"),
            Channel::WhatsApp => write!(f, "whatsapp"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DispatchRequest {
    pub channel: Channel,
    pub phone: String,
    pub message: String,
}

impl DispatchRequest {
    pub fn new(channel: Channel, phone: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            channel,
            phone: phone.into(),
            message: message.into(),
        }
    }
}

/// Which path a successful dispatch took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// Accepted by the short-message program.
    Direct,
    /// Compose screen opened; the user may still not send it.
    ComposeFallback,
    /// Chat link handed to its handler.
    LinkOpened,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dispatched {
    pub dispatch_id: Uuid,
    pub channel: Channel,
    pub recipient: String,
    pub delivery: Delivery,
    /// SMS segments handed to the sender; zero when nothing was sent directly.
    pub parts: usize,
}

pub struct DispatchRouter {
    country_code: String,
    default_recipient: Option<String>,
    alert_message: String,
    whatsapp_endpoint: String,
    sms: Arc<dyn SmsSender>,
    launcher: Arc<dyn LinkLauncher>,
    permission: Arc<dyn SmsPermission>,
}

impl DispatchRouter {
    pub fn new(
        config: &DispatchConfig,
        sms: Arc<dyn SmsSender>,
        launcher: Arc<dyn LinkLauncher>,
        permission: Arc<dyn SmsPermission>,
    ) -> Self {
        Self {
            country_code: config.country_code.clone(),
            default_recipient: config.default_recipient.clone(),
            alert_message: config.alert_message.clone(),
            whatsapp_endpoint: config.whatsapp_endpoint.clone(),
            sms,
            launcher,
            permission,
        }
    }

    /// Build a router backed by the host command transports.
    pub fn from_config(config: &DispatchConfig) -> anyhow::Result<Self> {
        let launcher = CommandLauncher::new(&config.opener)
            .ok_or_else(|| anyhow::anyhow!("opener command is empty"))?;

        let sender = config
            .sms_command
            .as_deref()
            .and_then(CommandSmsSender::from_command_line);
        let permission = CommandPermission::new(sender.as_ref().map(|s| s.program().to_string()));
        let sms: Arc<dyn SmsSender> = match sender {
            Some(sender) => Arc::new(sender),
            None => Arc::new(NoSmsSender),
        };

        Ok(Self::new(
            config,
            sms,
            Arc::new(launcher),
            Arc::new(permission),
        ))
    }

    pub fn country_code(&self) -> &str {
        &self.country_code
    }

    pub fn sms_direct_available(&self) -> bool {
        self.permission.is_granted()
    }

    /// Parse a channel selector and dispatch. Unknown selectors fail with
    /// [`DispatchError::NotImplemented`].
    pub async fn dispatch_named(
        &self,
        channel: &str,
        phone: Option<&str>,
        message: Option<&str>,
    ) -> Result<Dispatched, DispatchError> {
        let channel = channel.parse::<Channel>().map_err(|e| {
            error!("Unknown channel selector {:?}", channel);
            e
        })?;
        let request = DispatchRequest::new(
            channel,
            phone.unwrap_or_default(),
            message.unwrap_or_default(),
        );
        self.dispatch(request).await
    }

    pub async fn dispatch(&self, request: DispatchRequest) -> Result<Dispatched, DispatchError> {
        let phone = self.recipient(&request.phone)?;
        match request.channel {
            Channel::Sms => self.dispatch_sms(&phone, &request.message).await,
            Channel::WhatsApp => self.dispatch_whatsapp(&phone, &request.message).await,
        }
    }

    fn recipient(&self, phone: &str) -> Result<String, DispatchError> {
        let phone = phone.trim();
        if !phone.is_empty() {
            return Ok(phone.to_string());
        }
        match self.default_recipient.as_deref() {
            Some(default) => {
                info!("No phone in request, using default recipient");
                Ok(default.to_string())
            }
            None => Err(DispatchError::InvalidPhone("phone number missing".to_string())),
        }
    }

    async fn dispatch_sms(&self, phone: &str, message: &str) -> Result<Dispatched, DispatchError> {
        let message = if message.is_empty() {
            self.alert_message.as_str()
        } else {
            message
        };
        let number = normalize_for_sms(phone, &self.country_code);

        if !self.permission.is_granted() {
            self.permission.request();
            return self.open_compose(phone, &number, message, 0).await;
        }

        let parts = divide_message(message);
        let sent = if parts.len() > 1 {
            self.sms.send_multipart(&number, &parts).await
        } else {
            self.sms.send(&number, message).await
        };

        match sent {
            Ok(()) => {
                info!("SMS sent to {} in {} part(s)", number, parts.len());
                Ok(Dispatched {
                    dispatch_id: Uuid::new_v4(),
                    channel: Channel::Sms,
                    recipient: number,
                    delivery: Delivery::Direct,
                    parts: parts.len(),
                })
            }
            Err(TransportError::PartialSend { sent, total, source }) => {
                warn!(
                    "SMS to {} stopped after {}/{} parts: {}, composing the rest",
                    number, sent, total, source
                );
                let rest = parts[sent.min(parts.len())..].concat();
                self.open_compose(phone, &number, &rest, sent).await
            }
            Err(e) => {
                warn!("SMS to {} failed: {}, opening compose screen", number, e);
                self.open_compose(phone, &number, message, 0).await
            }
        }
    }

    /// The compose link carries the number as the caller wrote it.
    /// `parts_sent` counts segments that already went out directly.
    async fn open_compose(
        &self,
        raw_phone: &str,
        number: &str,
        message: &str,
        parts_sent: usize,
    ) -> Result<Dispatched, DispatchError> {
        let url = compose_url(raw_phone, message);
        if let Err(e) = self.launcher.open(&url).await {
            error!("Could not open SMS compose screen: {}", e);
            return Err(DispatchError::Unavailable(
                "no SMS application available".to_string(),
            ));
        }
        info!("Opened SMS compose screen for {}", number);
        Ok(Dispatched {
            dispatch_id: Uuid::new_v4(),
            channel: Channel::Sms,
            recipient: number.to_string(),
            delivery: Delivery::ComposeFallback,
            parts: parts_sent,
        })
    }

    async fn dispatch_whatsapp(
        &self,
        phone: &str,
        message: &str,
    ) -> Result<Dispatched, DispatchError> {
        let number = normalize_for_whatsapp(phone, &self.country_code);
        let url = whatsapp_url(&self.whatsapp_endpoint, &number, message);

        if !self.launcher.can_resolve(&url) {
            warn!("No handler for WhatsApp link");
            return Err(DispatchError::Unavailable(
                "WhatsApp is not installed".to_string(),
            ));
        }
        if let Err(e) = self.launcher.open(&url).await {
            error!("Opening WhatsApp link failed: {}", e);
            return Err(DispatchError::Unavailable(
                "WhatsApp could not be opened".to_string(),
            ));
        }

        info!("Opened WhatsApp chat with {}", number);
        Ok(Dispatched {
            dispatch_id: Uuid::new_v4(),
            channel: Channel::WhatsApp,
            recipient: number,
            delivery: Delivery::LinkOpened,
            parts: 0,
        })
    }
}

pub fn compose_url(phone: &str, message: &str) -> String {
    format!(
        "smsto:{}?body={}",
        urlencoding::encode(phone),
        urlencoding::encode(message)
    )
}

pub fn whatsapp_url(endpoint: &str, number: &str, message: &str) -> String {
    format!(
        "{}?phone={}&text={}",
        endpoint,
        urlencoding::encode(number),
        urlencoding::encode(message)
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::config::DEFAULT_ALERT_MESSAGE;

    #[derive(Debug, PartialEq)]
    enum SmsCall {
        Single(String, String),
        Multipart(String, Vec<String>),
    }

    #[derive(Default)]
    struct FakeSms {
        fail: bool,
        /// Multipart sends stop after this many parts.
        partial_after: Option<usize>,
        calls: Mutex<Vec<SmsCall>>,
    }

    #[async_trait]
    impl SmsSender for FakeSms {
        async fn send(&self, number: &str, body: &str) -> Result<(), TransportError> {
            self.calls
                .lock()
                .unwrap()
                .push(SmsCall::Single(number.into(), body.into()));
            if self.fail {
                return Err(TransportError::Other("radio off".into()));
            }
            Ok(())
        }

        async fn send_multipart(
            &self,
            number: &str,
            parts: &[String],
        ) -> Result<(), TransportError> {
            self.calls
                .lock()
                .unwrap()
                .push(SmsCall::Multipart(number.into(), parts.to_vec()));
            if let Some(sent) = self.partial_after {
                return Err(TransportError::PartialSend {
                    sent,
                    total: parts.len(),
                    source: Box::new(TransportError::Other("modem reset".into())),
                });
            }
            if self.fail {
                return Err(TransportError::Other("radio off".into()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeLauncher {
        resolvable: bool,
        opened: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LinkLauncher for FakeLauncher {
        fn can_resolve(&self, _url: &str) -> bool {
            self.resolvable
        }

        async fn open(&self, url: &str) -> Result<(), TransportError> {
            if !self.resolvable {
                return Err(TransportError::NoHandler(url.into()));
            }
            self.opened.lock().unwrap().push(url.into());
            Ok(())
        }
    }

    struct FakePermission {
        granted: bool,
        requested: Mutex<usize>,
    }

    impl SmsPermission for FakePermission {
        fn is_granted(&self) -> bool {
            self.granted
        }

        fn request(&self) {
            *self.requested.lock().unwrap() += 1;
        }
    }

    struct Harness {
        sms: Arc<FakeSms>,
        launcher: Arc<FakeLauncher>,
        permission: Arc<FakePermission>,
        router: DispatchRouter,
    }

    fn harness(
        config: DispatchConfig,
        sms_fails: bool,
        granted: bool,
        resolvable: bool,
    ) -> Harness {
        let sms = Arc::new(FakeSms {
            fail: sms_fails,
            ..Default::default()
        });
        let launcher = Arc::new(FakeLauncher {
            resolvable,
            ..Default::default()
        });
        let permission = Arc::new(FakePermission {
            granted,
            requested: Mutex::new(0),
        });
        let router = DispatchRouter::new(
            &config,
            sms.clone(),
            launcher.clone(),
            permission.clone(),
        );
        Harness {
            sms,
            launcher,
            permission,
            router,
        }
    }

    fn default_harness() -> Harness {
        harness(DispatchConfig::default(), false, true, true)
    }

    #[test]
    fn parses_channel_selectors() {
        assert_eq!("sms".parse::<Channel>().unwrap(), Channel::Sms);
        assert_eq!("SMS".parse::<Channel>().unwrap(), Channel::Sms);
        assert_eq!("sendSMS".parse::<Channel>().unwrap(), Channel::Sms);
        assert_eq!("WhatsApp".parse::<Channel>().unwrap(), Channel::WhatsApp);
        assert_eq!("sendWhatsApp".parse::<Channel>().unwrap(), Channel::WhatsApp);
        assert!(matches!(
            "telegram".parse::<Channel>(),
            Err(DispatchError::NotImplemented(_))
        ));
    }

    #[tokio::test]
    async fn empty_phone_is_invalid_for_both_channels() {
        let h = default_harness();
        for channel in [Channel::Sms, Channel::WhatsApp] {
            let result = h.router.dispatch(DispatchRequest::new(channel, "", "help")).await;
            assert!(matches!(result, Err(DispatchError::InvalidPhone(_))));
        }
        assert!(h.sms.calls.lock().unwrap().is_empty());
        assert!(h.launcher.opened.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_phone_uses_default_recipient() {
        let config = DispatchConfig {
            default_recipient: Some("05550000000".to_string()),
            ..Default::default()
        };
        let h = harness(config, false, true, true);
        let sent = h
            .router
            .dispatch(DispatchRequest::new(Channel::Sms, "  ", "help"))
            .await
            .unwrap();
        assert_eq!(sent.recipient, "+905550000000");
    }

    #[tokio::test]
    async fn sms_normalizes_and_defaults_message() {
        let h = default_harness();
        let sent = h
            .router
            .dispatch(DispatchRequest::new(Channel::Sms, "05551234567", ""))
            .await
            .unwrap();

        assert_eq!(sent.recipient, "+905551234567");
        assert_eq!(sent.delivery, Delivery::Direct);
        assert_eq!(sent.parts, 1);
        assert_eq!(
            *h.sms.calls.lock().unwrap(),
            vec![SmsCall::Single(
                "+905551234567".into(),
                DEFAULT_ALERT_MESSAGE.into()
            )]
        );
    }

    #[tokio::test]
    async fn long_sms_uses_multipart_path() {
        let h = default_harness();
        let message = "help ".repeat(50);
        let sent = h
            .router
            .dispatch(DispatchRequest::new(Channel::Sms, "+15551234567", message.clone()))
            .await
            .unwrap();

        assert_eq!(sent.parts, 2);
        let calls = h.sms.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            SmsCall::Multipart(number, parts) => {
                assert_eq!(number, "+15551234567");
                assert_eq!(parts.concat(), message);
            }
            other => panic!("expected multipart send, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn failed_sms_falls_back_to_compose() {
        let h = harness(DispatchConfig::default(), true, true, true);
        let sent = h
            .router
            .dispatch(DispatchRequest::new(Channel::Sms, "05551234567", "help me"))
            .await
            .unwrap();

        assert_eq!(sent.delivery, Delivery::ComposeFallback);
        assert_eq!(sent.recipient, "+905551234567");
        assert_eq!(
            *h.launcher.opened.lock().unwrap(),
            vec!["smsto:05551234567?body=help%20me".to_string()]
        );
    }

    #[tokio::test]
    async fn missing_permission_requests_and_opens_compose() {
        let h = harness(DispatchConfig::default(), false, false, true);
        let sent = h
            .router
            .dispatch(DispatchRequest::new(Channel::Sms, "5551234567", ""))
            .await
            .unwrap();

        assert_eq!(sent.delivery, Delivery::ComposeFallback);
        assert_eq!(*h.permission.requested.lock().unwrap(), 1);
        assert!(h.sms.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn compose_without_handler_is_unavailable() {
        let h = harness(DispatchConfig::default(), true, true, false);
        let result = h
            .router
            .dispatch(DispatchRequest::new(Channel::Sms, "05551234567", "help"))
            .await;
        assert!(matches!(result, Err(DispatchError::Unavailable(_))));
    }

    #[tokio::test]
    async fn whatsapp_opens_link() {
        let h = default_harness();
        let sent = h
            .router
            .dispatch(DispatchRequest::new(
                Channel::WhatsApp,
                "+905551234567",
                "I need help & fast",
            ))
            .await
            .unwrap();

        assert_eq!(sent.recipient, "905551234567");
        assert_eq!(sent.delivery, Delivery::LinkOpened);
        assert_eq!(
            *h.launcher.opened.lock().unwrap(),
            vec![
                "https://api.whatsapp.com/send?phone=905551234567&text=I%20need%20help%20%26%20fast"
                    .to_string()
            ]
        );
    }

    #[tokio::test]
    async fn whatsapp_keeps_empty_message_empty() {
        let h = default_harness();
        h.router
            .dispatch(DispatchRequest::new(Channel::WhatsApp, "5551234567", ""))
            .await
            .unwrap();
        assert_eq!(
            *h.launcher.opened.lock().unwrap(),
            vec!["https://api.whatsapp.com/send?phone=905551234567&text=".to_string()]
        );
    }

    #[tokio::test]
    async fn whatsapp_without_handler_is_unavailable() {
        let h = harness(DispatchConfig::default(), false, true, false);
        let result = h
            .router
            .dispatch(DispatchRequest::new(Channel::WhatsApp, "5551234567", "test"))
            .await;
        assert!(matches!(result, Err(DispatchError::Unavailable(_))));
    }

    #[tokio::test]
    async fn partial_multipart_composes_only_the_rest() {
        let sms = Arc::new(FakeSms {
            partial_after: Some(1),
            ..Default::default()
        });
        let launcher = Arc::new(FakeLauncher {
            resolvable: true,
            ..Default::default()
        });
        let permission = Arc::new(FakePermission {
            granted: true,
            requested: Mutex::new(0),
        });
        let router = DispatchRouter::new(
            &DispatchConfig::default(),
            sms.clone(),
            launcher.clone(),
            permission,
        );

        let message = format!("{}{}", "a".repeat(153), "b".repeat(20));
        let sent = router
            .dispatch(DispatchRequest::new(Channel::Sms, "05551234567", message))
            .await
            .unwrap();

        assert_eq!(sent.delivery, Delivery::ComposeFallback);
        assert_eq!(sent.parts, 1);
        assert_eq!(
            *launcher.opened.lock().unwrap(),
            vec![format!("smsto:05551234567?body={}", "b".repeat(20))]
        );
    }

    #[tokio::test]
    async fn whatsapp_phone_cannot_inject_query_parameters() {
        let h = default_harness();
        let sent = h
            .router
            .dispatch(DispatchRequest::new(Channel::WhatsApp, "555&text=x", "help"))
            .await
            .unwrap();

        assert_eq!(sent.recipient, "90555&text=x");
        assert_eq!(
            *h.launcher.opened.lock().unwrap(),
            vec!["https://api.whatsapp.com/send?phone=90555%26text%3Dx&text=help".to_string()]
        );
    }

    #[tokio::test]
    async fn named_dispatch_rejects_unknown_channel() {
        let h = default_harness();
        let result = h
            .router
            .dispatch_named("carrier-pigeon", Some("05551234567"), None)
            .await;
        assert!(matches!(result, Err(DispatchError::NotImplemented(_))));
    }
}
