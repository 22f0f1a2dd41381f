//! Traffic generators: periodic senders and passive receivers.

use crate::scheduler::EventHandle;
use crate::AppId;
use flowsim_types::{NodeId, VirtualTime};
use std::net::Ipv4Addr;
use thiserror::Error;

/// Errors from validating a generator configuration.
///
/// Configurations are plain typed structs checked once at install time;
/// a config that fails validation never reaches the scheduler.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("send interval must be positive")]
    NonPositiveInterval,
    #[error("packet size must be non-zero")]
    ZeroPacketSize,
    #[error("max packets must be non-zero")]
    ZeroMaxPackets,
}

/// Errors from application lifecycle misuse.
///
/// Rejected synchronously at the call site, never deferred to the end of
/// the run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("application {0} was already started")]
    AlreadyStarted(AppId),
    #[error("application {0} has not been started")]
    NotStarted(AppId),
}

/// Configuration for a [`PeriodicSender`].
#[derive(Debug, Clone)]
pub struct PeriodicSenderConfig {
    /// Destination interface address.
    pub destination: Ipv4Addr,
    /// Destination port.
    pub port: u16,
    /// Payload size of each packet, in bytes.
    pub packet_size: u32,
    /// Interval between consecutive sends.
    pub interval: VirtualTime,
    /// Number of packets to send before going quiet.
    pub max_packets: u32,
}

impl PeriodicSenderConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval <= VirtualTime::ZERO {
            return Err(ConfigError::NonPositiveInterval);
        }
        if self.packet_size == 0 {
            return Err(ConfigError::ZeroPacketSize);
        }
        if self.max_packets == 0 {
            return Err(ConfigError::ZeroMaxPackets);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Started,
    Stopped,
}

/// A sender that emits fixed-size packets at a fixed interval.
///
/// On start it sends immediately, then re-arms one interval later until
/// the packet budget is spent or its stop event cancels the pending
/// send, whichever comes first.
#[derive(Debug)]
pub struct PeriodicSender {
    pub(crate) config: PeriodicSenderConfig,
    /// Interface address of the node this sender is installed on.
    pub(crate) source: Ipv4Addr,
    /// Ephemeral source port assigned at install time.
    pub(crate) source_port: u16,
    /// Packets emitted so far.
    pub(crate) sent: u32,
    /// Handle of the next scheduled send, if armed.
    pub(crate) pending_send: Option<EventHandle>,
    lifecycle: Lifecycle,
}

impl PeriodicSender {
    pub(crate) fn new(config: PeriodicSenderConfig, source: Ipv4Addr, source_port: u16) -> Self {
        Self {
            config,
            source,
            source_port,
            sent: 0,
            pending_send: None,
            lifecycle: Lifecycle::Idle,
        }
    }

    /// Packets emitted so far.
    pub fn sent(&self) -> u32 {
        self.sent
    }

    /// Source port this sender stamps on its packets.
    pub fn source_port(&self) -> u16 {
        self.source_port
    }
}

/// A receiver that consumes every packet arriving on its bound port.
///
/// It holds no state beyond its binding: received packets go straight to
/// the flow monitor with their send time carried through unchanged.
#[derive(Debug)]
pub struct PassiveReceiver {
    pub(crate) node: NodeId,
    pub(crate) port: u16,
    lifecycle: Lifecycle,
}

impl PassiveReceiver {
    pub(crate) fn new(node: NodeId, port: u16) -> Self {
        Self {
            node,
            port,
            lifecycle: Lifecycle::Idle,
        }
    }

    /// Port this receiver binds on start.
    pub fn port(&self) -> u16 {
        self.port
    }
}

/// An installed application: either a periodic sender or a passive
/// receiver, dispatched by variant.
#[derive(Debug)]
pub enum Application {
    Sender(PeriodicSender),
    Receiver(PassiveReceiver),
}

impl Application {
    fn lifecycle(&self) -> Lifecycle {
        match self {
            Self::Sender(sender) => sender.lifecycle,
            Self::Receiver(receiver) => receiver.lifecycle,
        }
    }

    fn set_lifecycle(&mut self, lifecycle: Lifecycle) {
        match self {
            Self::Sender(sender) => sender.lifecycle = lifecycle,
            Self::Receiver(receiver) => receiver.lifecycle = lifecycle,
        }
    }

    /// Record a start request. An application starts at most once.
    pub(crate) fn mark_started(&mut self, app: AppId) -> Result<(), ApplicationError> {
        match self.lifecycle() {
            Lifecycle::Idle => {
                self.set_lifecycle(Lifecycle::Started);
                Ok(())
            }
            Lifecycle::Started | Lifecycle::Stopped => Err(ApplicationError::AlreadyStarted(app)),
        }
    }

    /// Record a stop request. Only a started application can stop.
    pub(crate) fn mark_stopped(&mut self, app: AppId) -> Result<(), ApplicationError> {
        match self.lifecycle() {
            Lifecycle::Started => {
                self.set_lifecycle(Lifecycle::Stopped);
                Ok(())
            }
            Lifecycle::Idle | Lifecycle::Stopped => Err(ApplicationError::NotStarted(app)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender_config() -> PeriodicSenderConfig {
        PeriodicSenderConfig {
            destination: Ipv4Addr::new(10, 1, 2, 4),
            port: 9,
            packet_size: 2048,
            interval: VirtualTime::from_secs_f64(0.2),
            max_packets: 3,
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(sender_config().validate().is_ok());

        let mut config = sender_config();
        config.interval = VirtualTime::ZERO;
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveInterval));

        let mut config = sender_config();
        config.interval = VirtualTime::from_millis(-5);
        assert_eq!(config.validate(), Err(ConfigError::NonPositiveInterval));

        let mut config = sender_config();
        config.packet_size = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroPacketSize));

        let mut config = sender_config();
        config.max_packets = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroMaxPackets));
    }

    #[test]
    fn test_lifecycle_start_twice() {
        let mut app = Application::Receiver(PassiveReceiver::new(NodeId(0), 9));
        app.mark_started(0).unwrap();
        assert_eq!(app.mark_started(0), Err(ApplicationError::AlreadyStarted(0)));
    }

    #[test]
    fn test_lifecycle_stop_before_start() {
        let mut app = Application::Sender(PeriodicSender::new(
            sender_config(),
            Ipv4Addr::new(10, 1, 1, 1),
            49152,
        ));
        assert_eq!(app.mark_stopped(0), Err(ApplicationError::NotStarted(0)));
    }

    #[test]
    fn test_lifecycle_normal_order() {
        let mut app = Application::Receiver(PassiveReceiver::new(NodeId(0), 9));
        app.mark_started(0).unwrap();
        app.mark_stopped(0).unwrap();

        // A stopped application neither restarts nor stops again.
        assert_eq!(app.mark_started(0), Err(ApplicationError::AlreadyStarted(0)));
        assert_eq!(app.mark_stopped(0), Err(ApplicationError::NotStarted(0)));
    }
}
