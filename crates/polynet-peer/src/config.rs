use std::time::Duration;

use polynet_frame::FrameConfig;

use crate::error::{PeerError, Result};

/// Default delay between liveness challenges.
pub const DEFAULT_CHALLENGE_INTERVAL: Duration = Duration::from_secs(2);

/// Default time a peer has to echo a challenge.
pub const DEFAULT_CHALLENGE_TIMEOUT: Duration = Duration::from_millis(1500);

/// Default period for reaping finished connection tasks.
pub const DEFAULT_HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(5);

/// Timing of the challenge/response heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessConfig {
    /// Delay between the start of consecutive challenges. Default: 2 s.
    pub interval: Duration,
    /// How long a challenge may stay unanswered. Default: 1.5 s.
    pub timeout: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_CHALLENGE_INTERVAL,
            timeout: DEFAULT_CHALLENGE_TIMEOUT,
        }
    }
}

impl LivenessConfig {
    /// The timeout must be non-zero and shorter than the interval, so at
    /// most one challenge is ever outstanding.
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() || self.timeout.is_zero() {
            return Err(PeerError::InvalidConfig(
                "liveness interval and timeout must be non-zero".to_string(),
            ));
        }
        if self.timeout >= self.interval {
            return Err(PeerError::InvalidConfig(format!(
                "liveness timeout ({:?}) must be shorter than the interval ({:?})",
                self.timeout, self.interval
            )));
        }
        Ok(())
    }
}

/// What a connection does about liveness challenges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessRole {
    /// Issue challenges and close the connection when one goes unanswered.
    Challenger(LivenessConfig),
    /// Echo every challenge back unchanged.
    Responder,
    /// No liveness handling; challenges reach the handler like any message.
    Disabled,
}

/// Per-connection behaviour shared by the listener and the connector.
#[derive(Debug, Clone)]
pub struct PeerConfig {
    pub frame: FrameConfig,
    pub liveness: LivenessRole,
    /// Server only: how often finished connection tasks are reaped.
    pub housekeeping_interval: Duration,
}

impl PeerConfig {
    /// Server defaults: challenge every peer.
    pub fn server() -> Self {
        Self {
            frame: FrameConfig::default(),
            liveness: LivenessRole::Challenger(LivenessConfig::default()),
            housekeeping_interval: DEFAULT_HOUSEKEEPING_INTERVAL,
        }
    }

    /// Client defaults: answer the server's challenges.
    pub fn client() -> Self {
        Self {
            liveness: LivenessRole::Responder,
            ..Self::server()
        }
    }

    pub fn with_liveness(mut self, liveness: LivenessRole) -> Self {
        self.liveness = liveness;
        self
    }

    pub fn with_frame_config(mut self, frame: FrameConfig) -> Self {
        self.frame = frame;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let LivenessRole::Challenger(liveness) = &self.liveness {
            liveness.validate()?;
        }
        if self.housekeeping_interval.is_zero() {
            return Err(PeerError::InvalidConfig(
                "housekeeping interval must be non-zero".to_string(),
            ));
        }
        if self.frame.max_frame_size < polynet_frame::ID_SIZE {
            return Err(PeerError::InvalidConfig(format!(
                "max frame size {} cannot hold a message id",
                self.frame.max_frame_size
            )));
        }
        Ok(())
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self::server()
    }
}
