use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analytics::{
    GreeksMomentumResult, ImbalanceResult, PatternResult, SentimentResult, WhaleAlert,
};

/// One analyzer result, tagged with the table it lands in.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum SignalPayload {
    Pattern(PatternResult),
    Panic(PatternResult),
    Imbalance(ImbalanceResult),
    Greeks(GreeksMomentumResult),
    Whale(WhaleAlert),
    Sentiment(SentimentResult),
}

impl SignalPayload {
    pub fn table(&self) -> &'static str {
        match self {
            SignalPayload::Pattern(_) => "market_patterns",
            SignalPayload::Panic(_) => "panic_signals",
            SignalPayload::Imbalance(_) => "order_imbalance",
            SignalPayload::Greeks(_) => "greeks_momentum",
            SignalPayload::Whale(_) => "whale_alerts",
            SignalPayload::Sentiment(_) => "market_sentiment",
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SignalPayload::Pattern(_) => "pattern",
            SignalPayload::Panic(_) => "panic",
            SignalPayload::Imbalance(_) => "imbalance",
            SignalPayload::Greeks(_) => "greeks",
            SignalPayload::Whale(_) => "whale",
            SignalPayload::Sentiment(_) => "sentiment",
        }
    }

    /// Human-readable signal label stored next to the payload
    pub fn signal_label(&self) -> &'static str {
        match self {
            SignalPayload::Pattern(p) | SignalPayload::Panic(p) => p.signal.label(),
            SignalPayload::Imbalance(i) => i.signal.label(),
            SignalPayload::Greeks(g) => g.signal.label(),
            SignalPayload::Whale(w) => w.signal.label(),
            SignalPayload::Sentiment(s) => s.sentiment.label(),
        }
    }
}

/// A result stamped with when and for which instrument it was produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalEnvelope {
    pub timestamp: DateTime<Utc>,
    pub instrument_key: String,
    #[serde(flatten)]
    pub payload: SignalPayload,
}

impl SignalEnvelope {
    pub fn new(timestamp: DateTime<Utc>, instrument_key: impl Into<String>, payload: SignalPayload) -> Self {
        Self {
            timestamp,
            instrument_key: instrument_key.into(),
            payload,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// What goes out on the bus
#[derive(Clone, Debug, PartialEq)]
pub struct Published {
    pub topic: String,
    pub payload: String,
}
