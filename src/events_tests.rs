//! Unit tests for signal envelopes - what gets published and persisted.

#[cfg(test)]
mod events_tests {
    use crate::analytics::signal::{AlertType, ImbalanceSignal, PatternSignal, WhaleSignal, WhaleType};
    use crate::analytics::{imbalance::imbalance_from_quantities, PatternResult, WhaleAlert};
    use crate::events::*;
    use chrono::{TimeZone, Utc};
    use serde_json::Value;

    fn ts() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 2, 4, 1, 0).unwrap()
    }

    fn whale() -> WhaleAlert {
        WhaleAlert {
            whale_type: WhaleType::MegaWhale,
            alert_type: AlertType::OiJump,
            alert_value: 25_000.0,
            signal: WhaleSignal::Bullish,
        }
    }

    #[test]
    fn test_envelope_json_shape() {
        let envelope = SignalEnvelope::new(ts(), "NSE_FO|43885", SignalPayload::Whale(whale()));
        let json: Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();

        assert_eq!(json["instrument_key"], "NSE_FO|43885");
        assert_eq!(json["kind"], "whale");
        assert_eq!(json["data"]["whale_type"], "Mega Whale");
        assert_eq!(json["data"]["alert_type"], "OI Jump");
        assert_eq!(json["data"]["signal"], "Bullish");
        assert_eq!(json["data"]["alert_value"], 25000.0);
        assert!(json["timestamp"].as_str().unwrap().starts_with("2024-05-02T04:01:00"));
    }

    #[test]
    fn test_envelope_roundtrip() {
        let envelope = SignalEnvelope::new(
            ts(),
            "NSE_FO|43885",
            SignalPayload::Imbalance(imbalance_from_quantities(2000, 1000, 101.5)),
        );
        let back: SignalEnvelope = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(back, envelope);
    }

    #[test]
    fn test_payload_tables() {
        let pattern = PatternResult::insufficient_data();
        assert_eq!(SignalPayload::Pattern(pattern.clone()).table(), "market_patterns");
        assert_eq!(SignalPayload::Panic(pattern).table(), "panic_signals");
        assert_eq!(
            SignalPayload::Imbalance(imbalance_from_quantities(1, 1, 1.0)).table(),
            "order_imbalance"
        );
        assert_eq!(SignalPayload::Greeks(Default::default()).table(), "greeks_momentum");
        assert_eq!(SignalPayload::Whale(whale()).table(), "whale_alerts");
    }

    #[test]
    fn test_signal_labels() {
        let mut pattern = PatternResult::insufficient_data();
        pattern.signal = PatternSignal::PanicBuy;
        assert_eq!(SignalPayload::Panic(pattern).signal_label(), "PANIC BUY");

        let imbalance = imbalance_from_quantities(2000, 1000, 1.0);
        assert_eq!(imbalance.signal, ImbalanceSignal::BidHeavy);
        assert_eq!(SignalPayload::Imbalance(imbalance).signal_label(), "Bullish (Bid Heavy)");

        assert_eq!(SignalPayload::Greeks(Default::default()).signal_label(), "WAIT");
        assert_eq!(SignalPayload::Whale(whale()).kind(), "whale");
    }
}
