//! Typed signal labels.
//!
//! Every label an analyzer emits is an enum that serializes to its
//! human-readable form. Direction is decided once, where the label is
//! produced, so downstream consumers never inspect label text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Market direction a signal leans towards
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

impl Direction {
    /// +1 for bullish, -1 for bearish, 0 otherwise
    pub fn sign(self) -> f64 {
        match self {
            Direction::Bullish => 1.0,
            Direction::Bearish => -1.0,
            Direction::Neutral => 0.0,
        }
    }
}

macro_rules! labelled_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $label)] $variant),+
        }

        impl $name {
            pub fn label(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }
    };
}

labelled_enum!(
    /// Order-flow classification of one window
    Pattern {
        InsufficientData => "Insufficient Data",
        PanicShortCovering => "Panic (Short Covering)",
        LowVolume => "Low Volume",
        Neutral => "Neutral",
        LongBuildup => "Long Buildup",
        ShortCovering => "Short Covering",
        ShortBuildup => "Short Buildup",
        LongUnwinding => "Long Unwinding",
    }
);

labelled_enum!(
    PatternSignal {
        Neutral => "Neutral",
        PanicBuy => "PANIC BUY",
        Skip => "Skip",
        Churn => "Churn",
        Bullish => "Bullish",
        VeryBullish => "Very Bullish",
        Bearish => "Bearish",
    }
);

impl PatternSignal {
    pub fn direction(&self) -> Direction {
        match self {
            PatternSignal::PanicBuy | PatternSignal::Bullish | PatternSignal::VeryBullish => {
                Direction::Bullish
            }
            PatternSignal::Bearish => Direction::Bearish,
            PatternSignal::Neutral | PatternSignal::Skip | PatternSignal::Churn => Direction::Neutral,
        }
    }
}

labelled_enum!(
    ImbalanceSignal {
        InsufficientData => "Insufficient Data",
        Neutral => "Neutral",
        BidHeavy => "Bullish (Bid Heavy)",
        AskHeavy => "Bearish (Ask Heavy)",
    }
);

impl ImbalanceSignal {
    pub fn direction(&self) -> Direction {
        match self {
            ImbalanceSignal::BidHeavy => Direction::Bullish,
            ImbalanceSignal::AskHeavy => Direction::Bearish,
            ImbalanceSignal::InsufficientData | ImbalanceSignal::Neutral => Direction::Neutral,
        }
    }
}

labelled_enum!(
    MomentumType {
        ExplosiveBullish => "Explosive Bullish",
        StrongBullish => "Strong Bullish",
        ModerateBullish => "Moderate Bullish",
        Neutral => "Neutral",
        ModerateBearish => "Moderate Bearish",
        StrongBearish => "Strong Bearish",
        ExplosiveBearish => "Explosive Bearish",
    }
);

labelled_enum!(
    MomentumSignal {
        StrongBuy => "STRONG BUY",
        Buy => "BUY",
        BuyWait => "BUY/WAIT",
        Wait => "WAIT",
        SellWait => "SELL/WAIT",
        Sell => "SELL",
        StrongSell => "STRONG SELL",
    }
);

impl MomentumSignal {
    pub fn direction(&self) -> Direction {
        match self {
            MomentumSignal::StrongBuy | MomentumSignal::Buy | MomentumSignal::BuyWait => {
                Direction::Bullish
            }
            MomentumSignal::StrongSell | MomentumSignal::Sell | MomentumSignal::SellWait => {
                Direction::Bearish
            }
            MomentumSignal::Wait => Direction::Neutral,
        }
    }
}

labelled_enum!(
    WhaleType {
        SmallWhale => "Small Whale",
        MediumWhale => "Medium Whale",
        LargeWhale => "Large Whale",
        MegaWhale => "Mega Whale",
        VolumeWhale => "Volume Whale",
        LimitWhale => "Limit Whale",
    }
);

labelled_enum!(
    AlertType {
        OiJump => "OI Jump",
        OiDrop => "OI Drop",
        VolumeSpike => "Volume Spike",
        BidWall => "Bid Wall",
        AskWall => "Ask Wall",
    }
);

labelled_enum!(
    WhaleSignal {
        Bullish => "Bullish",
        Bearish => "Bearish",
        Neutral => "Neutral",
        BullishSupport => "Bullish Support",
        BearishResistance => "Bearish Resistance",
    }
);

impl WhaleSignal {
    pub fn direction(&self) -> Direction {
        match self {
            WhaleSignal::Bullish | WhaleSignal::BullishSupport => Direction::Bullish,
            WhaleSignal::Bearish | WhaleSignal::BearishResistance => Direction::Bearish,
            WhaleSignal::Neutral => Direction::Neutral,
        }
    }
}

labelled_enum!(
    SentimentLabel {
        ExtremeBullish => "Extreme Bullish",
        Bullish => "Bullish",
        Neutral => "Neutral",
        Bearish => "Bearish",
        ExtremeBearish => "Extreme Bearish",
    }
);

labelled_enum!(
    TradeSignal {
        Buy => "BUY",
        Sell => "SELL",
        Wait => "WAIT",
    }
);

labelled_enum!(
    MarketRegime {
        OneSidedTrend => "One-Sided Trend",
        HighVolatility => "High Volatility / Choppy",
        Sideways => "Sideways / Low Conviction",
    }
);
