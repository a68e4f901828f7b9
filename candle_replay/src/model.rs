use serde::{Deserialize, Serialize};

/// One OHLC observation. `time` is unix seconds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    pub fn is_up(&self) -> bool {
        self.close >= self.open
    }
}

/// RGBA colour, alpha in 0.0..=1.0 like the CSS `rgba()` notation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Rgba {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const GREEN: Rgba = Rgba::rgb(0, 128, 0);
    pub const RED: Rgba = Rgba::rgb(255, 0, 0);
    pub const ORANGE: Rgba = Rgba::rgb(255, 165, 0);
    pub const BUY_ZONE: Rgba = Rgba::rgba(0, 255, 0, 0.15);
    pub const SELL_ZONE: Rgba = Rgba::rgba(255, 0, 0, 0.15);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkerPosition {
    BelowBar,
    AboveBar,
    InBar,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MarkerShape {
    ArrowUp,
    ArrowDown,
    Circle,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub time: i64,
    pub position: MarkerPosition,
    pub color: Rgba,
    pub shape: MarkerShape,
    pub text: String,
}

impl Marker {
    pub fn long(time: i64) -> Self {
        Self {
            time,
            position: MarkerPosition::BelowBar,
            color: Rgba::GREEN,
            shape: MarkerShape::ArrowUp,
            text: "LONG".to_string(),
        }
    }

    pub fn short(time: i64) -> Self {
        Self {
            time,
            position: MarkerPosition::AboveBar,
            color: Rgba::RED,
            shape: MarkerShape::ArrowDown,
            text: "SHORT".to_string(),
        }
    }

    pub fn neutral(time: i64) -> Self {
        Self {
            time,
            position: MarkerPosition::InBar,
            color: Rgba::ORANGE,
            shape: MarkerShape::Circle,
            text: "None".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BandSide {
    Buy,
    Sell,
}

impl BandSide {
    pub fn color(self) -> Rgba {
        match self {
            BandSide::Buy => Rgba::BUY_ZONE,
            BandSide::Sell => Rgba::SELL_ZONE,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            BandSide::Buy => "Buy_Area",
            BandSide::Sell => "Sell_Area",
        }
    }
}

/// A price interval collapsed from a buy/sell area array.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub time: i64,
    pub low: f64,
    pub high: f64,
    pub side: BandSide,
    pub color: Rgba,
}

impl Band {
    pub fn new(time: i64, low: f64, high: f64, side: BandSide) -> Self {
        Self {
            time,
            low,
            high,
            side,
            color: side.color(),
        }
    }
}

/// Inclusive unix-second range used for the chart's visible window.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: i64,
    pub to: i64,
}

impl TimeRange {
    pub fn contains(&self, t: i64) -> bool {
        t >= self.from && t <= self.to
    }
}
