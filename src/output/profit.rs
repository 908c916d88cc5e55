//! Resale profitability estimates

use std::fmt;

use crate::output::stats::ProductStats;

/// Default marketplace fees as a fraction of the sale price
pub const DEFAULT_FEE_RATE: f64 = 0.13;

/// Margin figures for reselling at the observed average price
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProfitBreakdown {
    /// Sale price minus cost, before fees
    pub gross_margin_eur: f64,
    pub gross_margin_percent: f64,
    pub fees_eur: f64,
    pub net_margin_eur: f64,
    pub net_margin_percent: f64,
    /// Net margin over cost, in percent
    pub roi: f64,
    pub profitable: bool,
}

/// Computes margins net of marketplace fees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfitCalculator {
    fee_rate: f64,
}

impl Default for ProfitCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfitCalculator {
    pub fn new() -> Self {
        Self::with_fee_rate(DEFAULT_FEE_RATE)
    }

    pub fn with_fee_rate(fee_rate: f64) -> Self {
        Self {
            fee_rate: fee_rate.clamp(0.0, 0.99),
        }
    }

    pub fn fee_rate(&self) -> f64 {
        self.fee_rate
    }

    /// Margins for selling at `sale_price` something bought at `cost`
    pub fn calculate(&self, sale_price: f64, cost: f64) -> ProfitBreakdown {
        let gross = sale_price - cost;
        let fees = sale_price * self.fee_rate;
        let net = gross - fees;
        let percent_of_cost = |v: f64| if cost > 0.0 { v / cost * 100.0 } else { 0.0 };

        ProfitBreakdown {
            gross_margin_eur: gross,
            gross_margin_percent: percent_of_cost(gross),
            fees_eur: fees,
            net_margin_eur: net,
            net_margin_percent: percent_of_cost(net),
            roi: percent_of_cost(net),
            profitable: net > 0.0,
        }
    }

    /// Margins for a product at its average price against MSRP
    ///
    /// Products without a positive MSRP get an all-zero, unprofitable result.
    pub fn for_stats(&self, stats: &ProductStats) -> ProfitBreakdown {
        match stats.msrp {
            Some(msrp) if msrp > 0.0 => self.calculate(stats.avg_price, msrp),
            _ => ProfitBreakdown::default(),
        }
    }

    /// Minimum sale price that recovers `cost` after fees
    pub fn break_even_price(&self, cost: f64) -> f64 {
        cost / (1.0 - self.fee_rate)
    }

    /// Minimum sale price that yields `target_margin_percent` over `cost`
    pub fn minimum_price_for_margin(&self, cost: f64, target_margin_percent: f64) -> f64 {
        cost * (1.0 + target_margin_percent / 100.0) / (1.0 - self.fee_rate)
    }
}

/// Coarse profitability tier by margin percent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfitabilityLevel {
    Excellent,
    Good,
    Marginal,
    Loss,
    Unknown,
}

impl ProfitabilityLevel {
    pub fn from_margin(margin_percent: Option<f64>) -> Self {
        match margin_percent {
            None => Self::Unknown,
            Some(m) if m > 30.0 => Self::Excellent,
            Some(m) if m > 15.0 => Self::Good,
            Some(m) if m >= 0.0 => Self::Marginal,
            Some(_) => Self::Loss,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Marginal => "marginal",
            Self::Loss => "loss",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProfitabilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signed euro amount, e.g. `+12.50€`
pub fn format_margin_eur(margin: Option<f64>) -> String {
    match margin {
        Some(m) if m > 0.0 => format!("+{:.2}€", m),
        Some(m) => format!("{:.2}€", m),
        None => "N/A".to_string(),
    }
}

/// Signed percentage, e.g. `+23.4%`
pub fn format_margin_percent(margin: Option<f64>) -> String {
    match margin {
        Some(m) if m > 0.0 => format!("+{:.1}%", m),
        Some(m) => format!("{:.1}%", m),
        None => "N/A".to_string(),
    }
}
