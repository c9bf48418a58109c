use std::io::Read;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};

use super::domain::{RiskTier, GENERAL_CATEGORY};
use super::repository::{RepositoryError, RiskTierLookup};

const BUNDLED_TIERS: &str = include_str!("../../data/risk_tiers.csv");

#[derive(Debug, thiserror::Error)]
pub enum TierTableError {
    #[error("failed to read risk tier table: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid risk tier CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("tier `{risk_level}` has max_score {max} below min_score {min}")]
    InvertedRange { risk_level: String, min: u32, max: u32 },
}

#[derive(Debug, Deserialize)]
struct TierRow {
    min_score: u32,
    max_score: u32,
    risk_level: String,
    advice: String,
    #[serde(default, deserialize_with = "semicolon_list")]
    foods_to_eat: Vec<String>,
    #[serde(default, deserialize_with = "semicolon_list")]
    foods_to_avoid: Vec<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    condition: Option<String>,
}

fn semicolon_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect())
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty() && value != GENERAL_CATEGORY))
}

/// In-memory tier table backing the [`RiskTierLookup`] contract.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskTierTable {
    tiers: Vec<RiskTier>,
}

impl RiskTierTable {
    pub fn new(tiers: Vec<RiskTier>) -> Result<Self, TierTableError> {
        for tier in &tiers {
            if tier.max_score < tier.min_score {
                return Err(TierTableError::InvertedRange {
                    risk_level: tier.risk_level.clone(),
                    min: tier.min_score,
                    max: tier.max_score,
                });
            }
        }
        Ok(Self { tiers })
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TierTableError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut tiers = Vec::new();

        for record in csv_reader.deserialize::<TierRow>() {
            let row = record?;
            tiers.push(RiskTier {
                min_score: row.min_score,
                max_score: row.max_score,
                risk_level: row.risk_level,
                advice: row.advice,
                foods_to_eat: row.foods_to_eat,
                foods_to_avoid: row.foods_to_avoid,
                condition_scope: row.condition,
            });
        }

        Self::new(tiers)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, TierTableError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    pub fn bundled() -> Result<Self, TierTableError> {
        Self::from_reader(BUNDLED_TIERS.as_bytes())
    }

    pub fn tiers(&self) -> &[RiskTier] {
        &self.tiers
    }

    /// Scoped tiers win over unscoped ones for a candidate; an unscoped
    /// lookup only considers tiers without a condition scope.
    pub fn lookup(&self, score: u32, scope: Option<&str>) -> Option<&RiskTier> {
        let in_range = || self.tiers.iter().filter(move |tier| tier.contains(score));

        match scope {
            Some(label) => in_range()
                .find(|tier| tier.condition_scope.as_deref() == Some(label))
                .or_else(|| in_range().find(|tier| tier.condition_scope.is_none())),
            None => in_range().find(|tier| tier.condition_scope.is_none()),
        }
    }
}

#[async_trait]
impl RiskTierLookup for RiskTierTable {
    async fn find_tier(
        &self,
        score: u32,
        scope: Option<&str>,
    ) -> Result<Option<RiskTier>, RepositoryError> {
        Ok(self.lookup(score, scope).cloned())
    }
}
