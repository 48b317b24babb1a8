use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::Datelike;
use serde::Deserialize;

use crate::error::{PainelError, Result};

pub const MONTHS: usize = 12;

/// One account line of the DRE as delivered by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountRow {
    pub level1: String,
    pub level2: Option<String>,
    pub level3: Option<String>,
    /// Index 0 is January.
    pub monthly: [f64; MONTHS],
    pub total: f64,
}

impl AccountRow {
    pub fn new(level1: impl Into<String>, monthly: [f64; MONTHS]) -> Self {
        Self {
            level1: level1.into(),
            level2: None,
            level3: None,
            total: monthly.iter().sum(),
            monthly,
        }
    }

    pub fn with_level2(mut self, level2: impl Into<String>) -> Self {
        self.level2 = Some(level2.into());
        self
    }

    pub fn with_level3(mut self, level3: impl Into<String>) -> Self {
        self.level3 = Some(level3.into());
        self
    }

    /// Value for a month in 1..=12; anything else reads as zero.
    pub fn value(&self, month: u32) -> f64 {
        match month {
            1..=12 => self.monthly[(month - 1) as usize],
            _ => 0.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Month selection
// ---------------------------------------------------------------------------

/// Months (1..=12) whose values feed the Total / Average / Var% columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonthSelection(BTreeSet<u32>);

impl MonthSelection {
    pub fn all() -> Self {
        Self((1..=12).collect())
    }

    pub fn none() -> Self {
        Self(BTreeSet::new())
    }

    /// Current year: only the months strictly before `today`'s month.
    /// Any other year: all twelve.
    pub fn default_for(year: i32, today: chrono::NaiveDate) -> Self {
        if year == today.year() {
            Self((1..today.month()).collect())
        } else {
            Self::all()
        }
    }

    pub fn from_months(months: impl IntoIterator<Item = u32>) -> Result<Self> {
        let mut set = BTreeSet::new();
        for m in months {
            if !(1..=12).contains(&m) {
                return Err(PainelError::InvalidMonth(m.to_string()));
            }
            set.insert(m);
        }
        Ok(Self(set))
    }

    /// Parse `all`, or a comma list of months and ranges: `1,2,6-9`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::all());
        }
        let mut months = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if let Some((from, to)) = part.split_once('-') {
                let from = parse_month(from)?;
                let to = parse_month(to)?;
                if from > to {
                    return Err(PainelError::InvalidMonth(part.to_string()));
                }
                months.extend(from..=to);
            } else {
                months.push(parse_month(part)?);
            }
        }
        Self::from_months(months)
    }

    pub fn contains(&self, month: u32) -> bool {
        self.0.contains(&month)
    }

    pub fn toggle(&mut self, month: u32) {
        if !(1..=12).contains(&month) {
            return;
        }
        if !self.0.remove(&month) {
            self.0.insert(month);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MonthSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len() == MONTHS {
            return write!(f, "all");
        }
        if self.is_empty() {
            return write!(f, "none");
        }
        let list: Vec<String> = self.0.iter().map(|m| m.to_string()).collect();
        write!(f, "{}", list.join(","))
    }
}

fn parse_month(s: &str) -> Result<u32> {
    let m: u32 = s
        .trim()
        .parse()
        .map_err(|_| PainelError::InvalidMonth(s.trim().to_string()))?;
    if (1..=12).contains(&m) {
        Ok(m)
    } else {
        Err(PainelError::InvalidMonth(m.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Report variant selecting which transaction subset feeds the DRE.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Modelo {
    #[default]
    Cmv,
    Emissao,
    Entrada,
    Pagamento,
}

impl Modelo {
    pub const ALL: [Modelo; 4] = [
        Modelo::Cmv,
        Modelo::Emissao,
        Modelo::Entrada,
        Modelo::Pagamento,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Modelo::Cmv => "CMV",
            Modelo::Emissao => "EMISSAO",
            Modelo::Entrada => "ENTRADA",
            Modelo::Pagamento => "PAGAMENTO",
        }
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|m| *m == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Modelo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DreQuery {
    pub organization_id: i64,
    pub modelo: Modelo,
    pub year: i32,
    pub tipo: String,
}

impl DreQuery {
    pub fn realizado(organization_id: i64, modelo: Modelo, year: i32) -> Self {
        Self {
            organization_id,
            modelo,
            year,
            tipo: "REALIZADO".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DreResponse {
    #[serde(default)]
    data: Vec<WireRow>,
}

#[derive(Debug, Deserialize)]
struct WireRow {
    nivel1: String,
    #[serde(default)]
    nivel2: Option<String>,
    #[serde(default)]
    nivel3: Option<String>,
    #[serde(default)]
    valores: BTreeMap<String, serde_json::Value>,
}

impl From<WireRow> for AccountRow {
    fn from(raw: WireRow) -> Self {
        let mut monthly = [0.0; MONTHS];
        let mut total = None;
        for (key, value) in &raw.valores {
            let Some(n) = value.as_f64() else { continue };
            if key == "total" {
                total = Some(n);
            } else if let Ok(m @ 1..=12) = key.parse::<u32>() {
                monthly[(m - 1) as usize] = n;
            }
        }
        Self {
            level1: raw.nivel1,
            level2: non_blank(raw.nivel2),
            level3: non_blank(raw.nivel3),
            total: total.unwrap_or_else(|| monthly.iter().sum()),
            monthly,
        }
    }
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

/// Decode a `{ "data": [...] }` DRE document.
pub fn parse_dre_document(json: &str) -> Result<Vec<AccountRow>> {
    let doc: DreResponse = serde_json::from_str(json)?;
    Ok(doc.data.into_iter().map(AccountRow::from).collect())
}
