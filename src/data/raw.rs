//! Raw regional input files.
//!
//! Loads the per-region housing inputs from a raw data directory and
//! inner-joins them on (`region`, `date`). Which fields are read from disk
//! and which are synthesized is decided up front by [`LoaderCapabilities`],
//! never by probing the file contents.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::loader::{read_csv, PanelLoader};
use super::panel::{Panel, PanelError};

/// Accepted spellings of the inventory column.
const INVENTORY_ALIASES: &[&str] = &["inventory", "homes_for_sale", "active_listings", "supply"];

/// Where a raw field comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    /// Read from its own file; the column must exist.
    #[default]
    Authoritative,
    /// Derived from other inputs by a fixed rule.
    Synthesized,
}

/// Raw fields that may be synthesized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawField {
    Rent,
    Population,
    MortgageRate,
    Permits,
    Inventory,
}

impl RawField {
    /// Synthesis rule applied when the field is not authoritative.
    pub fn synthesis_rule(&self) -> &'static str {
        match self {
            Self::Rent => "rent = income * 0.30 / 12",
            Self::Population => {
                "population = 1,000,000 + 5,000 * row; net_migration = 200 * row"
            }
            Self::MortgageRate => "mortgage_rate = 0.04",
            Self::Permits => "permits = population * 0.001",
            Self::Inventory => "inventory = population * 0.002",
        }
    }
}

impl fmt::Display for RawField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rent => "rent",
            Self::Population => "population",
            Self::MortgageRate => "mortgage_rate",
            Self::Permits => "permits",
            Self::Inventory => "inventory",
        };
        f.write_str(name)
    }
}

impl FromStr for RawField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rent" => Ok(Self::Rent),
            "population" | "migration" => Ok(Self::Population),
            "mortgage_rate" | "mortgage" => Ok(Self::MortgageRate),
            "permits" => Ok(Self::Permits),
            "inventory" => Ok(Self::Inventory),
            other => Err(format!("unknown raw field '{}'", other)),
        }
    }
}

/// Per-field source descriptor handed to the raw loader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderCapabilities {
    #[serde(default)]
    pub rent: FieldSource,
    #[serde(default)]
    pub population: FieldSource,
    #[serde(default)]
    pub mortgage_rate: FieldSource,
    #[serde(default)]
    pub permits: FieldSource,
    #[serde(default)]
    pub inventory: FieldSource,
}

impl LoaderCapabilities {
    /// Mark a field as synthesized.
    pub fn synthesize(mut self, field: RawField) -> Self {
        *self.source_mut(field) = FieldSource::Synthesized;
        self
    }

    pub fn source(&self, field: RawField) -> FieldSource {
        match field {
            RawField::Rent => self.rent,
            RawField::Population => self.population,
            RawField::MortgageRate => self.mortgage_rate,
            RawField::Permits => self.permits,
            RawField::Inventory => self.inventory,
        }
    }

    fn source_mut(&mut self, field: RawField) -> &mut FieldSource {
        match field {
            RawField::Rent => &mut self.rent,
            RawField::Population => &mut self.population,
            RawField::MortgageRate => &mut self.mortgage_rate,
            RawField::Permits => &mut self.permits,
            RawField::Inventory => &mut self.inventory,
        }
    }

    /// Fields that will be synthesized.
    pub fn synthesized(&self) -> Vec<RawField> {
        [
            RawField::Rent,
            RawField::Population,
            RawField::MortgageRate,
            RawField::Permits,
            RawField::Inventory,
        ]
        .into_iter()
        .filter(|f| self.source(*f) == FieldSource::Synthesized)
        .collect()
    }
}

/// Loader for the raw regional input directory.
pub struct RawDataLoader {
    raw_dir: PathBuf,
    capabilities: LoaderCapabilities,
}

impl RawDataLoader {
    pub fn new(raw_dir: impl AsRef<Path>, capabilities: LoaderCapabilities) -> Self {
        Self {
            raw_dir: raw_dir.as_ref().to_path_buf(),
            capabilities,
        }
    }

    fn path(&self, file: &str) -> PathBuf {
        self.raw_dir.join(file)
    }

    /// Load every input, join on (region, date) and keep one region.
    pub fn load_region(&self, region: &str) -> Result<Panel, PanelError> {
        for field in self.capabilities.synthesized() {
            warn!("Synthesizing {}: {}", field, field.synthesis_rule());
        }

        let price = self.load_price()?;
        let income = self.load_income()?;
        let population = self.load_population(&income)?;
        let mortgage = self.load_mortgage(&income)?;
        let rent = self.load_rent(&income)?;
        let permits = self.load_permits(&population)?;
        let inventory = self.load_inventory(&population)?;

        let keys = || [col("region"), col("date")];
        let joined = [income, population, mortgage, rent, permits, inventory]
            .into_iter()
            .fold(price, |acc, frame| {
                acc.join(frame, keys(), keys(), JoinArgs::new(JoinType::Inner))
            })
            .filter(col("region").eq(lit(region.to_string())))
            .collect()?;

        info!("Loaded {} joined rows for region {}", joined.height(), region);

        Ok(PanelLoader::new("date").from_dataframe(&joined)?.sorted_by_date())
    }

    /// Read a raw file and select key columns plus `fields` as Float64.
    fn select(
        &self,
        file: &str,
        fields: &[(&str, &str)],
    ) -> Result<LazyFrame, PanelError> {
        let df = read_csv(&self.path(file))?;
        select_from(file, df, fields)
    }

    fn load_price(&self) -> Result<LazyFrame, PanelError> {
        let df = read_csv(&self.path("housing_price.csv"))?;
        let source = if df.column("price").is_err() && df.column("value").is_ok() {
            "value"
        } else {
            "price"
        };
        select_from("housing_price.csv", df, &[(source, "price")])
    }

    fn load_income(&self) -> Result<LazyFrame, PanelError> {
        self.select("income.csv", &[("income", "income")])
    }

    fn load_population(&self, income: &LazyFrame) -> Result<LazyFrame, PanelError> {
        match self.capabilities.population {
            FieldSource::Authoritative => self.select(
                "population_migration.csv",
                &[("population", "population"), ("net_migration", "net_migration")],
            ),
            FieldSource::Synthesized => {
                let row = col("row_idx").cast(DataType::Float64);
                let mut exprs = key_exprs();
                exprs.push((lit(1_000_000.0) + row.clone() * lit(5_000.0)).alias("population"));
                exprs.push((row * lit(200.0)).alias("net_migration"));
                Ok(income.clone().with_row_index("row_idx", None).select(exprs))
            }
        }
    }

    fn load_mortgage(&self, income: &LazyFrame) -> Result<LazyFrame, PanelError> {
        match self.capabilities.mortgage_rate {
            FieldSource::Authoritative => {
                self.select("mortgage_rate.csv", &[("mortgage_rate", "mortgage_rate")])
            }
            FieldSource::Synthesized => {
                let mut exprs = key_exprs();
                exprs.push(lit(0.04).alias("mortgage_rate"));
                Ok(income.clone().select(exprs))
            }
        }
    }

    fn load_rent(&self, income: &LazyFrame) -> Result<LazyFrame, PanelError> {
        match self.capabilities.rent {
            FieldSource::Authoritative => self.select("rent.csv", &[("rent", "rent")]),
            FieldSource::Synthesized => {
                let mut exprs = key_exprs();
                exprs.push((col("income") * lit(0.3) / lit(12.0)).alias("rent"));
                Ok(income.clone().select(exprs))
            }
        }
    }

    fn load_permits(&self, population: &LazyFrame) -> Result<LazyFrame, PanelError> {
        match self.capabilities.permits {
            FieldSource::Authoritative => self.select("permits.csv", &[("permits", "permits")]),
            FieldSource::Synthesized => {
                let mut exprs = key_exprs();
                exprs.push((col("population") * lit(0.001)).alias("permits"));
                Ok(population.clone().select(exprs))
            }
        }
    }

    fn load_inventory(&self, population: &LazyFrame) -> Result<LazyFrame, PanelError> {
        match self.capabilities.inventory {
            FieldSource::Authoritative => {
                let df = read_csv(&self.path("inventory.csv"))?;
                let found = df
                    .get_column_names()
                    .into_iter()
                    .map(|s| s.to_string())
                    .find(|c| INVENTORY_ALIASES.contains(&c.to_lowercase().as_str()))
                    .ok_or_else(|| {
                        PanelError::MissingColumns(vec!["inventory.csv:inventory".to_string()])
                    })?;
                select_from("inventory.csv", df, &[(found.as_str(), "inventory")])
            }
            FieldSource::Synthesized => {
                let mut exprs = key_exprs();
                exprs.push((col("population") * lit(0.002)).alias("inventory"));
                Ok(population.clone().select(exprs))
            }
        }
    }
}

/// Select key columns plus `fields` as Float64 from an already-read file.
fn select_from(
    file: &str,
    df: DataFrame,
    fields: &[(&str, &str)],
) -> Result<LazyFrame, PanelError> {
    let present: Vec<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();

    let missing: Vec<String> = ["region", "date"]
        .iter()
        .copied()
        .chain(fields.iter().map(|(source, _)| *source))
        .filter(|c| !present.iter().any(|p| p == c))
        .map(|c| format!("{}:{}", file, c))
        .collect();
    if !missing.is_empty() {
        return Err(PanelError::MissingColumns(missing));
    }

    let mut exprs = key_exprs();
    exprs.extend(
        fields
            .iter()
            .map(|(source, target)| col(*source).cast(DataType::Float64).alias(*target)),
    );
    Ok(df.lazy().select(exprs))
}

fn key_exprs() -> Vec<Expr> {
    vec![
        col("region").cast(DataType::String),
        col("date").cast(DataType::String),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    fn base_files(dir: &Path) {
        write(
            dir,
            "housing_price.csv",
            "region,date,value\naustin,2015-01-01,250000\naustin,2015-04-01,255000\ntoronto,2015-01-01,520000\n",
        );
        write(
            dir,
            "income.csv",
            "region,date,income\naustin,2015-01-01,60000\naustin,2015-04-01,61000\ntoronto,2015-01-01,72000\n",
        );
    }

    #[test]
    fn test_raw_field_parse() {
        assert_eq!("rent".parse::<RawField>().unwrap(), RawField::Rent);
        assert_eq!(" Mortgage_Rate ".parse::<RawField>().unwrap(), RawField::MortgageRate);
        assert!("price".parse::<RawField>().is_err());
    }

    #[test]
    fn test_capabilities_default_authoritative() {
        let caps = LoaderCapabilities::default();
        assert!(caps.synthesized().is_empty());

        let caps = caps.synthesize(RawField::Rent).synthesize(RawField::Inventory);
        assert_eq!(caps.synthesized(), vec![RawField::Rent, RawField::Inventory]);
        assert_eq!(caps.source(RawField::Permits), FieldSource::Authoritative);
    }

    #[test]
    fn test_load_region_with_synthesized_fields() {
        let dir = tempfile::tempdir().unwrap();
        base_files(dir.path());

        let caps = LoaderCapabilities::default()
            .synthesize(RawField::Rent)
            .synthesize(RawField::Population)
            .synthesize(RawField::MortgageRate)
            .synthesize(RawField::Permits)
            .synthesize(RawField::Inventory);

        let panel = RawDataLoader::new(dir.path(), caps).load_region("austin").unwrap();

        assert_eq!(panel.len(), 2);
        assert_eq!(panel.column("price").unwrap()[0], Some(250000.0));
        assert_eq!(panel.column("rent").unwrap()[0], Some(60000.0 * 0.3 / 12.0));
        assert_eq!(panel.column("mortgage_rate").unwrap()[1], Some(0.04));
        assert_eq!(panel.column("population").unwrap()[0], Some(1_000_000.0));
        assert_relative_eq!(panel.column("permits").unwrap()[0].unwrap(), 1_000.0);
        assert_relative_eq!(panel.column("inventory").unwrap()[0].unwrap(), 2_000.0);
    }

    #[test]
    fn test_authoritative_field_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        base_files(dir.path());
        write(dir.path(), "rent.csv", "region,date,monthly\naustin,2015-01-01,1500\n");

        let caps = LoaderCapabilities::default()
            .synthesize(RawField::Population)
            .synthesize(RawField::MortgageRate)
            .synthesize(RawField::Permits)
            .synthesize(RawField::Inventory);

        let err = RawDataLoader::new(dir.path(), caps)
            .load_region("austin")
            .unwrap_err();
        assert!(matches!(err, PanelError::MissingColumns(cols) if cols == vec!["rent.csv:rent".to_string()]));
    }

    #[test]
    fn test_inventory_alias_column() {
        let dir = tempfile::tempdir().unwrap();
        base_files(dir.path());
        write(
            dir.path(),
            "inventory.csv",
            "region,date,Active_Listings\naustin,2015-01-01,900\naustin,2015-04-01,950\n",
        );

        let caps = LoaderCapabilities::default()
            .synthesize(RawField::Rent)
            .synthesize(RawField::Population)
            .synthesize(RawField::MortgageRate)
            .synthesize(RawField::Permits);

        let panel = RawDataLoader::new(dir.path(), caps).load_region("austin").unwrap();
        assert_eq!(panel.column("inventory").unwrap(), &[Some(900.0), Some(950.0)]);
    }

    #[test]
    fn test_select_from_uses_given_frame() {
        let df = DataFrame::new(vec![
            Series::new("region".into(), vec!["austin", "austin"]).into(),
            Series::new("date".into(), vec!["2015-01-01", "2015-04-01"]).into(),
            Series::new("homes_for_sale".into(), vec![3_600i64, 3_700]).into(),
        ])
        .unwrap();

        let selected = select_from("inventory.csv", df.clone(), &[("homes_for_sale", "inventory")])
            .unwrap()
            .collect()
            .unwrap();
        let names: Vec<&str> = selected.get_column_names().into_iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["region", "date", "inventory"]);
        assert_eq!(selected.column("inventory").unwrap().dtype(), &DataType::Float64);

        let err = select_from("inventory.csv", df, &[("inventory", "inventory")]).err().unwrap();
        assert!(matches!(
            err,
            PanelError::MissingColumns(cols) if cols == vec!["inventory.csv:inventory".to_string()]
        ));
    }
}
